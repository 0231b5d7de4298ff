use std::fmt::Display;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// The nine archer colors, in the order the game numbers them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Blue,
    Pink,
    Orange,
    White,
    Yellow,
    Cyan,
    Purple,
    Red,
}

impl Color {
    pub const ALL: [Color; 9] = [
        Color::Green,
        Color::Blue,
        Color::Pink,
        Color::Orange,
        Color::White,
        Color::Yellow,
        Color::Cyan,
        Color::Purple,
        Color::Red,
    ];

    /// Index used by the game client.
    pub fn numeric(self) -> u8 {
        self as u8
    }

    pub fn from_numeric(value: u8) -> Option<Color> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Color {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// Colors of the palette that are not in `taken`.
    pub fn available(taken: &[Color]) -> Vec<Color> {
        Self::ALL
            .iter()
            .copied()
            .filter(|c| !taken.contains(c))
            .collect()
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Pink => "pink",
            Color::Orange => "orange",
            Color::White => "white",
            Color::Yellow => "yellow",
            Color::Cyan => "cyan",
            Color::Purple => "purple",
            Color::Red => "red",
        };
        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArcherType {
    #[default]
    Normal,
    Alternate,
    Secret,
}

impl ArcherType {
    pub fn numeric(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_round_trips_through_palette_order() {
        for (i, color) in Color::ALL.iter().enumerate() {
            assert_eq!(color.numeric() as usize, i);
            assert_eq!(Color::from_numeric(i as u8), Some(*color));
        }
        assert_eq!(Color::from_numeric(9), None);
    }

    #[test]
    fn available_excludes_taken_colors() {
        let taken = [Color::Green, Color::Red, Color::Cyan, Color::Pink];
        let free = Color::available(&taken);
        assert_eq!(free.len(), 5);
        assert!(free.iter().all(|c| !taken.contains(c)));
    }
}
