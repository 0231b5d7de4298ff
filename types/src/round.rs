use std::fmt::{Debug, Display};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::Match;

pub const SLOTS: usize = 4;

/// What happened to one player slot during a round.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSlot {
    pub kills: u32,
    pub self_kills: u32,
    pub shot: bool,
}

/// One scoring interval of a match, between round start and round end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub slots: [RoundSlot; SLOTS],
    pub started: bool,
    pub committed: Option<DateTime<Utc>>,
}

impl Round {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a finished round from per-slot kill counts, self kills and shot flags.
    pub fn from_parts(kills: [u32; SLOTS], self_kills: [u32; SLOTS], shots: [bool; SLOTS]) -> Self {
        let mut round = Self::new();
        for (i, slot) in round.slots.iter_mut().enumerate() {
            slot.kills = kills[i];
            slot.self_kills = self_kills[i];
            slot.shot = shots[i];
        }
        round
    }

    pub fn add_kill(&mut self, slot: usize) {
        self.slots[slot].kills += 1;
    }

    pub fn add_self(&mut self, slot: usize) {
        self.slots[slot].self_kills += 1;
    }

    pub fn award_shot(&mut self, slot: usize) {
        self.slots[slot].shot = true;
    }

    /// Any kill or self kill at all.
    pub fn has_deaths(&self) -> bool {
        self.slots.iter().any(|s| s.kills > 0 || s.self_kills > 0)
    }

    /// Nobody died, but somebody has a shot coming.
    pub fn is_shot_only(&self) -> bool {
        !self.has_deaths() && self.slots.iter().any(|s| s.shot)
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self
            .slots
            .iter()
            .map(|s| {
                format!(
                    "{}/{}{}",
                    s.kills,
                    s.self_kills,
                    if s.shot { "*" } else { "" }
                )
            })
            .join(" ");
        write!(f, "[{slots}]")
    }
}

/// Produces rounds for matches that are played without a live game.
pub trait RoundStrategy: Debug + Send {
    fn next_round(&mut self, current: &Match) -> Round;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shot_only_needs_no_deaths_and_a_shot() {
        assert!(!Round::new().is_shot_only());
        assert!(Round::from_parts([0; 4], [0; 4], [false, true, false, false]).is_shot_only());
        assert!(!Round::from_parts([0; 4], [1, 0, 0, 0], [true, false, false, false]).is_shot_only());
        assert!(!Round::from_parts([0; 4], [1, 0, 0, 0], [false; 4]).is_shot_only());
        assert!(!Round::from_parts([1, 0, 0, 0], [0; 4], [true, false, false, false]).is_shot_only());
    }

    #[test]
    fn display_marks_shots() {
        let round = Round::from_parts([3, 0, 0, 0], [0, 1, 0, 0], [false, false, true, false]);
        assert_eq!(round.to_string(), "[3/0 0/1 0/0* 0/0]");
    }
}
