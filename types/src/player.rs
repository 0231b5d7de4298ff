use std::fmt::Display;

use rand::thread_rng;
use serde::{Deserialize, Serialize};

use crate::{ArcherType, Color, Person, PersonId, Tally};

/// Who killed a player in the current round.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Killer {
    Environment,
    Player(usize),
}

/// Live, per-round state of one archer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub arrows: Vec<i32>,
    pub shield: bool,
    pub wings: bool,
    pub hat: bool,
    pub invisible: bool,
    pub alive: bool,
    pub lava: bool,
    pub killer: Option<Killer>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            arrows: Vec::new(),
            shield: false,
            wings: false,
            hat: true,
            invisible: false,
            alive: true,
            lava: false,
            killer: None,
        }
    }
}

impl PlayerState {
    /// Puts the archer back on the field with a fresh loadout.
    pub fn respawn(&mut self, arrows: Vec<i32>) {
        self.arrows = arrows;
        self.alive = true;
        self.hat = true;
        self.lava = false;
        self.killer = None;
    }
}

/// A person occupying one of the four slots of a match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub person_id: PersonId,
    pub nick: String,
    pub display_names: [String; 2],
    pub preferred_color: Color,
    pub color: Color,
    pub archer_type: ArcherType,
    pub tally: Tally,
    pub match_score: i32,
    pub state: PlayerState,
}

impl Player {
    pub fn from_person(person: &Person) -> Self {
        let preferred_color = person
            .preferred_color
            .unwrap_or_else(|| Color::random(&mut thread_rng()));
        Self {
            person_id: person.id,
            nick: person.nick.clone(),
            display_names: person.display_names.clone(),
            preferred_color,
            color: preferred_color,
            archer_type: person.archer_type,
            tally: Tally::default(),
            match_score: 0,
            state: PlayerState::default(),
        }
    }

    pub fn score(&self) -> i32 {
        self.tally.score()
    }

    pub fn total_score(&self) -> i32 {
        self.score() + self.match_score
    }

    pub fn reset(&mut self) {
        self.tally = Tally::default();
        self.match_score = 0;
        self.state = PlayerState::default();
    }
}

impl Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.nick, self.color, self.tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_takes_preferred_color() {
        let person = Person::new("Ada", "ada").with_color(Color::Cyan);
        let player = Player::from_person(&person);
        assert_eq!(player.color, Color::Cyan);
        assert_eq!(player.preferred_color, Color::Cyan);
        assert!(player.state.alive);
    }

    #[test]
    fn total_score_adds_placement() {
        let mut player = Player::from_person(&Person::new("Ada", "ada"));
        player.tally.add_kills(2);
        player.match_score = 490;
        assert_eq!(player.total_score(), 494);
        player.reset();
        assert_eq!(player.total_score(), 0);
    }
}
