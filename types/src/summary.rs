use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{scoring, Person, PersonId, Player, Tally, TournamentId};

/// A person's standing within one tournament.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub tournament_id: TournamentId,
    pub person_id: PersonId,
    pub nick: String,
    /// Position in joining order.
    pub seat: usize,
    pub tally: Tally,
    pub matches: u32,
    pub total_score: i32,
    pub skill_score: i32,
}

impl PlayerSummary {
    pub fn new(tournament_id: TournamentId, person: &Person, seat: usize) -> Self {
        Self {
            tournament_id,
            person_id: person.id,
            nick: person.nick.clone(),
            seat,
            tally: Tally::default(),
            matches: 0,
            total_score: 0,
            skill_score: 0,
        }
    }

    pub fn score(&self) -> i32 {
        self.tally.score()
    }

    /// Folds one match appearance into the summary.
    pub fn record(&mut self, player: &Player) {
        self.tally.merge(&player.tally);
        self.total_score += player.total_score();
        self.matches += 1;
        self.skill_score = scoring::skill_score(self.total_score, self.matches);
    }

    /// Rebuilds the aggregate from every match appearance of this person.
    pub fn recompute<'a>(&mut self, appearances: impl IntoIterator<Item = &'a Player>) {
        self.tally = Tally::default();
        self.matches = 0;
        self.total_score = 0;
        self.skill_score = 0;
        for player in appearances {
            self.record(player);
        }
    }
}

impl Display for PlayerSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} matches, {} total, {} skill",
            self.nick, self.matches, self.total_score, self.skill_score
        )
    }
}
