//! Total orders over players and summaries.
//!
//! Each order is a named comparator; [`rank`] turns a comparator into a
//! permutation of indices, falling back to index order so that no two
//! entries ever compare equal.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{Player, PlayerSummary};

pub type Comparator<T> = fn(&T, &T) -> Ordering;

/// Most kills first, then highest score.
pub fn by_kills(a: &Player, b: &Player) -> Ordering {
    b.tally
        .kills
        .cmp(&a.tally.kills)
        .then_with(|| b.score().cmp(&a.score()))
}

/// Highest score first, then most kills.
pub fn by_score(a: &Player, b: &Player) -> Ordering {
    b.score()
        .cmp(&a.score())
        .then_with(|| b.tally.kills.cmp(&a.tally.kills))
}

/// Fewest matches played first, then highest skill score, then joining order.
pub fn by_runnerup(a: &PlayerSummary, b: &PlayerSummary) -> Ordering {
    a.matches
        .cmp(&b.matches)
        .then_with(|| b.skill_score.cmp(&a.skill_score))
        .then_with(|| a.seat.cmp(&b.seat))
}

/// Highest skill score first, then joining order.
pub fn by_skill(a: &PlayerSummary, b: &PlayerSummary) -> Ordering {
    b.skill_score
        .cmp(&a.skill_score)
        .then_with(|| a.seat.cmp(&b.seat))
}

/// A player contesting a color, with what decides who keeps it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConflictCandidate {
    pub slot: usize,
    pub userlevel: i32,
    pub score: i32,
}

/// Highest permission level first, then highest score, then slot.
pub fn by_color_conflict(a: &ConflictCandidate, b: &ConflictCandidate) -> Ordering {
    b.userlevel
        .cmp(&a.userlevel)
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| a.slot.cmp(&b.slot))
}

/// Orders over the players of one match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerOrder {
    Kills,
    Score,
}

impl PlayerOrder {
    pub fn comparator(self) -> Comparator<Player> {
        match self {
            PlayerOrder::Kills => by_kills,
            PlayerOrder::Score => by_score,
        }
    }

    pub fn rank(self, players: &[Player]) -> Vec<usize> {
        rank(players, self.comparator())
    }
}

/// Orders over the summaries of a tournament roster.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryOrder {
    Runnerup,
    Skill,
}

impl SummaryOrder {
    pub fn comparator(self) -> Comparator<PlayerSummary> {
        match self {
            SummaryOrder::Runnerup => by_runnerup,
            SummaryOrder::Skill => by_skill,
        }
    }

    pub fn sort(self, summaries: &mut [PlayerSummary]) {
        summaries.sort_by(self.comparator());
    }
}

/// Indices of `items` in the order given by `cmp`, ties broken by index.
pub fn rank<T>(items: &[T], cmp: Comparator<T>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&i, &j| cmp(&items[i], &items[j]).then(i.cmp(&j)));
    order
}

pub fn make_kill_order(players: &[Player]) -> Vec<usize> {
    PlayerOrder::Kills.rank(players)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Person;
    use uuid::Uuid;

    fn players_with_kills(kills: &[u32]) -> Vec<Player> {
        kills
            .iter()
            .map(|&k| {
                let mut p = Player::from_person(&Person::new("p", "p"));
                p.tally.kills = k;
                p
            })
            .collect()
    }

    #[test]
    fn kill_order_sorts_descending() {
        let players = players_with_kills(&[1, 4, 5, 10]);
        assert_eq!(make_kill_order(&players), vec![3, 2, 1, 0]);
    }

    #[test]
    fn kill_order_breaks_ties_by_score() {
        let mut players = players_with_kills(&[2, 2, 2, 0]);
        players[2].tally.shots = 1;
        players[0].tally.sweeps = 1;
        assert_eq!(make_kill_order(&players), vec![0, 2, 1, 3]);
    }

    #[test]
    fn full_ties_fall_back_to_slot() {
        let players = players_with_kills(&[0, 0, 0, 0]);
        assert_eq!(make_kill_order(&players), vec![0, 1, 2, 3]);
    }

    #[test]
    fn score_order_prefers_score_over_kills() {
        let mut players = players_with_kills(&[3, 1, 0, 0]);
        players[1].tally.shots = 2;
        assert_eq!(PlayerOrder::Score.rank(&players), vec![1, 0, 2, 3]);
    }

    #[test]
    fn runnerup_order_prefers_fewer_matches() {
        let tid = Uuid::new_v4();
        let mut summaries: Vec<_> = (0..4)
            .map(|i| PlayerSummary::new(tid, &Person::new("p", "p"), i))
            .collect();
        summaries[0].matches = 2;
        summaries[0].skill_score = 900;
        summaries[1].matches = 1;
        summaries[1].skill_score = 10;
        summaries[2].matches = 1;
        summaries[2].skill_score = 50;
        summaries[3].matches = 1;
        summaries[3].skill_score = 50;

        SummaryOrder::Runnerup.sort(&mut summaries);
        let seats: Vec<_> = summaries.iter().map(|s| s.seat).collect();
        assert_eq!(seats, vec![2, 3, 1, 0]);
    }

    #[test]
    fn color_conflict_prefers_permission_then_score() {
        let candidates = [
            ConflictCandidate { slot: 0, userlevel: 10, score: 500 },
            ConflictCandidate { slot: 1, userlevel: 100, score: 0 },
            ConflictCandidate { slot: 2, userlevel: 10, score: 700 },
        ];
        assert_eq!(rank(&candidates, by_color_conflict), vec![1, 2, 0]);
    }
}
