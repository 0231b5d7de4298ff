pub mod scripted_strategy;

use rand::{rngs::StdRng, Rng, SeedableRng};
use types::{make_kill_order, Match, Round, RoundStrategy, SLOTS};

pub use crate::scripted_strategy::ScriptedStrategy;

/// Rolls every slot independently: 6% sweep, 15% two kills, 50% one
/// kill, plus a 10% accidental self kill and a 10% judge's shot.
#[derive(Debug)]
pub struct RandomStrategy {
    rng: StdRng,
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomStrategy {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RoundStrategy for RandomStrategy {
    fn next_round(&mut self, _current: &Match) -> Round {
        let mut round = Round::new();
        for slot in round.slots.iter_mut() {
            let y = self.rng.gen_range(0..100);
            slot.kills = if y <= 5 {
                3
            } else if y <= 20 {
                2
            } else if y <= 70 {
                1
            } else {
                0
            };
            if self.rng.gen_range(0..10) == 0 {
                slot.self_kills = 1;
            }
            if self.rng.gen_range(0..10) == 0 {
                slot.shot = true;
            }
        }
        round
    }
}

/// The current kill leader takes one kill every round.
#[derive(Debug, Default)]
pub struct DefaultStrategy {}

impl RoundStrategy for DefaultStrategy {
    fn next_round(&mut self, current: &Match) -> Round {
        let mut round = Round::new();
        if current.players.len() == SLOTS {
            let leader = make_kill_order(&current.players)[0];
            round.slots[leader].kills = 1;
        }
        round
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use types::{Color, MatchKind, Person, Player};
    use uuid::Uuid;

    fn running_match() -> Match {
        let mut m = Match::new(Uuid::new_v4(), 0, MatchKind::Qualifying, 10);
        for (i, color) in [Color::Green, Color::Blue, Color::Pink, Color::Orange]
            .into_iter()
            .enumerate()
        {
            let person = Person::new(&format!("p{i}"), &format!("p{i}")).with_color(color);
            m.add_player(Player::from_person(&person)).unwrap();
        }
        m.start(Utc::now(), &[]).unwrap();
        m
    }

    #[test]
    fn seeded_random_rounds_repeat() {
        let m = running_match();
        let mut a = RandomStrategy::seeded(7);
        let mut b = RandomStrategy::seeded(7);
        for _ in 0..20 {
            let round = a.next_round(&m);
            assert_eq!(round, b.next_round(&m));
            assert!(round.slots.iter().all(|s| s.kills <= 3 && s.self_kills <= 1));
        }
    }

    #[test]
    fn default_strategy_feeds_the_leader() {
        let mut m = running_match();
        m.players[2].tally.kills = 4;
        let round = DefaultStrategy::default().next_round(&m);
        assert_eq!(round.slots[2].kills, 1);
        assert_eq!(round.slots.iter().map(|s| s.kills).sum::<u32>(), 1);
    }
}
