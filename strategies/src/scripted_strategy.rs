use std::collections::VecDeque;

use types::{Match, Round, RoundStrategy};

use crate::DefaultStrategy;

/// Plays back a fixed list of rounds, then lets the leader run away with it.
#[derive(Debug, Default)]
pub struct ScriptedStrategy {
    rounds: VecDeque<Round>,
    fallback: DefaultStrategy,
}

impl ScriptedStrategy {
    pub fn new(rounds: impl IntoIterator<Item = Round>) -> Self {
        Self {
            rounds: rounds.into_iter().collect(),
            fallback: DefaultStrategy::default(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.rounds.len()
    }
}

impl RoundStrategy for ScriptedStrategy {
    fn next_round(&mut self, current: &Match) -> Round {
        match self.rounds.pop_front() {
            Some(round) => round,
            None => {
                log::debug!("Script exhausted for {current}, falling back");
                self.fallback.next_round(current)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::MatchKind;
    use uuid::Uuid;

    #[test]
    fn replays_then_falls_back() {
        let m = Match::new(Uuid::new_v4(), 0, MatchKind::Final, 20);
        let scripted = Round::from_parts([0, 2, 0, 0], [0; 4], [false; 4]);
        let mut strategy = ScriptedStrategy::new([scripted.clone()]);
        assert_eq!(strategy.remaining(), 1);
        assert_eq!(strategy.next_round(&m), scripted);
        // no players yet, so the fallback has nobody to feed
        assert_eq!(strategy.next_round(&m), Round::new());
    }
}
