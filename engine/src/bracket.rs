//! Bracket topology: how many matches of each kind a roster needs and where
//! players go when a match ends. Everything here is pure; the orchestrator
//! does the loading and persisting.

use types::{scoring, Match, MatchKind, SLOTS};

use crate::EngineError;

/// A roster of exactly this size skips qualifying and goes straight to the semifinals.
pub const DIRECT_SEMIS_ROSTER: usize = 8;

pub const SEMIFINALS: usize = 2;

/// How a tournament opens, as positions into the roster in joining order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartPlan {
    DirectSemis { semis: Vec<Vec<usize>> },
    Qualifying { matches: Vec<Vec<usize>>, waiting: Vec<usize> },
}

/// How the tournament continues once qualifying is over, as positions into
/// the skill-ordered player list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndgamePlan {
    Playoffs { playoffs: Vec<Vec<usize>> },
    DirectSemis { semis: Vec<Vec<usize>> },
}

impl EndgamePlan {
    /// Number of players the plan needs from the skill ranking.
    pub fn players_needed(&self) -> usize {
        match self {
            EndgamePlan::Playoffs { playoffs } => playoffs.iter().map(Vec::len).sum(),
            EndgamePlan::DirectSemis { semis } => semis.iter().map(Vec::len).sum(),
        }
    }
}

/// Deals `count` positions into `buckets` piles, position `i` into pile `i % buckets`.
pub fn modulated(count: usize, buckets: usize) -> Vec<Vec<usize>> {
    let mut piles = vec![Vec::new(); buckets];
    if buckets == 0 {
        return piles;
    }
    for position in 0..count {
        piles[position % buckets].push(position);
    }
    piles
}

pub fn plan_start(roster: usize, min_players: usize) -> Result<StartPlan, EngineError> {
    if roster == DIRECT_SEMIS_ROSTER {
        return Ok(StartPlan::DirectSemis {
            semis: modulated(DIRECT_SEMIS_ROSTER, SEMIFINALS),
        });
    }

    let required = min_players.max(SLOTS);
    if roster < required {
        return Err(EngineError::InsufficientPlayers {
            actual: roster,
            required,
        });
    }

    let count = roster / SLOTS;
    let seated = count * SLOTS;
    Ok(StartPlan::Qualifying {
        matches: modulated(seated, count),
        waiting: (seated..roster).collect(),
    })
}

/// Picks the endgame for a roster of `registered` players.
///
/// With a full playoff field the top `playoff_players` are dealt into
/// playoffs, otherwise the best eight go straight to the semifinals.
pub fn plan_endgame(registered: usize, playoff_players: usize) -> EndgamePlan {
    if registered >= playoff_players && playoff_players >= SLOTS {
        EndgamePlan::Playoffs {
            playoffs: modulated(playoff_players, playoff_players / SLOTS),
        }
    } else {
        EndgamePlan::DirectSemis {
            semis: modulated(DIRECT_SEMIS_ROSTER, SEMIFINALS),
        }
    }
}

/// Placement multiplier for a match. Only the final is boosted, by how
/// many matches came before it.
pub fn multiplier(m: &Match) -> f64 {
    match m.kind {
        MatchKind::Final => scoring::final_multiplier(m.index),
        _ => 1.0,
    }
}

/// Position of match `index` among the matches of its own kind.
pub fn ordinal(matches: &[Match], index: usize) -> usize {
    let Some(kind) = matches.get(index).map(|m| m.kind) else {
        return 0;
    };
    matches
        .iter()
        .take(index)
        .filter(|m| m.kind == kind)
        .count()
}

pub fn indices_of(matches: &[Match], kind: MatchKind) -> Vec<usize> {
    matches
        .iter()
        .filter(|m| m.kind == kind)
        .map(|m| m.index)
        .collect()
}

/// Where the players of an ended match move on to, as `(slot, destination
/// match index)` pairs. Qualifying matches feed nobody directly and the
/// final feeds nobody at all.
pub fn advancement(matches: &[Match], ended: &Match) -> Vec<(usize, usize)> {
    let order = &ended.kill_order;
    match ended.kind {
        MatchKind::Playoff => {
            let semis = indices_of(matches, MatchKind::Semi);
            if semis.len() < SEMIFINALS || order.len() < 2 {
                return Vec::new();
            }
            let k = ordinal(matches, ended.index);
            vec![
                (order[0], semis[k % SEMIFINALS]),
                (order[1], semis[(k + 1) % SEMIFINALS]),
            ]
        }
        MatchKind::Semi => match indices_of(matches, MatchKind::Final).first() {
            Some(&final_index) => order.iter().take(2).map(|&slot| (slot, final_index)).collect(),
            None => Vec::new(),
        },
        MatchKind::Qualifying | MatchKind::Final => Vec::new(),
    }
}

/// The top three of the final, in kill order.
pub fn winners(final_match: &Match) -> Vec<types::PersonId> {
    final_match
        .kill_order
        .iter()
        .take(3)
        .filter_map(|&slot| final_match.players.get(slot).map(|p| p.person_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn bracket(kinds: &[MatchKind]) -> Vec<Match> {
        let tid = Uuid::new_v4();
        kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| Match::new(tid, i, kind, 10))
            .collect()
    }

    #[test]
    fn rosters_below_eight_or_between_formats_are_rejected() {
        for n in [0, 4, 7, 9, 10, 11] {
            assert!(
                matches!(plan_start(n, 12), Err(EngineError::InsufficientPlayers { .. })),
                "{n} players should be rejected"
            );
        }
    }

    #[test]
    fn eight_players_seed_two_semis() {
        let plan = plan_start(8, 12).unwrap();
        assert_eq!(
            plan,
            StartPlan::DirectSemis {
                semis: vec![vec![0, 2, 4, 6], vec![1, 3, 5, 7]]
            }
        );
    }

    #[test]
    fn qualifying_seeds_floor_of_quarter_and_leaves_rest_waiting() {
        let StartPlan::Qualifying { matches, waiting } = plan_start(14, 12).unwrap() else {
            panic!("expected qualifying");
        };
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0], vec![0, 3, 6, 9]);
        assert_eq!(waiting, vec![12, 13]);

        let StartPlan::Qualifying { matches, waiting } = plan_start(24, 12).unwrap() else {
            panic!("expected qualifying");
        };
        assert_eq!(matches.len(), 6);
        assert!(waiting.is_empty());
    }

    #[test]
    fn endgame_depends_on_roster() {
        let full = plan_endgame(20, 16);
        assert_eq!(full.players_needed(), 16);
        let EndgamePlan::Playoffs { playoffs } = full else {
            panic!("expected playoffs");
        };
        assert_eq!(playoffs.len(), 4);
        assert_eq!(playoffs[1], vec![1, 5, 9, 13]);

        let short = plan_endgame(13, 16);
        assert_eq!(short.players_needed(), 8);
        assert!(matches!(short, EndgamePlan::DirectSemis { .. }));
    }

    #[test]
    fn playoff_winner_and_runner_up_split_between_semis() {
        use MatchKind::*;
        let mut matches = bracket(&[Qualifying, Playoff, Playoff, Playoff, Playoff, Semi, Semi, Final]);
        matches[2].kill_order = vec![3, 0, 1, 2];
        let moves = advancement(&matches, &matches[2].clone());
        assert_eq!(moves, vec![(3, 6), (0, 5)]);

        matches[1].kill_order = vec![1, 2, 3, 0];
        let moves = advancement(&matches, &matches[1].clone());
        assert_eq!(moves, vec![(1, 5), (2, 6)]);
    }

    #[test]
    fn semis_send_top_two_to_final() {
        use MatchKind::*;
        let mut matches = bracket(&[Semi, Semi, Final]);
        matches[1].kill_order = vec![2, 1, 0, 3];
        assert_eq!(advancement(&matches, &matches[1].clone()), vec![(2, 2), (1, 2)]);
        assert!(advancement(&matches, &matches[2].clone()).is_empty());
    }

    #[test]
    fn only_the_final_is_boosted() {
        use MatchKind::*;
        let matches = bracket(&[Semi, Semi, Final]);
        assert_eq!(multiplier(&matches[0]), 1.0);
        assert_eq!(multiplier(&matches[2]), 2.5);
    }

    #[test]
    fn ordinal_counts_same_kind_only() {
        use MatchKind::*;
        let matches = bracket(&[Qualifying, Playoff, Qualifying, Playoff]);
        assert_eq!(ordinal(&matches, 3), 1);
        assert_eq!(ordinal(&matches, 2), 1);
        assert_eq!(ordinal(&matches, 1), 0);
    }
}
