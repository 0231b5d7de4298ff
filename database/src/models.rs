use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use types::{Match, Round, TournamentId, SLOTS};

/// One committed round, flattened for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: Option<i64>,
    pub tournament_id: TournamentId,
    pub match_index: usize,
    /// 1-based position in the match's round history.
    pub round: usize,
    pub kills: [u32; SLOTS],
    pub self_kills: [u32; SLOTS],
    pub shots: [bool; SLOTS],
    pub committed_at: DateTime<Utc>,
}

impl CommitRecord {
    /// Record for the most recently appended round of `m`.
    pub fn latest(m: &Match) -> Option<Self> {
        let round = m.rounds.last()?;
        Some(Self::from_round(m, m.rounds.len(), round))
    }

    pub fn from_round(m: &Match, number: usize, round: &Round) -> Self {
        Self {
            id: None,
            tournament_id: m.tournament_id,
            match_index: m.index,
            round: number,
            kills: round.slots.map(|s| s.kills),
            self_kills: round.slots.map(|s| s.self_kills),
            shots: round.slots.map(|s| s.shot),
            committed_at: round.committed.unwrap_or_else(Utc::now),
        }
    }

    pub fn to_round(&self) -> Round {
        let mut round = Round::from_parts(self.kills, self.self_kills, self.shots);
        round.committed = Some(self.committed_at);
        round
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::MatchKind;
    use uuid::Uuid;

    #[test]
    fn latest_tracks_round_number() {
        let mut m = Match::new(Uuid::new_v4(), 3, MatchKind::Playoff, 10);
        assert!(CommitRecord::latest(&m).is_none());

        let mut round = Round::from_parts([1, 0, 2, 0], [0, 1, 0, 0], [false, false, false, true]);
        round.committed = Some(Utc::now());
        m.rounds.push(Round::new());
        m.rounds.push(round.clone());

        let record = CommitRecord::latest(&m).unwrap();
        assert_eq!(record.round, 2);
        assert_eq!(record.match_index, 3);
        assert_eq!(record.kills, [1, 0, 2, 0]);
        assert_eq!(record.to_round(), round);
    }
}
