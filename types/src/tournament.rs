use std::fmt::Display;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MatchKind, PersonId};

pub type TournamentId = Uuid;

/// Level pools, shuffled once per tournament and used round robin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Levels {
    pub playoff: Vec<String>,
    pub semi: Vec<String>,
    #[serde(rename = "final")]
    pub final_: Vec<String>,
}

impl Default for Levels {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            playoff: owned(&[
                "twilight",
                "backfire",
                "flight",
                "mirage",
                "thornwood",
                "frostfang",
                "moonstone",
                "kingscourt",
            ]),
            semi: owned(&[
                "sunken",
                "towerforge",
                "ascension",
                "amaranth",
                "dreadwood",
                "darkfang",
            ]),
            final_: owned(&["cataclysm"]),
        }
    }
}

impl Levels {
    pub fn shuffled() -> Self {
        let mut levels = Self::default();
        let mut rng = thread_rng();
        levels.playoff.shuffle(&mut rng);
        levels.semi.shuffle(&mut rng);
        levels.final_.shuffle(&mut rng);
        levels
    }

    /// Level for the `ordinal`-th match of a kind.
    pub fn level_for(&self, kind: MatchKind, ordinal: usize) -> String {
        let pool = match kind {
            MatchKind::Qualifying | MatchKind::Playoff => &self.playoff,
            MatchKind::Semi => &self.semi,
            MatchKind::Final => &self.final_,
        };
        if pool.is_empty() {
            return String::new();
        }
        pool[ordinal % pool.len()].clone()
    }
}

/// Tournament header. Its matches are stored by `(id, index)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub slug: String,
    pub opened: DateTime<Utc>,
    pub scheduled: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub qualifying_end: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub length: u32,
    pub final_length: u32,
    pub pause_minutes: i64,
    pub ruleset: String,
    pub levels: Levels,
    pub casters: Vec<PersonId>,
    /// People waiting for a seat, best candidate first.
    pub runnerups: Vec<PersonId>,
    pub winners: Vec<PersonId>,
    /// Index of the match currently being played, or about to be.
    pub current: usize,
}

impl Tournament {
    pub fn new(name: &str, slug: &str, scheduled: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.to_string(),
            opened: Utc::now(),
            scheduled,
            started: None,
            qualifying_end: None,
            ended: None,
            length: 10,
            final_length: 20,
            pause_minutes: 5,
            ruleset: String::new(),
            levels: Levels::shuffled(),
            casters: Vec::new(),
            runnerups: Vec::new(),
            winners: Vec::new(),
            current: 0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.is_started() && !self.is_ended()
    }

    /// Qualifying keeps spawning matches until the cutoff has passed.
    pub fn qualifying_open(&self, now: DateTime<Utc>) -> bool {
        self.qualifying_end.map_or(true, |cutoff| now < cutoff)
    }

    pub fn length_for(&self, kind: MatchKind) -> u32 {
        match kind {
            MatchKind::Final => self.final_length,
            _ => self.length,
        }
    }
}

impl Display for Tournament {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = if self.is_ended() {
            "ended"
        } else if self.is_started() {
            "running"
        } else {
            "open"
        };
        write!(f, "{} ({}, {phase})", self.name, self.slug)
    }
}
