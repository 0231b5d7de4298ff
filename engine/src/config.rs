use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::Tournament;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Knobs for running a tournament. Every field has a default, so a YAML
/// file only needs the values it wants to change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Kills needed to end a regular match.
    pub match_length: u32,
    pub final_length: u32,
    /// Minutes between one match ending and the next being due.
    pub pause_minutes: i64,
    pub min_players: usize,
    pub playoff_players: usize,
    pub broadcasting: bool,
    pub notification_capacity: usize,
    pub outbox_capacity: usize,
    pub autoplay_round_limit: usize,
    pub ruleset: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_length: 10,
            final_length: 20,
            pause_minutes: 5,
            min_players: 12,
            playoff_players: 16,
            broadcasting: true,
            notification_capacity: 256,
            outbox_capacity: 64,
            autoplay_round_limit: 500,
            ruleset: String::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Copies the per-tournament settings onto a fresh tournament.
    pub fn apply(&self, tournament: &mut Tournament) {
        tournament.length = self.match_length;
        tournament.final_length = self.final_length;
        tournament.pause_minutes = self.pause_minutes;
        tournament.ruleset = self.ruleset.clone();
    }
}
