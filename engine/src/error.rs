use database::DatabaseError;
use serde::Serialize;
use thiserror::Error;
use types::{MatchError, PersonId, ProtocolError};

/// Why the next-match instruction could not be handed to the game.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("game is not connected")]
    Disconnected,
    #[error("match {0} does not have four players yet")]
    IncompleteMatch(usize),
    #[error("publisher has shut down")]
    Closed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Persistence,
    Publish,
    Protocol,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0} is already registered")]
    AlreadyRegistered(PersonId),

    #[error("{0} is not registered")]
    NotRegistered(PersonId),

    #[error("tournament already started")]
    AlreadyStarted,

    #[error("tournament has not started")]
    NotStarted,

    #[error("tournament already ended")]
    AlreadyEnded,

    #[error("need at least {required} players to start, have {actual}")]
    InsufficientPlayers { actual: usize, required: usize },

    #[error("playoffs need {required} players, have {actual}")]
    InsufficientPlayoffPlayers { actual: usize, required: usize },

    #[error("no match left to play")]
    NoMatchAvailable,

    #[error("match {0} not found")]
    MatchNotFound(usize),

    #[error("match {0} is already running")]
    MatchRunning(usize),

    #[error("{person} is still playing in match {index}")]
    AlreadySeated { person: PersonId, index: usize },

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("match {index} did not finish within {rounds} rounds")]
    Stalled { index: usize, rounds: usize },
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Database(e) if e.is_not_found() => ErrorCategory::NotFound,
            EngineError::Database(_) => ErrorCategory::Persistence,
            EngineError::NotRegistered(_) | EngineError::MatchNotFound(_) => ErrorCategory::NotFound,
            EngineError::Match(MatchError::SlotOutOfRange(_)) => ErrorCategory::NotFound,
            EngineError::Publish(_) => ErrorCategory::Publish,
            EngineError::Protocol(_) => ErrorCategory::Protocol,
            _ => ErrorCategory::Validation,
        }
    }

    /// Publication problems that a match end shrugs off.
    pub fn is_quiet_publish_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Publish(PublishError::Disconnected | PublishError::IncompleteMatch(_))
        )
    }
}
