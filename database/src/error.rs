use thiserror::Error;
use types::{PersonId, TournamentId};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Person not found: {0}")]
    PersonNotFound(PersonId),

    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Match {index} not found in tournament {tournament}")]
    MatchNotFound {
        tournament: TournamentId,
        index: usize,
    },

    #[error("Person {person} is not registered in tournament {tournament}")]
    SummaryNotFound {
        tournament: TournamentId,
        person: PersonId,
    },

    #[error("Match {index} is out of sequence, tournament has {expected} matches")]
    OutOfSequence { index: usize, expected: usize },

    #[error("Retry exhausted: {0}")]
    RetryExhausted(String),

    #[error("UUID parsing error: {0}")]
    UuidParsing(#[from] uuid::Error),
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DatabaseError::PersonNotFound(_)
                | DatabaseError::TournamentNotFound(_)
                | DatabaseError::MatchNotFound { .. }
                | DatabaseError::SummaryNotFound { .. }
        )
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::Connection(e.to_string())
            }
            other => DatabaseError::Query(other.to_string()),
        }
    }
}
