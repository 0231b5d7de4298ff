pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod store;

pub use config::DatabaseConfig;
pub use error::DatabaseError;
pub use models::CommitRecord;
pub use retry::retry_with_backoff;
pub use store::{MemoryStore, SqliteStore, TournamentStore};

/// Opens the configured database and makes sure the schema exists.
pub async fn connect(config: &DatabaseConfig) -> Result<SqliteStore, DatabaseError> {
    let pool = config.create_pool().await?;
    let store = SqliteStore::new(pool);
    store.migrate().await?;
    Ok(store)
}
