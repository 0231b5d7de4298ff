use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::{retry_with_backoff, DatabaseError};

pub const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub connect_attempts: usize,
}

impl DatabaseConfig {
    pub fn from_cli_or_env_or_yaml(cli_arg: Option<String>, yaml_config: Option<String>) -> Self {
        let url = if let Some(arg) = cli_arg {
            arg
        } else if let Ok(env) = std::env::var("DATABASE_URL") {
            env
        } else if let Some(yaml) = yaml_config {
            yaml
        } else {
            IN_MEMORY_URL.to_string()
        };

        Self::with_url(&url)
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            pool_size: 20,
            connect_attempts: 3,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url == IN_MEMORY_URL || self.url == ":memory:"
    }

    /// Opens the pool, retrying with backoff while the file is unavailable.
    ///
    /// In-memory databases get a single connection, since every sqlite
    /// connection would otherwise see its own empty database.
    pub async fn create_pool(&self) -> Result<SqlitePool, DatabaseError> {
        let (options, size) = if self.is_in_memory() {
            (SqliteConnectOptions::new().in_memory(true), 1)
        } else {
            let filename = self.url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            (
                SqliteConnectOptions::new()
                    .filename(filename)
                    .create_if_missing(true),
                self.pool_size,
            )
        };

        let in_memory = self.is_in_memory();
        retry_with_backoff(
            || {
                let pool = SqlitePoolOptions::new().max_connections(size);
                let pool = if in_memory {
                    pool.idle_timeout(None).max_lifetime(None)
                } else {
                    pool
                };
                pool.connect_with(options.clone())
            },
            self.connect_attempts,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| {
            DatabaseError::RetryExhausted(format!(
                "{} attempts to open {}: {e}",
                self.connect_attempts, self.url
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins() {
        let config =
            DatabaseConfig::from_cli_or_env_or_yaml(Some("tournament.db".into()), Some("other.db".into()));
        assert_eq!(config.url, "tournament.db");
        assert!(!config.is_in_memory());
    }

    #[tokio::test]
    async fn in_memory_pool_opens() {
        let pool = DatabaseConfig::with_url(IN_MEMORY_URL)
            .create_pool()
            .await
            .expect("Failed to open in-memory pool");
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&pool)
            .await
            .expect("Failed to query");
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn unreachable_file_exhausts_retries() {
        let mut config = DatabaseConfig::with_url("sqlite:///no/such/directory/tournament.db");
        config.connect_attempts = 1;
        let err = config.create_pool().await.unwrap_err();
        assert!(matches!(err, DatabaseError::RetryExhausted(_)), "{err}");
    }
}
