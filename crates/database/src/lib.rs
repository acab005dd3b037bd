//! # Relay Database Crate
//!
//! SQLite-backed implementations of the real-time core's persistence and
//! membership collaborators, plus connection management and schema
//! bootstrap.

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repos;

pub use connection::prepare_database;
pub use errors::{DatabaseError, DatabaseResult};
pub use migrations::run_migrations;
pub use repos::{MembershipRepository, MessageRepository};

use relay_config::DatabaseConfig;
use sqlx::SqlitePool;

/// Prepare the pool and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initializes_in_memory_database() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();

        let result: (bool,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(result.0);
    }
}
