//! SQLite pool construction.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};

use crate::error::DbError;

/// Create a SQLite pool with WAL mode and common settings.
///
/// # Arguments
///
/// * `database_url` - connection string, e.g. `sqlite:./mirror_keeper.db`
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| DbError::Internal(format!("invalid database URL: {e}")))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;

    tracing::debug!("database pool created");
    Ok(pool)
}
