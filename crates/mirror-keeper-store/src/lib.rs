//! # Mirror-Keeper Store
//!
//! Relational persistence for the GitHub mirror: installations,
//! repositories, branches, commits, pull requests, issues, and the webhook
//! delivery log.
//!
//! Every mirrored entity carries a remote identity (the immutable id GitHub
//! assigned, or a (parent, natural-key) pair) and a local UUID. The remote
//! identity is the only thing incoming data is matched on; local ids exist
//! for internal relationships. Upserts are find-or-create by natural key
//! followed by a field-by-field overwrite, and report whether they created
//! the row so callers can keep new-vs-updated statistics.

mod branch;
mod commit;
mod convert;
mod delivery;
mod error;
mod installation;
mod issue;
mod pool;
mod pull_request;
mod repository;
mod schema;

pub use branch::{BranchFields, BranchRecord};
pub use commit::{CommitFields, CommitRecord};
pub use delivery::DeliveryRecord;
pub use error::DbError;
pub use installation::{InstallationFields, InstallationRecord};
pub use issue::{IssueFields, IssueRecord};
pub use pool::create_pool;
pub use pull_request::{PullRequestFields, PullRequestRecord};
pub use repository::{RepositoryFields, RepositoryRecord};
pub use schema::init_schema;

use sqlx::sqlite::SqlitePool;

/// Handle to the mirror database.
///
/// Cheap to clone; all methods are grouped into per-entity impl blocks in
/// the sibling modules.
#[derive(Clone)]
pub struct MirrorStore {
    pool: SqlitePool,
}

impl MirrorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open an in-memory store with the schema applied. Test helper.
    ///
    /// Pinned to a single connection: every pooled connection to
    /// `sqlite::memory:` would otherwise get its own empty database.
    pub async fn in_memory() -> Result<Self, DbError> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(DbError::Sqlx)?;
        schema::init_schema(&pool).await?;
        Ok(Self::new(pool))
    }
}
