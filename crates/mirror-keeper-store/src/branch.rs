//! Branch rows.
//!
//! Branches are mutable pointers, so the natural key is (repository, name).
//! Head info (sha, message, author, date) is denormalized rather than
//! linked to a commit row: the head commit is not guaranteed to exist
//! locally yet.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::convert::{opt_ts_from_db, opt_ts_to_db, ts_from_db, ts_to_db, uuid_from_db};
use crate::error::DbError;
use crate::MirrorStore;

/// One branch row.
#[derive(Debug, Clone)]
pub struct BranchRecord {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub name: String,
    pub sha: String,
    pub protected: bool,
    pub commit_message: Option<String>,
    pub commit_author: Option<String>,
    pub commit_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Remote-shaped input for a branch upsert.
#[derive(Debug, Clone)]
pub struct BranchFields {
    pub name: String,
    pub sha: String,
    /// `None` keeps the stored flag (defaults false on create).
    pub protected: Option<bool>,
    pub commit_message: Option<String>,
    pub commit_author: Option<String>,
    pub commit_date: Option<DateTime<Utc>>,
}

fn row_to_branch(row: &SqliteRow) -> Result<BranchRecord, DbError> {
    Ok(BranchRecord {
        id: uuid_from_db(&row.try_get::<String, _>("id")?)?,
        repo_id: uuid_from_db(&row.try_get::<String, _>("repo_id")?)?,
        name: row.try_get("name")?,
        sha: row.try_get("sha")?,
        protected: row.try_get("protected")?,
        commit_message: row.try_get("commit_message")?,
        commit_author: row.try_get("commit_author")?,
        commit_date: opt_ts_from_db(row.try_get("commit_date")?)?,
        created_at: ts_from_db(&row.try_get::<String, _>("created_at")?)?,
        updated_at: ts_from_db(&row.try_get::<String, _>("updated_at")?)?,
    })
}

const SELECT_COLUMNS: &str = "id, repo_id, name, sha, protected, commit_message, commit_author, \
     commit_date, created_at, updated_at";

impl MirrorStore {
    /// Find a branch by (repository, name).
    pub async fn find_branch(
        &self,
        repo_id: Uuid,
        name: &str,
    ) -> Result<Option<BranchRecord>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM branches WHERE repo_id = ? AND name = ?"
        ))
        .bind(repo_id.to_string())
        .bind(name)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_branch).transpose()
    }

    /// Create or update a branch; `updated_at` bumps on every write.
    #[tracing::instrument(skip(self, fields), fields(name = %fields.name))]
    pub async fn upsert_branch(
        &self,
        repo_id: Uuid,
        fields: BranchFields,
    ) -> Result<(BranchRecord, bool), DbError> {
        let existing = self.find_branch(repo_id, &fields.name).await?;
        let now = ts_to_db(Utc::now());

        match existing {
            Some(current) => {
                let protected = fields.protected.unwrap_or(current.protected);
                sqlx::query(
                    r#"
                    UPDATE branches
                    SET sha = ?, protected = ?, commit_message = ?, commit_author = ?,
                        commit_date = ?, updated_at = ?
                    WHERE repo_id = ? AND name = ?
                    "#,
                )
                .bind(&fields.sha)
                .bind(protected)
                .bind(&fields.commit_message)
                .bind(&fields.commit_author)
                .bind(opt_ts_to_db(fields.commit_date))
                .bind(&now)
                .bind(repo_id.to_string())
                .bind(&fields.name)
                .execute(self.pool())
                .await?;

                let record = self
                    .find_branch(repo_id, &fields.name)
                    .await?
                    .ok_or_else(|| DbError::NotFound("branch vanished mid-upsert".into()))?;
                Ok((record, false))
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO branches
                        (id, repo_id, name, sha, protected, commit_message, commit_author,
                         commit_date, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id.to_string())
                .bind(repo_id.to_string())
                .bind(&fields.name)
                .bind(&fields.sha)
                .bind(fields.protected.unwrap_or(false))
                .bind(&fields.commit_message)
                .bind(&fields.commit_author)
                .bind(opt_ts_to_db(fields.commit_date))
                .bind(&now)
                .bind(&now)
                .execute(self.pool())
                .await
                .map_err(|e| DbError::from_unique_violation(e, "branch"))?;

                tracing::info!(repo_id = %repo_id, name = %fields.name, "branch created");
                let record = self
                    .find_branch(repo_id, &fields.name)
                    .await?
                    .ok_or_else(|| DbError::NotFound("branch vanished mid-insert".into()))?;
                Ok((record, true))
            }
        }
    }

    /// Delete a branch. Returns false when it was not present.
    pub async fn delete_branch(&self, repo_id: Uuid, name: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM branches WHERE repo_id = ? AND name = ?")
            .bind(repo_id.to_string())
            .bind(name)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[path = "branch_tests.rs"]
mod tests;
