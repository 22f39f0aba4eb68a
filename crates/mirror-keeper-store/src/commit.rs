//! Commit rows.
//!
//! A commit is content-addressed: (repository, sha) is the identity, so a
//! redelivery can never create a second row. Upserts overwrite the stored
//! fields like every other entity; because the sha pins the content this is
//! a no-op for genuine redeliveries. Diff stats and the verification flag
//! are coalesced rather than replaced: shallow push payloads without stats
//! must not clear values a later detail fetch backfilled.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::convert::{
    opt_ts_from_db, opt_ts_to_db, opt_uuid_from_db, string_list_from_db, string_list_to_db,
    ts_from_db, ts_to_db, uuid_from_db,
};
use crate::error::DbError;
use crate::MirrorStore;

/// One commit row.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub sha: String,
    pub node_id: Option<String>,
    pub message: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_login: Option<String>,
    pub author_date: Option<DateTime<Utc>>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    pub committer_date: Option<DateTime<Utc>>,
    pub tree_sha: Option<String>,
    pub parent_shas: Vec<String>,
    pub additions: Option<i64>,
    pub deletions: Option<i64>,
    pub changed_files: Option<i64>,
    pub html_url: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Remote-shaped input for a commit upsert.
#[derive(Debug, Clone, Default)]
pub struct CommitFields {
    pub sha: String,
    pub node_id: Option<String>,
    pub message: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_login: Option<String>,
    pub author_date: Option<DateTime<Utc>>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    pub committer_date: Option<DateTime<Utc>>,
    pub tree_sha: Option<String>,
    pub parent_shas: Vec<String>,
    pub additions: Option<i64>,
    pub deletions: Option<i64>,
    pub changed_files: Option<i64>,
    pub html_url: Option<String>,
    pub verified: bool,
}

fn row_to_commit(row: &SqliteRow) -> Result<CommitRecord, DbError> {
    Ok(CommitRecord {
        id: uuid_from_db(&row.try_get::<String, _>("id")?)?,
        repo_id: uuid_from_db(&row.try_get::<String, _>("repo_id")?)?,
        branch_id: opt_uuid_from_db(row.try_get("branch_id")?)?,
        sha: row.try_get("sha")?,
        node_id: row.try_get("node_id")?,
        message: row.try_get("message")?,
        author_name: row.try_get("author_name")?,
        author_email: row.try_get("author_email")?,
        author_login: row.try_get("author_login")?,
        author_date: opt_ts_from_db(row.try_get("author_date")?)?,
        committer_name: row.try_get("committer_name")?,
        committer_email: row.try_get("committer_email")?,
        committer_date: opt_ts_from_db(row.try_get("committer_date")?)?,
        tree_sha: row.try_get("tree_sha")?,
        parent_shas: string_list_from_db(&row.try_get::<String, _>("parent_shas")?)?,
        additions: row.try_get("additions")?,
        deletions: row.try_get("deletions")?,
        changed_files: row.try_get("changed_files")?,
        html_url: row.try_get("html_url")?,
        verified: row.try_get("verified")?,
        created_at: ts_from_db(&row.try_get::<String, _>("created_at")?)?,
    })
}

const SELECT_COLUMNS: &str = "id, repo_id, branch_id, sha, node_id, message, author_name, \
     author_email, author_login, author_date, committer_name, committer_email, committer_date, \
     tree_sha, parent_shas, additions, deletions, changed_files, html_url, verified, created_at";

impl MirrorStore {
    /// Find a commit by (repository, sha).
    pub async fn find_commit(
        &self,
        repo_id: Uuid,
        sha: &str,
    ) -> Result<Option<CommitRecord>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM commits WHERE repo_id = ? AND sha = ?"
        ))
        .bind(repo_id.to_string())
        .bind(sha)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_commit).transpose()
    }

    /// Create or update a commit, keyed by (repository, sha).
    ///
    /// The branch link is only set on create (a commit does not move between
    /// branches because a later delivery mentions it). Stats and the
    /// verification flag only ever gain information on update.
    #[tracing::instrument(skip(self, fields), fields(sha = %fields.sha))]
    pub async fn upsert_commit(
        &self,
        repo_id: Uuid,
        branch_id: Option<Uuid>,
        fields: CommitFields,
    ) -> Result<(CommitRecord, bool), DbError> {
        let existing = self.find_commit(repo_id, &fields.sha).await?;

        match existing {
            Some(_) => {
                sqlx::query(
                    r#"
                    UPDATE commits
                    SET node_id = COALESCE(?, node_id), message = ?,
                        author_name = ?, author_email = ?, author_login = ?, author_date = ?,
                        committer_name = ?, committer_email = ?, committer_date = ?,
                        tree_sha = COALESCE(?, tree_sha), parent_shas = ?,
                        additions = COALESCE(?, additions),
                        deletions = COALESCE(?, deletions),
                        changed_files = COALESCE(?, changed_files),
                        html_url = COALESCE(?, html_url),
                        verified = MAX(verified, ?)
                    WHERE repo_id = ? AND sha = ?
                    "#,
                )
                .bind(&fields.node_id)
                .bind(&fields.message)
                .bind(&fields.author_name)
                .bind(&fields.author_email)
                .bind(&fields.author_login)
                .bind(opt_ts_to_db(fields.author_date))
                .bind(&fields.committer_name)
                .bind(&fields.committer_email)
                .bind(opt_ts_to_db(fields.committer_date))
                .bind(&fields.tree_sha)
                .bind(string_list_to_db(&fields.parent_shas))
                .bind(fields.additions)
                .bind(fields.deletions)
                .bind(fields.changed_files)
                .bind(&fields.html_url)
                .bind(fields.verified)
                .bind(repo_id.to_string())
                .bind(&fields.sha)
                .execute(self.pool())
                .await?;

                let record = self
                    .find_commit(repo_id, &fields.sha)
                    .await?
                    .ok_or_else(|| DbError::NotFound("commit vanished mid-upsert".into()))?;
                Ok((record, false))
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO commits
                        (id, repo_id, branch_id, sha, node_id, message, author_name,
                         author_email, author_login, author_date, committer_name,
                         committer_email, committer_date, tree_sha, parent_shas,
                         additions, deletions, changed_files, html_url, verified, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id.to_string())
                .bind(repo_id.to_string())
                .bind(branch_id.map(|u| u.to_string()))
                .bind(&fields.sha)
                .bind(&fields.node_id)
                .bind(&fields.message)
                .bind(&fields.author_name)
                .bind(&fields.author_email)
                .bind(&fields.author_login)
                .bind(opt_ts_to_db(fields.author_date))
                .bind(&fields.committer_name)
                .bind(&fields.committer_email)
                .bind(opt_ts_to_db(fields.committer_date))
                .bind(&fields.tree_sha)
                .bind(string_list_to_db(&fields.parent_shas))
                .bind(fields.additions)
                .bind(fields.deletions)
                .bind(fields.changed_files)
                .bind(&fields.html_url)
                .bind(fields.verified)
                .bind(ts_to_db(Utc::now()))
                .execute(self.pool())
                .await
                .map_err(|e| DbError::from_unique_violation(e, "commit"))?;

                let record = self
                    .find_commit(repo_id, &fields.sha)
                    .await?
                    .ok_or_else(|| DbError::NotFound("commit vanished mid-insert".into()))?;
                Ok((record, true))
            }
        }
    }

    /// Count the commits mirrored for one repository.
    pub async fn count_commits(&self, repo_id: Uuid) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM commits WHERE repo_id = ?")
            .bind(repo_id.to_string())
            .fetch_one(self.pool())
            .await?;
        Ok(row.try_get("n")?)
    }
}

#[cfg(test)]
#[path = "commit_tests.rs"]
mod tests;
