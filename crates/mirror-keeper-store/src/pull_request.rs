//! Pull request rows.
//!
//! Identity is (repository, number): PR numbers are per-repo sequential and
//! stable, while the global `github_pr_id` is kept as a secondary check.
//! Pull requests mutate over their whole life, so upserts overwrite fields
//! wholesale, guarded by the remote `updated_at` clock when both sides
//! carry one, so a late reconciliation pass cannot clobber a fresher
//! webhook write.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::convert::{opt_ts_from_db, opt_ts_to_db, ts_from_db, ts_to_db, uuid_from_db};
use crate::error::DbError;
use crate::MirrorStore;

/// One pull request row.
#[derive(Debug, Clone)]
pub struct PullRequestRecord {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub github_pr_id: i64,
    pub number: i64,
    pub node_id: Option<String>,
    pub state: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub user_login: Option<String>,
    pub user_id: Option<i64>,
    pub head_ref: Option<String>,
    pub head_sha: Option<String>,
    pub base_ref: Option<String>,
    pub base_sha: Option<String>,
    pub draft: Option<bool>,
    pub merged: Option<bool>,
    pub mergeable: Option<bool>,
    pub merged_by: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
    /// Remote-reported update time; the monotonic guard for stale writes.
    pub github_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Remote-shaped input for a pull request upsert.
#[derive(Debug, Clone, Default)]
pub struct PullRequestFields {
    pub github_pr_id: i64,
    pub number: i64,
    pub node_id: Option<String>,
    pub state: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub user_login: Option<String>,
    pub user_id: Option<i64>,
    pub head_ref: Option<String>,
    pub head_sha: Option<String>,
    pub base_ref: Option<String>,
    pub base_sha: Option<String>,
    pub draft: Option<bool>,
    pub merged: Option<bool>,
    pub mergeable: Option<bool>,
    pub merged_by: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
    pub github_updated_at: Option<DateTime<Utc>>,
}

fn row_to_pull_request(row: &SqliteRow) -> Result<PullRequestRecord, DbError> {
    Ok(PullRequestRecord {
        id: uuid_from_db(&row.try_get::<String, _>("id")?)?,
        repo_id: uuid_from_db(&row.try_get::<String, _>("repo_id")?)?,
        github_pr_id: row.try_get("github_pr_id")?,
        number: row.try_get("number")?,
        node_id: row.try_get("node_id")?,
        state: row.try_get("state")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        user_login: row.try_get("user_login")?,
        user_id: row.try_get("user_id")?,
        head_ref: row.try_get("head_ref")?,
        head_sha: row.try_get("head_sha")?,
        base_ref: row.try_get("base_ref")?,
        base_sha: row.try_get("base_sha")?,
        draft: row.try_get("draft")?,
        merged: row.try_get("merged")?,
        mergeable: row.try_get("mergeable")?,
        merged_by: row.try_get("merged_by")?,
        merged_at: opt_ts_from_db(row.try_get("merged_at")?)?,
        closed_at: opt_ts_from_db(row.try_get("closed_at")?)?,
        html_url: row.try_get("html_url")?,
        github_updated_at: opt_ts_from_db(row.try_get("github_updated_at")?)?,
        created_at: ts_from_db(&row.try_get::<String, _>("created_at")?)?,
        updated_at: ts_from_db(&row.try_get::<String, _>("updated_at")?)?,
    })
}

const SELECT_COLUMNS: &str = "id, repo_id, github_pr_id, number, node_id, state, title, body, \
     user_login, user_id, head_ref, head_sha, base_ref, base_sha, draft, merged, mergeable, \
     merged_by, merged_at, closed_at, html_url, github_updated_at, created_at, updated_at";

impl MirrorStore {
    /// Find a pull request by (repository, number).
    pub async fn find_pull_request(
        &self,
        repo_id: Uuid,
        number: i64,
    ) -> Result<Option<PullRequestRecord>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM pull_requests WHERE repo_id = ? AND number = ?"
        ))
        .bind(repo_id.to_string())
        .bind(number)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_pull_request).transpose()
    }

    /// Create or update a pull request, keyed by (repository, number).
    ///
    /// When both the stored row and the incoming record carry a remote
    /// update time and the incoming one is strictly older, the payload
    /// fields are left untouched; only the local `updated_at` advances.
    #[tracing::instrument(skip(self, fields), fields(number = fields.number))]
    pub async fn upsert_pull_request(
        &self,
        repo_id: Uuid,
        fields: PullRequestFields,
    ) -> Result<(PullRequestRecord, bool), DbError> {
        let existing = self.find_pull_request(repo_id, fields.number).await?;
        let now = ts_to_db(Utc::now());

        match existing {
            Some(current) => {
                let stale = matches!(
                    (fields.github_updated_at, current.github_updated_at),
                    (Some(incoming), Some(stored)) if incoming < stored
                );

                if stale {
                    tracing::debug!(
                        number = fields.number,
                        "stale pull request payload ignored"
                    );
                    sqlx::query(
                        "UPDATE pull_requests SET updated_at = ? WHERE repo_id = ? AND number = ?",
                    )
                    .bind(&now)
                    .bind(repo_id.to_string())
                    .bind(fields.number)
                    .execute(self.pool())
                    .await?;
                } else {
                    sqlx::query(
                        r#"
                        UPDATE pull_requests
                        SET github_pr_id = ?, node_id = ?, state = ?, title = ?, body = ?,
                            user_login = ?, user_id = ?, head_ref = ?, head_sha = ?,
                            base_ref = ?, base_sha = ?, draft = ?, merged = ?, mergeable = ?,
                            merged_by = ?, merged_at = ?, closed_at = ?, html_url = ?,
                            github_updated_at = ?, updated_at = ?
                        WHERE repo_id = ? AND number = ?
                        "#,
                    )
                    .bind(fields.github_pr_id)
                    .bind(&fields.node_id)
                    .bind(&fields.state)
                    .bind(&fields.title)
                    .bind(&fields.body)
                    .bind(&fields.user_login)
                    .bind(fields.user_id)
                    .bind(&fields.head_ref)
                    .bind(&fields.head_sha)
                    .bind(&fields.base_ref)
                    .bind(&fields.base_sha)
                    .bind(fields.draft)
                    .bind(fields.merged)
                    .bind(fields.mergeable)
                    .bind(&fields.merged_by)
                    .bind(opt_ts_to_db(fields.merged_at))
                    .bind(opt_ts_to_db(fields.closed_at))
                    .bind(&fields.html_url)
                    .bind(opt_ts_to_db(fields.github_updated_at))
                    .bind(&now)
                    .bind(repo_id.to_string())
                    .bind(fields.number)
                    .execute(self.pool())
                    .await?;
                }

                let record = self
                    .find_pull_request(repo_id, fields.number)
                    .await?
                    .ok_or_else(|| DbError::NotFound("pull request vanished mid-upsert".into()))?;
                Ok((record, false))
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO pull_requests
                        (id, repo_id, github_pr_id, number, node_id, state, title, body,
                         user_login, user_id, head_ref, head_sha, base_ref, base_sha,
                         draft, merged, mergeable, merged_by, merged_at, closed_at,
                         html_url, github_updated_at, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id.to_string())
                .bind(repo_id.to_string())
                .bind(fields.github_pr_id)
                .bind(fields.number)
                .bind(&fields.node_id)
                .bind(&fields.state)
                .bind(&fields.title)
                .bind(&fields.body)
                .bind(&fields.user_login)
                .bind(fields.user_id)
                .bind(&fields.head_ref)
                .bind(&fields.head_sha)
                .bind(&fields.base_ref)
                .bind(&fields.base_sha)
                .bind(fields.draft)
                .bind(fields.merged)
                .bind(fields.mergeable)
                .bind(&fields.merged_by)
                .bind(opt_ts_to_db(fields.merged_at))
                .bind(opt_ts_to_db(fields.closed_at))
                .bind(&fields.html_url)
                .bind(opt_ts_to_db(fields.github_updated_at))
                .bind(&now)
                .bind(&now)
                .execute(self.pool())
                .await
                .map_err(|e| DbError::from_unique_violation(e, "pull request"))?;

                tracing::info!(repo_id = %repo_id, number = fields.number, "pull request created");
                let record = self
                    .find_pull_request(repo_id, fields.number)
                    .await?
                    .ok_or_else(|| DbError::NotFound("pull request vanished mid-insert".into()))?;
                Ok((record, true))
            }
        }
    }
}

#[cfg(test)]
#[path = "pull_request_tests.rs"]
mod tests;
