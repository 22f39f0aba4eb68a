//! Issue rows.
//!
//! Same identity scheme as pull requests: (repository, number) with the
//! global `github_issue_id` as a secondary check, and the same remote
//! update-time guard. Labels and assignees are replaced wholesale on every
//! upsert; absence in the new payload means removal.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::convert::{
    opt_ts_from_db, opt_ts_to_db, string_list_from_db, string_list_to_db, ts_from_db, ts_to_db,
    uuid_from_db,
};
use crate::error::DbError;
use crate::MirrorStore;

/// One issue row.
#[derive(Debug, Clone)]
pub struct IssueRecord {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub github_issue_id: i64,
    pub number: i64,
    pub node_id: Option<String>,
    pub state: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub user_login: Option<String>,
    pub user_id: Option<i64>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<String>,
    pub locked: Option<bool>,
    pub comments_count: Option<i64>,
    pub closed_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
    pub github_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Remote-shaped input for an issue upsert.
#[derive(Debug, Clone, Default)]
pub struct IssueFields {
    pub github_issue_id: i64,
    pub number: i64,
    pub node_id: Option<String>,
    pub state: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub user_login: Option<String>,
    pub user_id: Option<i64>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<String>,
    pub locked: Option<bool>,
    pub comments_count: Option<i64>,
    pub closed_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
    pub github_updated_at: Option<DateTime<Utc>>,
}

fn row_to_issue(row: &SqliteRow) -> Result<IssueRecord, DbError> {
    Ok(IssueRecord {
        id: uuid_from_db(&row.try_get::<String, _>("id")?)?,
        repo_id: uuid_from_db(&row.try_get::<String, _>("repo_id")?)?,
        github_issue_id: row.try_get("github_issue_id")?,
        number: row.try_get("number")?,
        node_id: row.try_get("node_id")?,
        state: row.try_get("state")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        user_login: row.try_get("user_login")?,
        user_id: row.try_get("user_id")?,
        labels: string_list_from_db(&row.try_get::<String, _>("labels")?)?,
        assignees: string_list_from_db(&row.try_get::<String, _>("assignees")?)?,
        milestone: row.try_get("milestone")?,
        locked: row.try_get("locked")?,
        comments_count: row.try_get("comments_count")?,
        closed_at: opt_ts_from_db(row.try_get("closed_at")?)?,
        html_url: row.try_get("html_url")?,
        github_updated_at: opt_ts_from_db(row.try_get("github_updated_at")?)?,
        created_at: ts_from_db(&row.try_get::<String, _>("created_at")?)?,
        updated_at: ts_from_db(&row.try_get::<String, _>("updated_at")?)?,
    })
}

const SELECT_COLUMNS: &str = "id, repo_id, github_issue_id, number, node_id, state, title, body, \
     user_login, user_id, labels, assignees, milestone, locked, comments_count, closed_at, \
     html_url, github_updated_at, created_at, updated_at";

impl MirrorStore {
    /// Find an issue by (repository, number).
    pub async fn find_issue(
        &self,
        repo_id: Uuid,
        number: i64,
    ) -> Result<Option<IssueRecord>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM github_issues WHERE repo_id = ? AND number = ?"
        ))
        .bind(repo_id.to_string())
        .bind(number)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_issue).transpose()
    }

    /// Create or update an issue, keyed by (repository, number).
    ///
    /// The same staleness guard as pull requests applies.
    #[tracing::instrument(skip(self, fields), fields(number = fields.number))]
    pub async fn upsert_issue(
        &self,
        repo_id: Uuid,
        fields: IssueFields,
    ) -> Result<(IssueRecord, bool), DbError> {
        let existing = self.find_issue(repo_id, fields.number).await?;
        let now = ts_to_db(Utc::now());

        match existing {
            Some(current) => {
                let stale = matches!(
                    (fields.github_updated_at, current.github_updated_at),
                    (Some(incoming), Some(stored)) if incoming < stored
                );

                if stale {
                    tracing::debug!(number = fields.number, "stale issue payload ignored");
                    sqlx::query(
                        "UPDATE github_issues SET updated_at = ? WHERE repo_id = ? AND number = ?",
                    )
                    .bind(&now)
                    .bind(repo_id.to_string())
                    .bind(fields.number)
                    .execute(self.pool())
                    .await?;
                } else {
                    sqlx::query(
                        r#"
                        UPDATE github_issues
                        SET github_issue_id = ?, node_id = ?, state = ?, title = ?, body = ?,
                            user_login = ?, user_id = ?, labels = ?, assignees = ?,
                            milestone = ?, locked = ?, comments_count = ?, closed_at = ?,
                            html_url = ?, github_updated_at = ?, updated_at = ?
                        WHERE repo_id = ? AND number = ?
                        "#,
                    )
                    .bind(fields.github_issue_id)
                    .bind(&fields.node_id)
                    .bind(&fields.state)
                    .bind(&fields.title)
                    .bind(&fields.body)
                    .bind(&fields.user_login)
                    .bind(fields.user_id)
                    .bind(string_list_to_db(&fields.labels))
                    .bind(string_list_to_db(&fields.assignees))
                    .bind(&fields.milestone)
                    .bind(fields.locked)
                    .bind(fields.comments_count)
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
                    .find_issue(repo_id, fields.number)
                    .await?
                    .ok_or_else(|| DbError::NotFound("issue vanished mid-upsert".into()))?;
                Ok((record, false))
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO github_issues
                        (id, repo_id, github_issue_id, number, node_id, state, title, body,
                         user_login, user_id, labels, assignees, milestone, locked,
                         comments_count, closed_at, html_url, github_updated_at,
                         created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id.to_string())
                .bind(repo_id.to_string())
                .bind(fields.github_issue_id)
                .bind(fields.number)
                .bind(&fields.node_id)
                .bind(&fields.state)
                .bind(&fields.title)
                .bind(&fields.body)
                .bind(&fields.user_login)
                .bind(fields.user_id)
                .bind(string_list_to_db(&fields.labels))
                .bind(string_list_to_db(&fields.assignees))
                .bind(&fields.milestone)
                .bind(fields.locked)
                .bind(fields.comments_count)
                .bind(opt_ts_to_db(fields.closed_at))
                .bind(&fields.html_url)
                .bind(opt_ts_to_db(fields.github_updated_at))
                .bind(&now)
                .bind(&now)
                .execute(self.pool())
                .await
                .map_err(|e| DbError::from_unique_violation(e, "issue"))?;

                tracing::info!(repo_id = %repo_id, number = fields.number, "issue created");
                let record = self
                    .find_issue(repo_id, fields.number)
                    .await?
                    .ok_or_else(|| DbError::NotFound("issue vanished mid-insert".into()))?;
                Ok((record, true))
            }
        }
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
