//! Repository rows.
//!
//! Keyed by the remote `github_repo_id`, never the full name, which changes
//! on rename. The installation link is nullable: when an installation goes
//! away its repositories are unlinked, not deleted.

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

/// One repository row.
#[derive(Debug, Clone)]
pub struct RepositoryRecord {
    pub id: Uuid,
    /// Local id of the owning installation; `None` after unlinking.
    pub installation_id: Option<Uuid>,
    pub github_repo_id: i64,
    pub node_id: Option<String>,
    pub name: String,
    pub full_name: String,
    pub owner_login: String,
    pub owner_type: Option<String>,
    pub private: bool,
    pub description: Option<String>,
    pub fork: bool,
    pub archived: bool,
    pub disabled: bool,
    pub html_url: Option<String>,
    pub default_branch: Option<String>,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Advances on every upsert; doubles as the repository's last-sync point.
    pub updated_at: DateTime<Utc>,
}

/// Remote-shaped input for a repository upsert.
#[derive(Debug, Clone, Default)]
pub struct RepositoryFields {
    pub github_repo_id: i64,
    pub node_id: Option<String>,
    pub name: String,
    pub full_name: String,
    pub owner_login: String,
    pub owner_type: Option<String>,
    pub private: bool,
    pub description: Option<String>,
    pub fork: bool,
    pub archived: bool,
    pub disabled: bool,
    pub html_url: Option<String>,
    pub default_branch: Option<String>,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub pushed_at: Option<DateTime<Utc>>,
}

fn row_to_repository(row: &SqliteRow) -> Result<RepositoryRecord, DbError> {
    Ok(RepositoryRecord {
        id: uuid_from_db(&row.try_get::<String, _>("id")?)?,
        installation_id: opt_uuid_from_db(row.try_get("installation_id")?)?,
        github_repo_id: row.try_get("github_repo_id")?,
        node_id: row.try_get("node_id")?,
        name: row.try_get("name")?,
        full_name: row.try_get("full_name")?,
        owner_login: row.try_get("owner_login")?,
        owner_type: row.try_get("owner_type")?,
        private: row.try_get("private")?,
        description: row.try_get("description")?,
        fork: row.try_get("fork")?,
        archived: row.try_get("archived")?,
        disabled: row.try_get("disabled")?,
        html_url: row.try_get("html_url")?,
        default_branch: row.try_get("default_branch")?,
        language: row.try_get("language")?,
        topics: string_list_from_db(&row.try_get::<String, _>("topics")?)?,
        pushed_at: opt_ts_from_db(row.try_get("pushed_at")?)?,
        created_at: ts_from_db(&row.try_get::<String, _>("created_at")?)?,
        updated_at: ts_from_db(&row.try_get::<String, _>("updated_at")?)?,
    })
}

const SELECT_COLUMNS: &str = "id, installation_id, github_repo_id, node_id, name, full_name, \
     owner_login, owner_type, private, description, fork, archived, disabled, html_url, \
     default_branch, language, topics, pushed_at, created_at, updated_at";

impl MirrorStore {
    /// Find a repository by its remote id.
    pub async fn find_repository_by_github_id(
        &self,
        github_repo_id: i64,
    ) -> Result<Option<RepositoryRecord>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM repositories WHERE github_repo_id = ?"
        ))
        .bind(github_repo_id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_repository).transpose()
    }

    /// Find a repository by full name. Lookup convenience only; the full
    /// name is not an identity.
    pub async fn find_repository_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<Option<RepositoryRecord>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM repositories WHERE full_name = ?"
        ))
        .bind(full_name)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_repository).transpose()
    }

    /// List the repositories currently linked to an installation.
    pub async fn list_repositories_for_installation(
        &self,
        installation: Uuid,
    ) -> Result<Vec<RepositoryRecord>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM repositories WHERE installation_id = ? ORDER BY full_name"
        ))
        .bind(installation.to_string())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_repository).collect()
    }

    /// Create or update a repository, keyed by remote id.
    ///
    /// `installation` links the row on create; on update the existing link
    /// is kept unless a new one is provided.
    #[tracing::instrument(skip(self, fields), fields(github_repo_id = fields.github_repo_id))]
    pub async fn upsert_repository(
        &self,
        installation: Option<Uuid>,
        fields: RepositoryFields,
    ) -> Result<(RepositoryRecord, bool), DbError> {
        let existing = self.find_repository_by_github_id(fields.github_repo_id).await?;
        let now = ts_to_db(Utc::now());

        match existing {
            Some(current) => {
                let link = installation.or(current.installation_id);
                sqlx::query(
                    r#"
                    UPDATE repositories
                    SET installation_id = ?, node_id = ?, name = ?, full_name = ?,
                        owner_login = ?, owner_type = ?, private = ?, description = ?,
                        fork = ?, archived = ?, disabled = ?, html_url = ?,
                        default_branch = ?, language = ?, topics = ?, pushed_at = ?,
                        updated_at = ?
                    WHERE github_repo_id = ?
                    "#,
                )
                .bind(link.map(|u| u.to_string()))
                .bind(&fields.node_id)
                .bind(&fields.name)
                .bind(&fields.full_name)
                .bind(&fields.owner_login)
                .bind(&fields.owner_type)
                .bind(fields.private)
                .bind(&fields.description)
                .bind(fields.fork)
                .bind(fields.archived)
                .bind(fields.disabled)
                .bind(&fields.html_url)
                .bind(&fields.default_branch)
                .bind(&fields.language)
                .bind(string_list_to_db(&fields.topics))
                .bind(opt_ts_to_db(fields.pushed_at))
                .bind(&now)
                .bind(fields.github_repo_id)
                .execute(self.pool())
                .await?;

                let record = self
                    .find_repository_by_github_id(fields.github_repo_id)
                    .await?
                    .ok_or_else(|| DbError::NotFound("repository vanished mid-upsert".into()))?;
                Ok((record, false))
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO repositories
                        (id, installation_id, github_repo_id, node_id, name, full_name,
                         owner_login, owner_type, private, description, fork, archived,
                         disabled, html_url, default_branch, language, topics, pushed_at,
                         created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id.to_string())
                .bind(installation.map(|u| u.to_string()))
                .bind(fields.github_repo_id)
                .bind(&fields.node_id)
                .bind(&fields.name)
                .bind(&fields.full_name)
                .bind(&fields.owner_login)
                .bind(&fields.owner_type)
                .bind(fields.private)
                .bind(&fields.description)
                .bind(fields.fork)
                .bind(fields.archived)
                .bind(fields.disabled)
                .bind(&fields.html_url)
                .bind(&fields.default_branch)
                .bind(&fields.language)
                .bind(string_list_to_db(&fields.topics))
                .bind(opt_ts_to_db(fields.pushed_at))
                .bind(&now)
                .bind(&now)
                .execute(self.pool())
                .await
                .map_err(|e| DbError::from_unique_violation(e, "repository"))?;

                tracing::info!(
                    github_repo_id = fields.github_repo_id,
                    full_name = %fields.full_name,
                    "repository created"
                );
                let record = self
                    .find_repository_by_github_id(fields.github_repo_id)
                    .await?
                    .ok_or_else(|| DbError::NotFound("repository vanished mid-insert".into()))?;
                Ok((record, true))
            }
        }
    }

    /// Advance a repository's `updated_at` without touching its fields.
    ///
    /// Reconciliation calls this after finishing a repository so the next
    /// run's "changed since" comparisons start from this point.
    pub async fn touch_repository(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE repositories SET updated_at = ? WHERE id = ?")
            .bind(ts_to_db(Utc::now()))
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Clear the installation link of one repository. Returns false when the
    /// repository is unknown locally.
    pub async fn unlink_repository(&self, github_repo_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE repositories SET installation_id = NULL, updated_at = ? WHERE github_repo_id = ?",
        )
        .bind(ts_to_db(Utc::now()))
        .bind(github_repo_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
