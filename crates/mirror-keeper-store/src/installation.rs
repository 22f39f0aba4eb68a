//! Installation rows: one per app-to-account binding.
//!
//! Keyed by the remote installation id. Suspension is soft state
//! (`suspended_at` set in place); deletion is hard but leaves the
//! installation's repositories behind with their link cleared, so history
//! survives an uninstall.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::convert::{
    json_from_db, json_to_db, opt_ts_from_db, opt_ts_to_db, string_list_from_db, string_list_to_db,
    ts_from_db, ts_to_db, uuid_from_db,
};
use crate::error::DbError;
use crate::MirrorStore;

/// One installation row.
#[derive(Debug, Clone)]
pub struct InstallationRecord {
    pub id: Uuid,
    pub installation_id: i64,
    pub account_login: String,
    pub account_type: Option<String>,
    pub account_id: Option<i64>,
    pub target_type: Option<String>,
    pub repository_selection: Option<String>,
    pub app_id: Option<i64>,
    pub app_slug: Option<String>,
    /// Opaque permission map, stored verbatim.
    pub permissions: serde_json::Value,
    pub events: Vec<String>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstallationRecord {
    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }
}

/// Remote-shaped input for an installation upsert.
#[derive(Debug, Clone)]
pub struct InstallationFields {
    pub installation_id: i64,
    pub account_login: String,
    pub account_type: Option<String>,
    pub account_id: Option<i64>,
    pub target_type: Option<String>,
    pub repository_selection: Option<String>,
    pub app_id: Option<i64>,
    pub app_slug: Option<String>,
    pub permissions: serde_json::Value,
    pub events: Vec<String>,
    pub suspended_at: Option<DateTime<Utc>>,
}

fn row_to_installation(row: &SqliteRow) -> Result<InstallationRecord, DbError> {
    Ok(InstallationRecord {
        id: uuid_from_db(&row.try_get::<String, _>("id")?)?,
        installation_id: row.try_get("installation_id")?,
        account_login: row.try_get("account_login")?,
        account_type: row.try_get("account_type")?,
        account_id: row.try_get("account_id")?,
        target_type: row.try_get("target_type")?,
        repository_selection: row.try_get("repository_selection")?,
        app_id: row.try_get("app_id")?,
        app_slug: row.try_get("app_slug")?,
        permissions: json_from_db(&row.try_get::<String, _>("permissions")?)?,
        events: string_list_from_db(&row.try_get::<String, _>("events")?)?,
        suspended_at: opt_ts_from_db(row.try_get("suspended_at")?)?,
        created_at: ts_from_db(&row.try_get::<String, _>("created_at")?)?,
        updated_at: ts_from_db(&row.try_get::<String, _>("updated_at")?)?,
    })
}

const SELECT_COLUMNS: &str = "id, installation_id, account_login, account_type, account_id, \
     target_type, repository_selection, app_id, app_slug, permissions, events, \
     suspended_at, created_at, updated_at";

impl MirrorStore {
    /// Find an installation by its remote id.
    pub async fn find_installation(
        &self,
        installation_id: i64,
    ) -> Result<Option<InstallationRecord>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM installations WHERE installation_id = ?"
        ))
        .bind(installation_id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_installation).transpose()
    }

    /// Create or update an installation, keyed by remote id.
    ///
    /// Returns the stored row and whether it was created.
    #[tracing::instrument(skip(self, fields), fields(installation_id = fields.installation_id))]
    pub async fn upsert_installation(
        &self,
        fields: InstallationFields,
    ) -> Result<(InstallationRecord, bool), DbError> {
        let existing = self.find_installation(fields.installation_id).await?;
        let now = ts_to_db(Utc::now());

        match existing {
            Some(current) => {
                sqlx::query(
                    r#"
                    UPDATE installations
                    SET account_login = ?, account_type = ?, account_id = ?,
                        target_type = ?, repository_selection = ?, app_id = ?, app_slug = ?,
                        permissions = ?, events = ?, suspended_at = ?, updated_at = ?
                    WHERE installation_id = ?
                    "#,
                )
                .bind(&fields.account_login)
                .bind(&fields.account_type)
                .bind(fields.account_id)
                .bind(&fields.target_type)
                .bind(&fields.repository_selection)
                .bind(fields.app_id)
                .bind(&fields.app_slug)
                .bind(json_to_db(&fields.permissions))
                .bind(string_list_to_db(&fields.events))
                .bind(opt_ts_to_db(fields.suspended_at))
                .bind(&now)
                .bind(fields.installation_id)
                .execute(self.pool())
                .await?;

                tracing::debug!(installation_id = current.installation_id, "installation updated");
                let record = self
                    .find_installation(fields.installation_id)
                    .await?
                    .ok_or_else(|| DbError::NotFound("installation vanished mid-upsert".into()))?;
                Ok((record, false))
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO installations
                        (id, installation_id, account_login, account_type, account_id,
                         target_type, repository_selection, app_id, app_slug,
                         permissions, events, suspended_at, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id.to_string())
                .bind(fields.installation_id)
                .bind(&fields.account_login)
                .bind(&fields.account_type)
                .bind(fields.account_id)
                .bind(&fields.target_type)
                .bind(&fields.repository_selection)
                .bind(fields.app_id)
                .bind(&fields.app_slug)
                .bind(json_to_db(&fields.permissions))
                .bind(string_list_to_db(&fields.events))
                .bind(opt_ts_to_db(fields.suspended_at))
                .bind(&now)
                .bind(&now)
                .execute(self.pool())
                .await
                .map_err(|e| DbError::from_unique_violation(e, "installation"))?;

                tracing::info!(installation_id = fields.installation_id, "installation created");
                let record = self
                    .find_installation(fields.installation_id)
                    .await?
                    .ok_or_else(|| DbError::NotFound("installation vanished mid-insert".into()))?;
                Ok((record, true))
            }
        }
    }

    /// Set or clear the suspension marker. Returns false when the
    /// installation is unknown locally.
    pub async fn set_installation_suspended(
        &self,
        installation_id: i64,
        suspended: bool,
    ) -> Result<bool, DbError> {
        let suspended_at = suspended.then(|| ts_to_db(Utc::now()));
        let result = sqlx::query(
            "UPDATE installations SET suspended_at = ?, updated_at = ? WHERE installation_id = ?",
        )
        .bind(suspended_at)
        .bind(ts_to_db(Utc::now()))
        .bind(installation_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an installation, unlinking (not deleting) its repositories.
    ///
    /// Both writes happen in one transaction. Returns false when the
    /// installation is unknown locally.
    #[tracing::instrument(skip(self))]
    pub async fn delete_installation(&self, installation_id: i64) -> Result<bool, DbError> {
        let Some(record) = self.find_installation(installation_id).await? else {
            return Ok(false);
        };

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "UPDATE repositories SET installation_id = NULL, updated_at = ? WHERE installation_id = ?",
        )
        .bind(ts_to_db(Utc::now()))
        .bind(record.id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM installations WHERE installation_id = ?")
            .bind(installation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(installation_id, "installation deleted, repositories unlinked");
        Ok(true)
    }
}

#[cfg(test)]
#[path = "installation_tests.rs"]
mod tests;
