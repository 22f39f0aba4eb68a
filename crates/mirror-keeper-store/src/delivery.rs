//! Webhook delivery log.
//!
//! Append-only audit trail of every inbound delivery, written before any
//! processing so failures stay diagnosable and replayable. The remote
//! delivery id is unique: a redelivery reuses the existing row instead of
//! logging twice. Rows never mutate except the processed/error flip.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::convert::{json_from_db, json_to_db, opt_ts_from_db, ts_from_db, ts_to_db};
use crate::error::DbError;
use crate::MirrorStore;

/// One logged delivery.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub id: i64,
    pub event_type: String,
    pub delivery_id: Option<String>,
    pub payload: serde_json::Value,
    pub signature: Option<String>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn row_to_delivery(row: &SqliteRow) -> Result<DeliveryRecord, DbError> {
    Ok(DeliveryRecord {
        id: row.try_get("id")?,
        event_type: row.try_get("event_type")?,
        delivery_id: row.try_get("delivery_id")?,
        payload: json_from_db(&row.try_get::<String, _>("payload")?)?,
        signature: row.try_get("signature")?,
        processed: row.try_get("processed")?,
        processed_at: opt_ts_from_db(row.try_get("processed_at")?)?,
        error_message: row.try_get("error_message")?,
        created_at: ts_from_db(&row.try_get::<String, _>("created_at")?)?,
    })
}

const SELECT_COLUMNS: &str = "id, event_type, delivery_id, payload, signature, processed, \
     processed_at, error_message, created_at";

impl MirrorStore {
    /// Record a delivery before processing it.
    ///
    /// Returns the row and whether it was newly logged; a known delivery id
    /// returns the existing row (dedup of re-logging only; the caller still
    /// re-processes, relying on idempotent upserts).
    #[tracing::instrument(skip(self, payload, signature))]
    pub async fn log_delivery(
        &self,
        event_type: &str,
        delivery_id: Option<&str>,
        payload: &serde_json::Value,
        signature: Option<&str>,
    ) -> Result<(DeliveryRecord, bool), DbError> {
        if let Some(delivery_id) = delivery_id {
            if let Some(existing) = self.find_delivery_by_remote_id(delivery_id).await? {
                tracing::debug!(delivery_id, "delivery already logged, reusing row");
                return Ok((existing, false));
            }
        }

        let result = sqlx::query(
            r#"
            INSERT INTO webhook_deliveries
                (event_type, delivery_id, payload, signature, processed, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(event_type)
        .bind(delivery_id)
        .bind(json_to_db(payload))
        .bind(signature)
        .bind(ts_to_db(Utc::now()))
        .execute(self.pool())
        .await
        .map_err(|e| DbError::from_unique_violation(e, "webhook delivery"))?;

        let id = result.last_insert_rowid();
        let record = self
            .get_delivery(id)
            .await?
            .ok_or_else(|| DbError::NotFound("delivery vanished mid-insert".into()))?;
        Ok((record, true))
    }

    /// Fetch one delivery by local row id.
    pub async fn get_delivery(&self, id: i64) -> Result<Option<DeliveryRecord>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM webhook_deliveries WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_delivery).transpose()
    }

    /// Fetch one delivery by the remote delivery id.
    pub async fn find_delivery_by_remote_id(
        &self,
        delivery_id: &str,
    ) -> Result<Option<DeliveryRecord>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM webhook_deliveries WHERE delivery_id = ?"
        ))
        .bind(delivery_id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_delivery).transpose()
    }

    /// Flip a delivery to processed.
    pub async fn mark_delivery_processed(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE webhook_deliveries SET processed = 1, processed_at = ?, error_message = NULL \
             WHERE id = ?",
        )
        .bind(ts_to_db(Utc::now()))
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("delivery {id} not found")));
        }
        Ok(())
    }

    /// Record a processing failure on a delivery.
    pub async fn mark_delivery_failed(&self, id: i64, error: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE webhook_deliveries SET processed = 0, error_message = ? WHERE id = ?",
        )
        .bind(error)
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("delivery {id} not found")));
        }
        Ok(())
    }

    /// List logged deliveries of one event type, newest first.
    pub async fn list_deliveries_for_event(
        &self,
        event_type: &str,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM webhook_deliveries WHERE event_type = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(event_type)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_delivery).collect()
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
