//! Column conversion helpers.
//!
//! SQLite has no native timestamp, UUID or array types; timestamps travel as
//! RFC3339 text, UUIDs as text, lists and maps as JSON text.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;

pub(crate) fn ts_to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn opt_ts_to_db(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(ts_to_db)
}

pub(crate) fn ts_from_db(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Internal(format!("invalid stored timestamp '{raw}': {e}")))
}

pub(crate) fn opt_ts_from_db(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    raw.as_deref().map(ts_from_db).transpose()
}

pub(crate) fn uuid_from_db(raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Internal(format!("invalid stored UUID '{raw}': {e}")))
}

pub(crate) fn opt_uuid_from_db(raw: Option<String>) -> Result<Option<Uuid>, DbError> {
    raw.as_deref().map(uuid_from_db).transpose()
}

pub(crate) fn string_list_to_db(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

pub(crate) fn string_list_from_db(raw: &str) -> Result<Vec<String>, DbError> {
    serde_json::from_str(raw)
        .map_err(|e| DbError::Internal(format!("invalid stored JSON list: {e}")))
}

pub(crate) fn json_to_db(value: &serde_json::Value) -> String {
    value.to_string()
}

pub(crate) fn json_from_db(raw: &str) -> Result<serde_json::Value, DbError> {
    serde_json::from_str(raw).map_err(|e| DbError::Internal(format!("invalid stored JSON: {e}")))
}
