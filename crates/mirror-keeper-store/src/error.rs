//! Database error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying driver failure.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint fired where a new row was expected.
    ///
    /// Surfaced, never swallowed: it means an upsert's find step raced or
    /// missed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be interpreted (bad timestamp, bad UUID).
    #[error("internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// Map a unique-constraint violation onto [`DbError::Conflict`].
    pub(crate) fn from_unique_violation(e: sqlx::Error, what: &str) -> Self {
        match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(format!("{what} already exists"))
            }
            _ => Self::Sqlx(e),
        }
    }
}
