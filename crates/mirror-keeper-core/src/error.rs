//! Error types for dispatch and reconciliation.

use thiserror::Error;

/// Failure while processing one webhook delivery.
///
/// Any of these aborts the delivery, is recorded on its log row, and
/// surfaces to the transport boundary as a 5xx so the sender's retry
/// semantics engage. Unknown event types are NOT an error; the boundary
/// must never reject a delivery type it does not understand.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload was not valid JSON or did not match the event shape.
    #[error("malformed {event_type} payload: {message}")]
    MalformedPayload { event_type: String, message: String },

    /// A referenced parent entity is missing locally.
    #[error("repository {identifier} not known locally")]
    RepositoryNotFound { identifier: String },

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] mirror_keeper_store::DbError),
}

/// Failure inside a reconciliation run.
///
/// These never escape [`crate::sync::ReconciliationEngine`]: top-level
/// failures become the summary's single GLOBAL error entry, per-repository
/// failures land in the summary's error map.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The installation is not mirrored locally.
    #[error("installation {0} not found")]
    InstallationNotFound(i64),

    /// Could not obtain credentials for the remote API.
    #[error("credentials unavailable: {0}")]
    Credentials(#[from] github_app_sdk::AuthError),

    /// Remote API failure.
    #[error(transparent)]
    Api(#[from] github_app_sdk::ApiError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] mirror_keeper_store::DbError),
}
