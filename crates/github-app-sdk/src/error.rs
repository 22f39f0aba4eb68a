//! Error types for GitHub App SDK operations.
//!
//! Errors are classified for retry logic: `is_transient()` distinguishes
//! conditions that may succeed on a later attempt (rate limits, timeouts,
//! server errors) from terminal ones (bad credentials, missing resources).

use thiserror::Error;

use crate::auth::InstallationId;

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// App id or private key is absent. This is a configuration problem for
    /// the affected operation, not a process-fatal condition: callers that do
    /// not need fresh remote credentials can continue.
    #[error("GitHub App credentials not configured: {message}")]
    NotConfigured { message: String },

    /// The private key could not be parsed or used for signing.
    #[error("invalid GitHub App private key: {message}")]
    InvalidPrivateKey { message: String },

    /// Building or encoding the signed app assertion failed.
    #[error("failed to sign app assertion: {message}")]
    AssertionFailed { message: String },

    /// The token endpoint returned a non-success status.
    #[error("installation token exchange failed for {installation_id}: {status} - {message}")]
    ExchangeFailed {
        installation_id: InstallationId,
        status: u16,
        message: String,
    },

    /// The token endpoint answered 2xx but the body was not a token.
    #[error("installation token response malformed: {message}")]
    MalformedTokenResponse { message: String },

    /// Underlying API transport failure.
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

impl AuthError {
    /// Check whether retrying the operation could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotConfigured { .. } => false,
            Self::InvalidPrivateKey { .. } => false,
            Self::AssertionFailed { .. } => false,
            Self::ExchangeFailed { status, .. } => *status >= 500 || *status == 429,
            Self::MalformedTokenResponse { .. } => false,
            Self::Api(e) => e.is_transient(),
        }
    }
}

/// Errors from GitHub REST API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success HTTP response that is not a rate limit.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Primary (429) or secondary (403) rate limit hit.
    #[error("rate limited by GitHub API")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The requested resource does not exist.
    #[error("resource not found")]
    NotFound,

    /// Connection-level failure (DNS, TLS, reset).
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Map a `reqwest` error onto the taxonomy.
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode {
                message: e.to_string(),
            }
        } else {
            Self::Transport {
                message: e.to_string(),
            }
        }
    }

    /// Check whether retrying the request could succeed.
    ///
    /// Rate limits, timeouts, transport failures and server errors are
    /// transient; client errors and decode failures are terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => *status >= 500,
            Self::RateLimited { .. } => true,
            Self::Timeout => true,
            Self::NotFound => false,
            Self::Transport { .. } => true,
            Self::Decode { .. } => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
