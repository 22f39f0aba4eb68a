//! # GitHub App SDK
//!
//! GitHub App integration layer for Mirror-Keeper: App authentication,
//! installation token management, a thin retrying API client, and webhook
//! signature verification.
//!
//! This SDK provides:
//! - RS256 app assertions and short-lived installation tokens
//! - An expiry-aware installation token cache
//! - REST client wrappers for the endpoints the mirror consumes
//! - HMAC-SHA256 webhook signature verification with constant-time comparison

pub mod auth;
pub mod client;
pub mod error;
pub mod webhook;

pub use auth::{
    AppAssertion, CredentialConfig, CredentialProvider, GitHubAppId, InstallationId,
    InstallationToken, RepositoryId,
};
pub use client::{ClientConfig, GitHubClient, RetryPolicy};
pub use error::{ApiError, AuthError};
pub use webhook::{compute_signature_header, verify_signature, SignatureOutcome};
