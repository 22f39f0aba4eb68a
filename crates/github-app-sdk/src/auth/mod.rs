//! GitHub App authentication types.
//!
//! This module provides the core authentication types for the App credential
//! chain:
//! - ID newtypes (`GitHubAppId`, `InstallationId`, `RepositoryId`)
//! - Token types (`AppAssertion`, `InstallationToken`) with redacted `Debug`
//! - The [`CredentialProvider`] that signs app assertions and exchanges them
//!   for installation-scoped access tokens

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

mod cache;
mod jwt;
mod tokens;

pub use cache::InstallationTokenCache;
pub use jwt::sign_app_assertion;
pub use tokens::{CredentialConfig, CredentialProvider};

// ============================================================================
// Core ID Types
// ============================================================================

/// GitHub App identifier assigned during app registration.
///
/// Globally unique, used as the `iss` claim of app assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitHubAppId(u64);

impl GitHubAppId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GitHubAppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GitHubAppId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self::new)
    }
}

/// Installation identifier for one app-to-account binding.
///
/// Assigned by GitHub when the app is installed on a user or organization
/// account; used to mint installation tokens and to key the local
/// installation mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallationId(u64);

impl InstallationId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstallationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self::new)
    }
}

/// Repository identifier used by the GitHub API.
///
/// Stable across renames and transfers, which is why it (and never the full
/// name) is the dedup key for mirrored repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryId(u64);

impl RepositoryId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Token Types
// ============================================================================

/// Signed app-level assertion (a short-lived RS256 JWT).
///
/// Used as the bearer credential for app-scoped endpoints, most importantly
/// the installation token exchange. Maximum lifetime is 10 minutes.
///
/// The token string is never exposed in `Debug` output.
#[derive(Clone)]
pub struct AppAssertion {
    token: String,
    app_id: GitHubAppId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl AppAssertion {
    pub fn new(token: String, app_id: GitHubAppId, expires_at: DateTime<Utc>) -> Self {
        Self {
            token,
            app_id,
            issued_at: Utc::now(),
            expires_at,
        }
    }

    /// The encoded JWT, for `Authorization: Bearer <token>`.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl fmt::Debug for AppAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppAssertion")
            .field("app_id", &self.app_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// Installation-scoped access token.
///
/// Minted from an app assertion; valid roughly one hour and scoped to one
/// installation's repositories. The token string is never exposed in `Debug`
/// output.
#[derive(Clone)]
pub struct InstallationToken {
    token: String,
    installation_id: InstallationId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl InstallationToken {
    pub fn new(
        token: String,
        installation_id: InstallationId,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            installation_id,
            issued_at: Utc::now(),
            expires_at,
        }
    }

    /// The token string, for `Authorization: Bearer <token>`.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn installation_id(&self) -> InstallationId {
        self.installation_id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// True when the token expires within `margin` from now.
    pub fn expires_soon(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

impl fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationToken")
            .field("installation_id", &self.installation_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
