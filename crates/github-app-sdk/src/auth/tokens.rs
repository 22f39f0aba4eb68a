//! Credential provider: app assertions and installation token exchange.
//!
//! The provider owns the two steps of the GitHub App credential chain:
//! sign a short-lived app assertion with the private key, then exchange it
//! at `/app/installations/{id}/access_tokens` for an installation-scoped
//! token. Exchanged tokens are cached per installation with an expiry
//! margin.
//!
//! Missing credentials are not fatal at construction time: the provider is
//! built in an unconfigured state and every operation that needs the key
//! reports [`AuthError::NotConfigured`], so webhook ingestion keeps working
//! while remote API access degrades.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{
    sign_app_assertion, AppAssertion, GitHubAppId, InstallationId, InstallationToken,
    InstallationTokenCache,
};
use crate::error::AuthError;

/// Configuration for the credential provider.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// GitHub App id. `None` leaves the provider unconfigured.
    pub app_id: Option<u64>,

    /// PEM-encoded RSA private key. `None` leaves the provider unconfigured.
    pub private_key_pem: Option<String>,

    /// GitHub API base URL (overridable for GitHub Enterprise and tests).
    pub api_base_url: String,

    /// User agent sent with token exchange requests.
    pub user_agent: String,

    /// Timeout for the token exchange call.
    pub timeout: StdDuration,

    /// Cached tokens are refreshed when they expire within this window.
    pub token_refresh_margin: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            private_key_pem: None,
            api_base_url: "https://api.github.com".to_string(),
            user_agent: "mirror-keeper".to_string(),
            timeout: StdDuration::from_secs(30),
            token_refresh_margin: Duration::minutes(5),
        }
    }
}

/// Wire shape of the access-token response.
#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Signs app assertions and mints installation tokens.
pub struct CredentialProvider {
    credentials: Option<(GitHubAppId, String)>,
    http: reqwest::Client,
    api_base_url: String,
    cache: InstallationTokenCache,
}

impl CredentialProvider {
    /// Build a provider from configuration.
    ///
    /// An absent app id or private key produces a provider that answers
    /// [`AuthError::NotConfigured`] for credential operations; this is logged
    /// once here so the degraded mode is visible at startup.
    pub fn new(config: CredentialConfig) -> Result<Self, AuthError> {
        let credentials = match (config.app_id, config.private_key_pem) {
            (Some(app_id), Some(pem)) if !pem.trim().is_empty() => {
                info!(app_id = app_id, "GitHub App credentials loaded");
                Some((GitHubAppId::new(app_id), pem))
            }
            _ => {
                warn!(
                    "GitHub App id or private key not configured; \
                     remote API operations are disabled until provided"
                );
                None
            }
        };

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| AuthError::AssertionFailed {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            credentials,
            http,
            api_base_url: config.api_base_url,
            cache: InstallationTokenCache::new(config.token_refresh_margin),
        })
    }

    /// Whether an app id and private key are present.
    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Sign a fresh app assertion.
    pub fn sign_app_assertion(&self) -> Result<AppAssertion, AuthError> {
        let (app_id, pem) = self.credentials.as_ref().ok_or(AuthError::NotConfigured {
            message: "app id or private key missing".to_string(),
        })?;
        sign_app_assertion(*app_id, pem)
    }

    /// Get an installation token, reusing a cached one while still valid.
    pub async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        if let Some(token) = self.cache.get(installation_id) {
            debug!(installation_id = %installation_id, "installation token cache hit");
            return Ok(token);
        }
        self.refresh_installation_token(installation_id).await
    }

    /// Mint a fresh installation token, bypassing and replacing the cache.
    pub async fn refresh_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let assertion = self.sign_app_assertion()?;

        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base_url, installation_id
        );

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", assertion.token()))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(crate::error::ApiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_string());
            return Err(AuthError::ExchangeFailed {
                installation_id,
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: AccessTokenResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::MalformedTokenResponse {
                    message: e.to_string(),
                })?;

        let token = InstallationToken::new(parsed.token, installation_id, parsed.expires_at);
        self.cache.store(token.clone());

        info!(
            installation_id = %installation_id,
            expires_at = %token.expires_at(),
            "minted installation token"
        );

        Ok(token)
    }
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("configured", &self.is_configured())
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
