//! GitHub REST client for the endpoints the mirror consumes.
//!
//! A thin wrapper over `reqwest` that attaches the required GitHub headers
//! (`Accept`, `X-GitHub-Api-Version`, user agent), bounds every call with a
//! timeout, and retries transient failures with exponential backoff.
//!
//! App-scoped calls authenticate with an [`AppAssertion`]; per-repository
//! reads authenticate with an [`InstallationToken`].

mod installation;
mod issue;
mod pull_request;
mod repository;
mod retry;

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::{AppAssertion, InstallationToken};
use crate::error::ApiError;

pub use installation::{InstallationAccount, InstallationInfo};
pub use issue::{IssueLabel, IssueMilestone, IssueUser, RemoteIssue};
pub use pull_request::{PullRequestRef, RemotePullRequest, RemoteReview};
pub use repository::{
    BranchHead, CommitAuthor, CommitDetail, CommitFile, CommitParent, CommitPayload, CommitStats,
    CommitUser, CommitVerification, RemoteBranch, RemoteRepository, RepositoryOwner,
};
pub use retry::RetryPolicy;

const API_VERSION: &str = "2022-11-28";

/// Configuration for client behavior.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string (required by GitHub).
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// GitHub API base URL.
    pub api_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "mirror-keeper/0.1.0".to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            api_base_url: "https://api.github.com".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// GitHub API client.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl GitHubClient {
    /// Build a client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET an app-scoped resource, authenticated with a signed assertion.
    pub(crate) async fn get_as_app<T: DeserializeOwned>(
        &self,
        path: &str,
        assertion: &AppAssertion,
    ) -> Result<T, ApiError> {
        self.get_json(path, &[], assertion.token()).await
    }

    /// GET an installation-scoped resource.
    pub(crate) async fn get_as_installation<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &InstallationToken,
    ) -> Result<T, ApiError> {
        self.get_json(path, query, token.token()).await
    }

    /// GET with retry, classification, and JSON decoding.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        bearer: &str,
    ) -> Result<T, ApiError> {
        let url = format!(
            "{}/{}",
            self.config.api_base_url,
            path.strip_prefix('/').unwrap_or(path)
        );

        let mut attempt = 0u32;
        loop {
            match self.send_once(&url, query, bearer).await {
                Ok(response) => {
                    return response.json::<T>().await.map_err(|e| ApiError::Decode {
                        message: format!("{url}: {e}"),
                    });
                }
                Err(e) if e.is_transient() && self.config.retry.should_retry(attempt) => {
                    let delay = self.config.retry.delay_for(attempt + 1, &e);
                    warn!(
                        url = %url,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient API failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One request/response cycle with status classification.
    async fn send_once(
        &self,
        url: &str,
        query: &[(&str, &str)],
        bearer: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .header("Authorization", format!("Bearer {bearer}"))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %url, status = status.as_u16(), "API request succeeded");
            return Ok(response);
        }

        // 429 is the primary rate limit; 403 with an exhausted
        // X-RateLimit-Remaining is GitHub's secondary rate limit. Both are
        // retryable, unlike other 4xx responses.
        let rate_limited = status.as_u16() == 429
            || (status.as_u16() == 403
                && response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v == "0")
                    .unwrap_or(false));

        if rate_limited {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(ApiError::RateLimited { retry_after_secs });
        }

        if status.as_u16() == 404 {
            return Err(ApiError::NotFound);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_string());

        Err(ApiError::HttpError {
            status: status.as_u16(),
            message,
        })
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
