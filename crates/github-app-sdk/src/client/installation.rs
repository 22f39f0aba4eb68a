//! Installation lookup and installation-scoped repository listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{AppAssertion, InstallationId, InstallationToken};
use crate::client::{GitHubClient, RemoteRepository};
use crate::error::ApiError;

/// Installation metadata from the GitHub API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationInfo {
    pub id: u64,
    pub account: InstallationAccount,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub repository_selection: Option<String>,
    #[serde(default)]
    pub app_id: Option<u64>,
    #[serde(default)]
    pub app_slug: Option<String>,
    /// Opaque permission map; the mirror stores it verbatim.
    #[serde(default)]
    pub permissions: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub suspended_at: Option<DateTime<Utc>>,
}

/// Account the app is installed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationAccount {
    pub login: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
}

/// Envelope of the `/installation/repositories` listing.
#[derive(Debug, Deserialize)]
struct InstallationRepositoriesResponse {
    #[serde(default)]
    repositories: Vec<RemoteRepository>,
}

impl GitHubClient {
    /// Fetch one installation by id, authenticated as the app.
    pub async fn get_installation(
        &self,
        assertion: &AppAssertion,
        installation_id: InstallationId,
    ) -> Result<InstallationInfo, ApiError> {
        self.get_as_app(&format!("/app/installations/{installation_id}"), assertion)
            .await
    }

    /// List the repositories accessible to an installation token.
    pub async fn list_installation_repositories(
        &self,
        token: &InstallationToken,
    ) -> Result<Vec<RemoteRepository>, ApiError> {
        let response: InstallationRepositoriesResponse = self
            .get_as_installation("/installation/repositories", &[("per_page", "100")], token)
            .await?;
        Ok(response.repositories)
    }
}

#[cfg(test)]
#[path = "installation_tests.rs"]
mod tests;
