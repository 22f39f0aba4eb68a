//! Service configuration.
//!
//! All fields carry serde defaults so an unconfigured environment produces
//! a runnable development setup; a malformed file or uncoercible
//! environment variable is a hard error because it indicates
//! deliberate-but-broken operator configuration.

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub github: GithubConfig,
    pub notifier: NotifierConfig,
    pub admin: AdminConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection string.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:./mirror_keeper.db".to_string(),
        }
    }
}

/// GitHub App settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// GitHub App numeric id.
    pub app_id: Option<u64>,
    /// Path to the PEM-encoded RSA private key.
    pub private_key_path: Option<String>,
    /// Shared webhook secret; absent enables the insecure dev bypass.
    pub webhook_secret: Option<String>,
    /// API base URL (GitHub Enterprise support).
    pub api_base_url: String,
    /// User agent for outbound API calls.
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            private_key_path: None,
            webhook_secret: None,
            api_base_url: "https://api.github.com".to_string(),
            user_agent: "mirror-keeper".to_string(),
        }
    }
}

/// Outbound notifier settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Downstream URL; absent disables notifications.
    pub url: Option<String>,
}

/// Administrative surface settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required on `/api/sync/*`; absent leaves the surface
    /// open (development only).
    pub bearer_token: Option<String>,
}

impl ServiceConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.is_empty() {
            return Err("server.host must not be empty".to_string());
        }
        if self.database.url.is_empty() {
            return Err("database.url must not be empty".to_string());
        }
        if self.github.app_id.is_some() != self.github.private_key_path.is_some() {
            return Err(
                "github.app_id and github.private_key_path must be configured together"
                    .to_string(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
