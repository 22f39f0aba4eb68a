//! Operator CLI for Mirror-Keeper.
//!
//! Thin client over the service's administrative HTTP surface: trigger a
//! full reconciliation, an initial repository sync, or a repository-linkage
//! replay. The service URL and bearer token come from flags or the
//! environment.

use clap::{Parser, Subcommand};
use tracing::debug;

/// Mirror-Keeper operator commands.
#[derive(Debug, Parser)]
#[command(name = "mirror-keeper", version, about = "Operate a Mirror-Keeper instance")]
pub struct Cli {
    /// Base URL of the running service.
    #[arg(long, env = "MK_SERVICE_URL", default_value = "http://localhost:8080")]
    pub service_url: String,

    /// Bearer token for the administrative endpoints.
    #[arg(long, env = "MK_ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a full reconciliation for one installation.
    SyncFull {
        /// GitHub installation id (the remote id).
        #[arg(long)]
        installation_id: i64,
    },

    /// Mirror the repositories an installation can see.
    SyncRepositories {
        /// GitHub installation id (the remote id).
        #[arg(long)]
        installation_id: i64,
    },

    /// Re-create missing repository rows from logged installation webhooks.
    ReplayLinkage {
        /// Limit the replay to one installation.
        #[arg(long)]
        installation_id: Option<i64>,
    },
}

impl Command {
    /// Path and query of the admin endpoint this command drives.
    pub fn request_path(&self) -> String {
        match self {
            Self::SyncFull { installation_id } => {
                format!("/api/sync/full?installation_id={installation_id}")
            }
            Self::SyncRepositories { installation_id } => {
                format!("/api/sync/repositories?installation_id={installation_id}")
            }
            Self::ReplayLinkage {
                installation_id: Some(id),
            } => format!("/api/sync/replay-linkage?installation_id={id}"),
            Self::ReplayLinkage {
                installation_id: None,
            } => "/api/sync/replay-linkage".to_string(),
        }
    }
}

/// Execute the parsed command against the service.
///
/// Prints the structured response; a summary reporting `success: false`
/// (or a non-2xx answer) becomes a process failure so scripts can rely on
/// the exit code.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let url = format!(
        "{}{}",
        cli.service_url.trim_end_matches('/'),
        cli.command.request_path()
    );
    debug!(url = %url, "calling service");

    let client = reqwest::Client::new();
    let mut request = client.post(&url);
    if let Some(token) = &cli.admin_token {
        request = request.header("Authorization", format!("Bearer {token}"));
    }

    let response = request.send().await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await?;

    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        anyhow::bail!("service answered {status}");
    }
    if body.get("success") == Some(&serde_json::Value::Bool(false)) {
        anyhow::bail!("operation reported failure");
    }
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
