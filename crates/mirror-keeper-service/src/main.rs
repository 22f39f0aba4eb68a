//! Binary entry point for the Mirror-Keeper HTTP service.
//!
//! This executable:
//! - loads configuration from files and environment
//! - initializes tracing
//! - opens the database and applies the schema
//! - wires the credential provider, API client, dispatcher and
//!   reconciliation engine
//! - starts the HTTP server

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use github_app_sdk::auth::{CredentialConfig, CredentialProvider};
use github_app_sdk::client::{ClientConfig, GitHubClient};
use mirror_keeper_core::{
    EventDispatcher, HttpNotificationSink, Notifier, ReconciliationEngine,
};
use mirror_keeper_service::{AppState, ServiceConfig};
use mirror_keeper_store::MirrorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mirror_keeper_service=info,mirror_keeper_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting Mirror-Keeper service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order — later sources override earlier ones):
    //  1. /etc/mirror-keeper/service.yaml   — system-wide defaults
    //  2. ./config/service.yaml             — deployment-local override
    //  3. Path given by MK_CONFIG_FILE env  — operator-specified file
    //  4. Environment variables prefixed MK__ (double-underscore separator)
    //     e.g. MK__SERVER__PORT=9090 sets server.port = 9090
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/mirror-keeper/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("MK_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("MK").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            error!(error = %e, "could not deserialize service configuration; aborting");
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Storage
    // -------------------------------------------------------------------------
    let pool = match mirror_keeper_store::create_pool(&service_config.database.url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to open database; aborting");
            std::process::exit(2);
        }
    };
    if let Err(e) = mirror_keeper_store::init_schema(&pool).await {
        error!(error = %e, "failed to apply database schema; aborting");
        std::process::exit(2);
    }
    let store = MirrorStore::new(pool);

    // -------------------------------------------------------------------------
    // GitHub App credentials
    //
    // An absent key or app id is a degraded mode, not a startup failure:
    // webhook ingestion keeps working, reconciliation reports credentials
    // as unavailable until configured.
    // -------------------------------------------------------------------------
    let private_key_pem = match &service_config.github.private_key_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(pem) => Some(pem),
            Err(e) => {
                warn!(path = %path, error = %e, "could not read GitHub App private key");
                None
            }
        },
        None => None,
    };

    let credentials = Arc::new(CredentialProvider::new(CredentialConfig {
        app_id: service_config.github.app_id,
        private_key_pem,
        api_base_url: service_config.github.api_base_url.clone(),
        user_agent: service_config.github.user_agent.clone(),
        ..CredentialConfig::default()
    })?);

    let client = GitHubClient::new(
        ClientConfig::default()
            .with_api_base_url(service_config.github.api_base_url.clone()),
    )?;

    // -------------------------------------------------------------------------
    // Core services
    // -------------------------------------------------------------------------
    let notifier = match &service_config.notifier.url {
        Some(url) => {
            info!(url = %url, "outbound notifier enabled");
            Notifier::new(Arc::new(HttpNotificationSink::new(url.clone())?))
        }
        None => Notifier::disabled(),
    };

    let dispatcher = EventDispatcher::new(store.clone(), notifier);
    let engine = Arc::new(ReconciliationEngine::new(store, credentials, client));

    let state = AppState::new(
        dispatcher,
        engine,
        service_config.github.webhook_secret.clone(),
        service_config.admin.bearer_token.clone(),
    );

    if let Err(e) = mirror_keeper_service::start_server(
        state,
        &service_config.server.host,
        service_config.server.port,
    )
    .await
    {
        error!(error = %e, "server failed");
        std::process::exit(1);
    }

    Ok(())
}
