//! Tests for service configuration.

use super::*;

#[test]
fn test_defaults_are_valid() {
    let config = ServiceConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.github.api_base_url, "https://api.github.com");
    assert!(config.github.webhook_secret.is_none());
}

#[test]
fn test_partial_deserialization_fills_defaults() {
    let config: ServiceConfig = serde_json::from_value(serde_json::json!({
        "server": {"port": 9090},
        "github": {"webhook_secret": "whsec_x"}
    }))
    .unwrap();

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.github.webhook_secret.as_deref(), Some("whsec_x"));
    assert_eq!(config.database.url, "sqlite:./mirror_keeper.db");
}

#[test]
fn test_app_id_and_key_must_come_together() {
    let mut config = ServiceConfig::default();
    config.github.app_id = Some(12345);
    assert!(config.validate().is_err());

    config.github.private_key_path = Some("/etc/mirror-keeper/app.pem".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_host_is_rejected() {
    let mut config = ServiceConfig::default();
    config.server.host = String::new();
    assert!(config.validate().is_err());
}
