//! Configuration loading tests.

use std::io::Write;
use std::time::Duration;

use market_gateway::config::validation::ValidationError;
use market_gateway::config::{load_config, parse_config, ConfigError};

#[test]
fn test_minimal_config_uses_defaults() {
    let config = parse_config(
        r#"
        [[servers]]
        host = "119.147.212.81"
        port = 7709
        "#,
    )
    .unwrap();

    assert_eq!(config.servers.len(), 1);
    assert_eq!(config.pool.max_connections_per_server, 5);
    assert_eq!(config.pool.retry_times, 3);
    assert_eq!(config.health.recovery_time(), Duration::from_secs(300));
    assert_eq!(config.timeouts.operation(), Some(Duration::from_secs(30)));
    assert!(config.client.degraded_fallback);
    assert!(!config.admin.enabled);
}

#[test]
fn test_full_config() {
    let config = parse_config(
        r#"
        [[servers]]
        name = "sz-1"
        host = "10.0.0.1"
        port = 7709

        [[servers]]
        name = "sh-1"
        host = "10.0.0.2"
        port = 7711

        [pool]
        primary = 1
        max_connections_per_server = 8
        retry_backoff_ms = 250

        [health]
        recovery_secs = 60
        low_water_mark = 3

        [timeouts]
        operation_secs = 0

        [admin]
        enabled = true
        api_key = "k"
        "#,
    )
    .unwrap();

    let primary = config.primary_server().unwrap();
    assert_eq!(primary.display_name(), "sh-1");
    assert_eq!(primary.port, 7711);
    assert_eq!(config.pool.max_connections_per_server, 8);
    assert_eq!(config.timeouts.operation(), None);
    assert!(config.admin.enabled);
}

#[test]
fn test_all_validation_errors_reported() {
    let err = parse_config(
        r#"
        [[servers]]
        host = "10.0.0.1"
        port = 0

        [[servers]]
        host = "10.0.0.1"
        port = 0

        [pool]
        primary = 5
        "#,
    )
    .unwrap_err();

    let ConfigError::Validation(errors) = err else {
        panic!("expected validation errors, got {err:?}");
    };
    assert!(errors.contains(&ValidationError::PrimaryOutOfRange { index: 5, count: 2 }));
    assert!(errors.contains(&ValidationError::DuplicateServer {
        host: "10.0.0.1".into(),
        port: 0
    }));
    assert_eq!(
        errors
            .iter()
            .filter(|e| matches!(e, ValidationError::InvalidPort { .. }))
            .count(),
        2
    );
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[[servers]]\nhost = \"127.0.0.1\"\nport = 7709").unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.servers[0].port, 7709);

    let missing = load_config(std::path::Path::new("/nonexistent/gateway.toml"));
    assert!(matches!(missing, Err(ConfigError::Io(_))));
}

#[test]
fn test_syntax_error_is_parse_error() {
    let err = parse_config("servers = [").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
