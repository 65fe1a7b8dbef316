//! Integration tests for configuration loading
//!
//! These tests verify:
//! - Parsing of hand-written TOML files
//! - Environment variable handling in real scenarios
//! - Error reporting for invalid files

use dirgraph_core::config::{
    DirGraphConfig, ENV_CONFIG_PATH, ENV_DIRECTORY, ENV_POLL_INTERVAL_SECS, SinkKind, StoreBackend,
};
use dirgraph_core::ErrorKind;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to set up environment variable and restore it after test
struct EnvGuard {
    key: String,
    old_value: Option<String>,
}

impl EnvGuard {
    fn new(key: &str, value: &str) -> Self {
        let old_value = env::var(key).ok();
        unsafe {
            env::set_var(key, value);
        }
        Self {
            key: key.to_string(),
            old_value,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            match &self.old_value {
                Some(val) => env::set_var(&self.key, val),
                None => env::remove_var(&self.key),
            }
        }
    }
}

const SAMPLE: &str = r#"
[general]
log_level = "warn"

[connector]
directory = "/srv/landing"
qualified_name_prefix = "landing:"
type_retry_limit = 3

[server]
name = "landing-zone"
organization = "acme"
collection_id = "c-42"

[sink]
kind = "jsonl"
path = "/var/log/dirgraph/batches.jsonl"

[[embedded_store]]
backend = "surreal"
namespace = "files"
"#;

// Environment variables are process-wide, so every scenario that touches
// them runs inside this one test.
#[tokio::test]
async fn test_load_sample_and_env_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("dirgraph.toml");
    std::fs::write(&config_path, SAMPLE).unwrap();

    let config = DirGraphConfig::load_from_path(&config_path).await.unwrap();
    assert_eq!(config.general.log_level, "warn");
    assert_eq!(config.connector.poll_interval_secs, 5);
    assert_eq!(config.connector.type_retry_limit, 3);
    assert_eq!(config.sink.kind, SinkKind::Jsonl);
    assert_eq!(config.embedded_store().unwrap().backend, StoreBackend::Surreal);
    assert_eq!(config.embedded_store().unwrap().database, "main");

    let identity = config.server.collection_identity();
    assert_eq!(identity.id, "c-42");
    assert_eq!(identity.name, "landing-zone");
    assert_eq!(
        config.embedded_store().unwrap().identity(&identity).id,
        "c-42-embedded"
    );

    {
        let _dir = EnvGuard::new(ENV_DIRECTORY, "/srv/other");
        let _interval = EnvGuard::new(ENV_POLL_INTERVAL_SECS, "60");
        let config = DirGraphConfig::load_from_path(&config_path).await.unwrap();
        assert_eq!(
            config.connector.directory.as_deref(),
            Some(Path::new("/srv/other"))
        );
        assert_eq!(config.connector.poll_interval_secs, 60);
    }

    {
        let _interval = EnvGuard::new(ENV_POLL_INTERVAL_SECS, "0");
        let err = DirGraphConfig::load_from_path(&config_path).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    {
        let _interval = EnvGuard::new(ENV_POLL_INTERVAL_SECS, "soon");
        let err = DirGraphConfig::load_from_path(&config_path).await.unwrap_err();
        assert!(err.message().contains("poll interval"));
    }

    {
        let _path = EnvGuard::new(ENV_CONFIG_PATH, config_path.to_str().unwrap());
        assert_eq!(DirGraphConfig::config_path(), config_path);
        let config = DirGraphConfig::load().await.unwrap();
        assert_eq!(config.server.organization, "acme");
    }
    assert_eq!(DirGraphConfig::config_path(), PathBuf::from("dirgraph.toml"));
}

#[tokio::test]
async fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = DirGraphConfig::load_from_path(&temp_dir.path().join("absent.toml"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.message().contains("absent.toml"));
}

#[tokio::test]
async fn test_load_malformed_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("dirgraph.toml");
    std::fs::write(&config_path, "[connector\ndirectory = ").unwrap();

    let err = DirGraphConfig::load_from_path(&config_path).await.unwrap_err();
    assert!(err.message().contains("Failed to parse"));
}
