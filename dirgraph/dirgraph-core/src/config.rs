//! Configuration for the dirgraph synchronizer.
//!
//! Configuration is a single TOML file:
//!
//! ```toml
//! [general]
//! log_level = "info"
//!
//! [connector]
//! directory = "/srv/landing"
//! poll_interval_secs = 5
//! qualified_name_prefix = ""
//! type_retry_limit = 10
//! type_retry_backoff_ms = 1000
//! persistent_failure_threshold = 3
//!
//! [server]
//! name = "landing-zone"
//! server_type = "dirgraph"
//! organization = "acme"
//!
//! [sink]
//! kind = "log"
//!
//! [[embedded_store]]
//! backend = "memory"
//! ```
//!
//! The file location defaults to `dirgraph.toml` in the working directory and
//! can be overridden with `DIRGRAPH_CONFIG_PATH`. Individual values can be
//! overridden with the `DIRGRAPH_*` variables listed below.

use crate::error::{DirGraphError, Result};
use crate::types::CollectionIdentity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_CONFIG_FILE: &str = "dirgraph.toml";

// Environment variable names
pub const ENV_CONFIG_PATH: &str = "DIRGRAPH_CONFIG_PATH";
pub const ENV_LOG_LEVEL: &str = "DIRGRAPH_LOG_LEVEL";
pub const ENV_DIRECTORY: &str = "DIRGRAPH_DIRECTORY";
pub const ENV_POLL_INTERVAL_SECS: &str = "DIRGRAPH_POLL_INTERVAL_SECS";
pub const ENV_QUALIFIED_NAME_PREFIX: &str = "DIRGRAPH_QUALIFIED_NAME_PREFIX";
pub const ENV_SERVER_NAME: &str = "DIRGRAPH_SERVER_NAME";
pub const ENV_SINK_PATH: &str = "DIRGRAPH_SINK_PATH";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirGraphConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    /// Exactly one entry is required
    #[serde(default, rename = "embedded_store")]
    pub embedded_stores: Vec<EmbeddedStoreConfig>,
}

/// General configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Directory connector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Directory whose direct children are synchronized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Prepended to every qualifiedName
    #[serde(default)]
    pub qualified_name_prefix: String,
    /// Attempts made to resolve the required types before giving up
    #[serde(default = "default_type_retry_limit")]
    pub type_retry_limit: u32,
    #[serde(default = "default_type_retry_backoff")]
    pub type_retry_backoff_ms: u64,
    /// Identical consecutive cycle failures before a persistent failure is reported
    #[serde(default = "default_failure_threshold")]
    pub persistent_failure_threshold: u32,
}

/// Identity of the publishing server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,
    #[serde(default = "default_server_type")]
    pub server_type: String,
    #[serde(default)]
    pub organization: String,
    /// Outer collection id; derived from the server name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Structured log line per batch
    Log,
    /// One JSON document per line, appended to `path`
    Jsonl,
}

/// Event sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_sink_kind")]
    pub kind: SinkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Ordered maps held in process memory
    Memory,
    /// Embedded SurrealDB running on its in-memory engine
    Surreal,
}

/// Configuration of the store embedded under the façade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedStoreConfig {
    pub backend: StoreBackend,
    /// Embedded collection id; defaults to the outer id plus `-embedded`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_type_retry_limit() -> u32 {
    10
}

fn default_type_retry_backoff() -> u64 {
    1000
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_server_name() -> String {
    "dirgraph".to_string()
}

fn default_server_type() -> String {
    "dirgraph".to_string()
}

fn default_sink_kind() -> SinkKind {
    SinkKind::Log
}

fn default_namespace() -> String {
    "dirgraph".to_string()
}

fn default_database() -> String {
    "main".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            directory: None,
            poll_interval_secs: default_poll_interval(),
            qualified_name_prefix: String::new(),
            type_retry_limit: default_type_retry_limit(),
            type_retry_backoff_ms: default_type_retry_backoff(),
            persistent_failure_threshold: default_failure_threshold(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            server_type: default_server_type(),
            organization: String::new(),
            collection_id: None,
            collection_name: None,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: default_sink_kind(),
            path: None,
        }
    }
}

impl ConnectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn type_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.type_retry_backoff_ms)
    }
}

impl ServerConfig {
    /// Outer identity of the synchronizer's collection
    pub fn collection_identity(&self) -> CollectionIdentity {
        let id = self.collection_id.clone().unwrap_or_else(|| {
            Uuid::new_v5(&Uuid::NAMESPACE_OID, self.name.as_bytes()).to_string()
        });
        let name = self
            .collection_name
            .clone()
            .unwrap_or_else(|| self.name.clone());
        CollectionIdentity::new(id, name)
    }
}

impl EmbeddedStoreConfig {
    /// In-process map store
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            collection_id: None,
            collection_name: None,
            namespace: default_namespace(),
            database: default_database(),
        }
    }

    /// Embedded SurrealDB store
    pub fn surreal() -> Self {
        Self {
            backend: StoreBackend::Surreal,
            ..Self::memory()
        }
    }

    /// Set the embedded collection id
    pub fn with_collection_id(mut self, id: impl Into<String>) -> Self {
        self.collection_id = Some(id.into());
        self
    }

    /// Set the SurrealDB namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the SurrealDB database name
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Identity of the embedded store under the given outer identity
    pub fn identity(&self, outer: &CollectionIdentity) -> CollectionIdentity {
        let defaults = outer.embedded();
        CollectionIdentity::new(
            self.collection_id.clone().unwrap_or(defaults.id),
            self.collection_name.clone().unwrap_or(defaults.name),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend == StoreBackend::Surreal {
            if self.namespace.is_empty() {
                return Err(DirGraphError::config("Namespace cannot be empty"));
            }
            if self.database.is_empty() {
                return Err(DirGraphError::config("Database name cannot be empty"));
            }
        }
        if matches!(&self.collection_id, Some(id) if id.is_empty()) {
            return Err(DirGraphError::config(
                "Embedded collection_id cannot be empty when set",
            ));
        }
        Ok(())
    }
}

impl DirGraphConfig {
    /// Default configuration for synchronizing the given directory
    pub fn for_directory(directory: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.connector.directory = Some(directory.into());
        config.embedded_stores.push(EmbeddedStoreConfig::memory());
        config
    }

    /// Path of the configuration file, honouring `DIRGRAPH_CONFIG_PATH`
    pub fn config_path() -> PathBuf {
        std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed
    pub async fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_path()).await
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DirGraphError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| {
            DirGraphError::config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.merge_env_vars()?;
        config.validate()?;

        info!("Configuration loaded successfully from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a specific path atomically
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or cannot be written
    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        self.validate()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    DirGraphError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DirGraphError::config(format!("Failed to serialize config: {}", e)))?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("toml.tmp");

        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| DirGraphError::config(format!("Failed to write config file: {}", e)))?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| DirGraphError::config(format!("Failed to rename config file: {}", e)))?;

        info!("Configuration saved successfully to {}", path.display());
        Ok(())
    }

    /// Validate the configuration
    ///
    /// The connector directory is checked when the scheduler starts, not here.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(DirGraphError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.general.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.connector.poll_interval_secs == 0 {
            return Err(DirGraphError::config(
                "poll_interval_secs must be greater than 0",
            ));
        }

        if self.connector.type_retry_limit == 0 {
            return Err(DirGraphError::config(
                "type_retry_limit must be greater than 0",
            ));
        }

        if self.connector.persistent_failure_threshold == 0 {
            return Err(DirGraphError::config(
                "persistent_failure_threshold must be greater than 0",
            ));
        }

        if self.server.name.is_empty() {
            return Err(DirGraphError::config("Server name cannot be empty"));
        }

        if self.sink.kind == SinkKind::Jsonl && self.sink.path.is_none() {
            return Err(DirGraphError::config(
                "A path must be provided for the jsonl sink",
            ));
        }

        match self.embedded_stores.len() {
            1 => self.embedded_stores[0].validate()?,
            0 => {
                return Err(DirGraphError::config(
                    "No embedded store configured, exactly one is required",
                ));
            }
            n => {
                return Err(DirGraphError::config(format!(
                    "{} embedded stores configured, exactly one is required",
                    n
                )));
            }
        }

        let outer = self.server.collection_identity();
        if self.embedded_stores[0].identity(&outer).id == outer.id {
            return Err(DirGraphError::config(
                "Embedded collection id must differ from the outer collection id",
            ));
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Merge environment variable overrides into the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    pub fn merge_env_vars(&mut self) -> Result<()> {
        debug!("Merging environment variable overrides");

        if let Ok(log_level) = std::env::var(ENV_LOG_LEVEL) {
            debug!("Overriding log_level from environment: {}", log_level);
            self.general.log_level = log_level;
        }

        if let Ok(directory) = std::env::var(ENV_DIRECTORY) {
            debug!("Overriding directory from environment: {}", directory);
            self.connector.directory = Some(PathBuf::from(directory));
        }

        if let Ok(interval) = std::env::var(ENV_POLL_INTERVAL_SECS) {
            let secs = interval.parse::<u64>().map_err(|e| {
                DirGraphError::config(format!("Invalid poll interval in environment: {}", e))
            })?;
            debug!("Overriding poll interval from environment: {}s", secs);
            self.connector.poll_interval_secs = secs;
        }

        if let Ok(prefix) = std::env::var(ENV_QUALIFIED_NAME_PREFIX) {
            debug!("Overriding qualified name prefix from environment: {}", prefix);
            self.connector.qualified_name_prefix = prefix;
        }

        if let Ok(name) = std::env::var(ENV_SERVER_NAME) {
            debug!("Overriding server name from environment: {}", name);
            self.server.name = name;
        }

        if let Ok(path) = std::env::var(ENV_SINK_PATH) {
            debug!("Overriding sink path from environment: {}", path);
            self.sink.path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// The single embedded store entry
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless exactly one entry is present
    pub fn embedded_store(&self) -> Result<&EmbeddedStoreConfig> {
        match self.embedded_stores.as_slice() {
            [only] => Ok(only),
            other => Err(DirGraphError::config(format!(
                "{} embedded stores configured, exactly one is required",
                other.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    fn create_temp_config_env() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dirgraph.toml");
        (temp_dir, config_path)
    }

    #[test]
    fn test_default_config() {
        let config = DirGraphConfig::for_directory("/tmp/in");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.connector.poll_interval_secs, 5);
        assert_eq!(config.connector.qualified_name_prefix, "");
        assert_eq!(config.connector.type_retry_limit, 10);
        assert_eq!(config.connector.type_retry_backoff(), Duration::from_secs(1));
        assert_eq!(config.embedded_stores.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = DirGraphConfig::for_directory("/tmp/in");

        config.general.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
        config.general.log_level = "info".to_string();

        config.connector.poll_interval_secs = 0;
        assert!(config.validate().is_err());
        config.connector.poll_interval_secs = 5;

        config.sink.kind = SinkKind::Jsonl;
        assert!(config.validate().is_err());
        config.sink.kind = SinkKind::Log;

        config.embedded_stores.push(EmbeddedStoreConfig::surreal());
        let err = config.validate().unwrap_err();
        assert!(err.message().contains("exactly one"));

        config.embedded_stores.clear();
        assert!(config.validate().unwrap_err().is_fatal());
    }

    #[test]
    fn test_embedded_identity_must_differ() {
        let mut config = DirGraphConfig::for_directory("/tmp/in");
        config.server.collection_id = Some("outer".to_string());
        config.embedded_stores[0] = EmbeddedStoreConfig::memory().with_collection_id("outer");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collection_identity_defaults() {
        let server = ServerConfig::default();
        let a = server.collection_identity();
        let b = server.collection_identity();
        assert_eq!(a, b);
        assert_eq!(a.name, "dirgraph");

        let store = EmbeddedStoreConfig::memory();
        assert_eq!(store.identity(&a).id, format!("{}-embedded", a.id));
    }

    #[tokio::test]
    async fn test_save_and_load_config() {
        let (_temp_dir, config_path) = create_temp_config_env();

        let mut config = DirGraphConfig::for_directory("/srv/landing");
        config.connector.qualified_name_prefix = "landing:".to_string();
        config.embedded_stores[0] = EmbeddedStoreConfig::surreal().with_namespace("ns1");

        config.save_to_path(&config_path).await.unwrap();
        assert!(config_path.exists());
        assert!(!config_path.with_extension("toml.tmp").exists());

        let loaded = DirGraphConfig::load_from_path(&config_path).await.unwrap();
        assert_eq!(loaded.connector.qualified_name_prefix, "landing:");
        assert_eq!(
            loaded.connector.directory.as_deref(),
            Some(Path::new("/srv/landing"))
        );
        assert_eq!(loaded.embedded_stores[0].backend, StoreBackend::Surreal);
        assert_eq!(loaded.embedded_stores[0].namespace, "ns1");
    }

    #[tokio::test]
    async fn test_load_rejects_missing_store() {
        let (_temp_dir, config_path) = create_temp_config_env();
        tokio::fs::write(&config_path, "[connector]\ndirectory = \"/tmp\"\n")
            .await
            .unwrap();

        let err = DirGraphConfig::load_from_path(&config_path).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_env_var_overrides() {
        let mut config = DirGraphConfig::for_directory("/tmp/in");

        // Only variables no other test in this module asserts on
        unsafe {
            env::set_var(ENV_LOG_LEVEL, "debug");
            env::set_var(ENV_SINK_PATH, "/tmp/batches.jsonl");
        }

        config.merge_env_vars().unwrap();

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(
            config.sink.path.as_deref(),
            Some(Path::new("/tmp/batches.jsonl"))
        );

        unsafe {
            env::remove_var(ENV_LOG_LEVEL);
            env::remove_var(ENV_SINK_PATH);
        }
    }
}
