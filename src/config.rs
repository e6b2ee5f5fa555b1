//! Ingest configuration
//!
//! Loaded from YAML; every field has a default so a partial file (or none at
//! all) is valid. Command-line flags are applied on top by the CLI.
//!
//! ```yaml
//! connection:
//!   uri: bolt://localhost:7687
//!   username: neo4j
//!   password: secret
//!   database: papers        # omitted: derived from the archive file name
//! batching:
//!   node_chunk_size: 10000
//!   edge_chunk_size: 100
//! loader:
//!   window: 20
//!   max_retries: 20
//!   backoff_base_ms: 1000
//! connectivity:
//!   attempts: 5
//!   initial_delay_ms: 500
//! ```

use crate::batch::{DEFAULT_EDGE_CHUNK_SIZE, DEFAULT_NODE_CHUNK_SIZE};
use crate::gateway::{validate_database_name, ConnectivityPolicy};
use crate::loader::{LoaderConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Graph store connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    /// Target database; `None` derives one from the archive file name
    pub database: Option<String>,
    /// Issue `CREATE DATABASE ... IF NOT EXISTS` before loading
    pub create_database: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
            database: None,
            create_database: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub node_chunk_size: usize,
    pub edge_chunk_size: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            node_chunk_size: DEFAULT_NODE_CHUNK_SIZE,
            edge_chunk_size: DEFAULT_EDGE_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Maximum relationship batches in flight
    pub window: usize,
    /// Attempts per batch before the load is aborted
    pub max_retries: u32,
    /// Wait after failed attempt k is `backoff_base_ms * k`
    pub backoff_base_ms: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            window: 20,
            max_retries: 20,
            backoff_base_ms: 1000,
        }
    }
}

impl LoaderSettings {
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            window: self.window,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff_base: Duration::from_millis(self.backoff_base_ms),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivitySettings {
    pub attempts: u32,
    pub initial_delay_ms: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay_ms: 500,
        }
    }
}

impl ConnectivitySettings {
    pub fn policy(&self) -> ConnectivityPolicy {
        ConnectivityPolicy {
            attempts: self.attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
        }
    }
}

/// Complete ingest configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub connection: ConnectionConfig,
    pub batching: BatchingConfig,
    pub loader: LoaderSettings,
    pub connectivity: ConnectivitySettings,
    /// Detach-delete the target database before loading
    pub clear: bool,
}

impl IngestConfig {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: IngestConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.loader.window == 0 {
            return Err(ConfigError::Invalid("loader.window must be at least 1".to_string()));
        }
        if self.loader.max_retries == 0 {
            return Err(ConfigError::Invalid("loader.max_retries must be at least 1".to_string()));
        }
        if self.connectivity.attempts == 0 {
            return Err(ConfigError::Invalid("connectivity.attempts must be at least 1".to_string()));
        }
        if let Some(database) = &self.connection.database {
            validate_database_name(database)
                .map_err(|e| ConfigError::Invalid(format!("connection.database: {}", e)))?;
        }
        Ok(())
    }
}
