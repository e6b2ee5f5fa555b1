//! Top-level ingest errors
//!
//! A load either completes or stops with exactly one of these. Per-entry
//! decode problems never get this far; they are counted and skipped.

use crate::archive::DecodeError;
use crate::config::ConfigError;
use crate::gateway::GatewayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    /// The archive itself could not be opened
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Store never answered during startup verification
    #[error("Store not reachable after {attempts} attempts: {source}")]
    Connectivity {
        attempts: u32,
        #[source]
        source: GatewayError,
    },

    /// A relationship batch failed every attempt
    #[error("Batch {batch} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        batch: usize,
        attempts: u32,
        #[source]
        source: GatewayError,
    },

    /// Unretried gateway failure (index creation, node pass, bad identifier)
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A loader task panicked or was cancelled
    #[error("Loader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type IngestResult<T> = Result<T, IngestError>;

impl IngestError {
    /// Connectivity failures happen before any write
    pub fn is_connectivity(&self) -> bool {
        matches!(self, IngestError::Connectivity { .. })
    }

    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, IngestError::RetriesExhausted { .. })
    }
}
