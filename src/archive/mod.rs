//! Archive decoding
//!
//! An archive is a zip container with one JSON document record per entry
//! (optionally gzipped, `.gz` suffix). Decoding is lazy and runs as two
//! independent passes: nodes, then edges.

pub mod decoder;
pub mod record;

pub use decoder::{ArchiveDecoder, DecodeCounters, Projected, Records, DEFAULT_MAX_ENTRY_BYTES};
pub use record::{AuthorRecord, DocumentRecord, EdgeDescriptor, NodeDescriptor};

use thiserror::Error;

/// Decoding errors. Only `Archive` from opening the container reaches the
/// caller; entry-level errors are logged and counted.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unreadable archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid gzip entry: {0}")]
    Gzip(std::io::Error),

    #[error("Entry exceeds {limit} bytes")]
    EntryTooLarge { limit: u64 },
}

pub type DecodeResult<T> = Result<T, DecodeError>;
