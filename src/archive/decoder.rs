//! Streaming decoder over an in-memory zip container
//!
//! The container is opened once to validate it and read its central
//! directory; every pass then works on a cheap clone that shares the same
//! `Bytes` buffer, so passes are independent and lazy.

use super::record::{DocumentRecord, EdgeDescriptor, NodeDescriptor};
use super::{DecodeError, DecodeResult};
use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zip::ZipArchive;

type Container = ZipArchive<Cursor<Bytes>>;

/// Largest decoded size of a single entry, after gunzip
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

/// Per-pass entry counters
#[derive(Debug, Default)]
pub struct DecodeCounters {
    read: AtomicUsize,
    skipped: AtomicUsize,
}

impl DecodeCounters {
    /// File entries visited, malformed ones included
    pub fn entries_read(&self) -> usize {
        self.read.load(Ordering::Relaxed)
    }

    /// File entries that could not be decoded
    pub fn entries_skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn records_decoded(&self) -> usize {
        self.entries_read().saturating_sub(self.entries_skipped())
    }
}

/// Decoder for one archive
#[derive(Clone)]
pub struct ArchiveDecoder {
    container: Container,
    max_entry_bytes: u64,
}

impl ArchiveDecoder {
    /// Open a container held in memory. Fails if it is not a readable zip.
    pub fn new(data: impl Into<Bytes>) -> DecodeResult<Self> {
        let data = data.into();
        let size = data.len();
        let container = ZipArchive::new(Cursor::new(data)).map_err(DecodeError::Archive)?;
        info!("Opened archive: {} entries, {} bytes", container.len(), size);
        Ok(Self {
            container,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        })
    }

    /// Entries that decode to more than `limit` bytes are skipped as malformed
    pub fn with_max_entry_bytes(mut self, limit: u64) -> Self {
        self.max_entry_bytes = limit;
        self
    }

    /// Read the whole file and open it
    pub async fn open(path: impl AsRef<Path>) -> DecodeResult<Self> {
        let data = tokio::fs::read(path.as_ref()).await?;
        Self::new(data)
    }

    /// Number of entries in the container, directories included
    pub fn len(&self) -> usize {
        self.container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.container.len() == 0
    }

    /// Every well-formed record, in container order
    pub fn records(&self) -> Records {
        Records {
            container: self.container.clone(),
            next: 0,
            max_entry_bytes: self.max_entry_bytes,
            counters: Arc::new(DecodeCounters::default()),
        }
    }

    /// Node descriptors for pass 1
    pub fn nodes(&self) -> Projected<NodeDescriptor> {
        Projected::new(self.records(), DocumentRecord::nodes)
    }

    /// Edge descriptors for pass 2
    pub fn edges(&self) -> Projected<EdgeDescriptor> {
        Projected::new(self.records(), DocumentRecord::edges)
    }
}

/// Lazy record stream. Malformed entries are logged and skipped.
pub struct Records {
    container: Container,
    next: usize,
    max_entry_bytes: u64,
    counters: Arc<DecodeCounters>,
}

impl Records {
    /// Counters for this pass; they keep updating while the stream is consumed
    pub fn counters(&self) -> Arc<DecodeCounters> {
        Arc::clone(&self.counters)
    }
}

impl Iterator for Records {
    type Item = DocumentRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.container.len() {
            let index = self.next;
            self.next += 1;

            match read_entry(&mut self.container, index, self.max_entry_bytes) {
                Ok(None) => continue,
                Ok(Some(record)) => {
                    self.counters.read.fetch_add(1, Ordering::Relaxed);
                    return Some(record);
                }
                Err((name, e)) => {
                    self.counters.read.fetch_add(1, Ordering::Relaxed);
                    self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                    warn!("Skipping malformed entry {} ({}): {}", index, name, e);
                }
            }
        }
        None
    }
}

/// Decode one entry. `Ok(None)` for directory entries.
///
/// The sizes in the entry header are not trusted; reads stop at `limit`.
fn read_entry(
    container: &mut Container,
    index: usize,
    limit: u64,
) -> Result<Option<DocumentRecord>, (String, DecodeError)> {
    let file = container
        .by_index(index)
        .map_err(|e| (format!("#{}", index), DecodeError::Archive(e)))?;
    if file.is_dir() {
        return Ok(None);
    }

    let name = file.name().to_string();
    let raw = read_bounded(file, limit, DecodeError::Io).map_err(|e| (name.clone(), e))?;

    let parsed = if name.ends_with(".gz") {
        let text = read_bounded(GzDecoder::new(raw.as_slice()), limit, DecodeError::Gzip)
            .map_err(|e| (name.clone(), e))?;
        serde_json::from_slice(&text)
    } else {
        serde_json::from_slice(&raw)
    };

    match parsed {
        Ok(record) => {
            debug!("Decoded entry {}", name);
            Ok(Some(record))
        }
        Err(e) => Err((name, DecodeError::Json(e))),
    }
}

fn read_bounded<R: Read>(
    reader: R,
    limit: u64,
    read_error: fn(io::Error) -> DecodeError,
) -> DecodeResult<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(read_error)?;
    if buf.len() as u64 > limit {
        return Err(DecodeError::EntryTooLarge { limit });
    }
    Ok(buf)
}

/// Records flattened through a projection (record -> descriptors)
pub struct Projected<T> {
    records: Records,
    project: fn(&DocumentRecord) -> Vec<T>,
    buffer: std::vec::IntoIter<T>,
}

impl<T> Projected<T> {
    fn new(records: Records, project: fn(&DocumentRecord) -> Vec<T>) -> Self {
        Self {
            records,
            project,
            buffer: Vec::new().into_iter(),
        }
    }

    pub fn counters(&self) -> Arc<DecodeCounters> {
        self.records.counters()
    }
}

impl<T> Iterator for Projected<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(item);
            }
            let record = self.records.next()?;
            self.buffer = (self.project)(&record).into_iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EdgeKind, NodeKind};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
                continue;
            }
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_rejects_non_archive() {
        let err = ArchiveDecoder::new(b"definitely not a zip".to_vec()).err().unwrap();
        assert!(matches!(err, DecodeError::Archive(_)));
    }

    #[test]
    fn test_malformed_entry_is_skipped_and_counted() {
        let data = archive(&[
            ("a.json", br#"{"id": {"dois": ["10.1/a"]}}"#),
            ("broken.json", b"{not json"),
            ("dir/", b""),
            ("c.json", br#"{"id": {"dois": ["10.1/c"]}}"#),
        ]);
        let decoder = ArchiveDecoder::new(data).unwrap();

        let records = decoder.records();
        let counters = records.counters();
        let ids: Vec<String> = records
            .filter_map(|r| r.primary_id().map(str::to_string))
            .collect();

        assert_eq!(ids, vec!["10.1/a", "10.1/c"]);
        assert_eq!(counters.entries_read(), 3);
        assert_eq!(counters.entries_skipped(), 1);
        assert_eq!(counters.records_decoded(), 2);
    }

    #[test]
    fn test_gzipped_entries() {
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(br#"{"id": {"dois": ["10.1/z"]}, "title": "Zipped"}"#).unwrap();
        let body = gz.finish().unwrap();

        let data = archive(&[("z.json.gz", &body), ("bad.json.gz", b"plain text")]);
        let decoder = ArchiveDecoder::new(data).unwrap();
        let nodes = decoder.nodes();
        let counters = nodes.counters();
        let nodes: Vec<_> = nodes.collect();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].key(), Some("10.1/z"));
        assert_eq!(counters.entries_skipped(), 1);
    }

    #[test]
    fn test_passes_are_independent() {
        let data = archive(&[(
            "a.json",
            br#"{"id": {"dois": ["10.1/a"]}, "references": [{"doi": "10.1/b"}], "authors": [{"family": "Doe"}]}"#,
        )]);
        let decoder = ArchiveDecoder::new(data).unwrap();

        let kinds: Vec<NodeKind> = decoder.nodes().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NodeKind::Document, NodeKind::Document, NodeKind::Author]);

        let edges: Vec<EdgeKind> = decoder.edges().map(|e| e.kind).collect();
        assert_eq!(edges, vec![EdgeKind::Reference, EdgeKind::Authorship]);

        // A second node pass sees the same data
        assert_eq!(decoder.nodes().count(), 3);
    }

    /// First entry claims a 2^62-byte uncompressed size in the central
    /// directory (zip64 extra field); the data itself is intact
    fn archive_with_forged_size() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(true);
        writer.start_file("forged.json", stored).unwrap();
        writer.write_all(br#"{"id": {"dois": ["10.1/f"]}}"#).unwrap();
        writer.start_file("ok.json", SimpleFileOptions::default()).unwrap();
        writer.write_all(br#"{"id": {"dois": ["10.1/ok"]}}"#).unwrap();
        let mut data = writer.finish().unwrap().into_inner();

        let central = data
            .windows(4)
            .position(|w| w == [0x50, 0x4b, 0x01, 0x02])
            .unwrap();
        let name_len = u16::from_le_bytes([data[central + 28], data[central + 29]]) as usize;
        let extra = central + 46 + name_len;
        assert_eq!(&data[extra..extra + 2], &[0x01, 0x00]);

        data[central + 24..central + 28].copy_from_slice(&u32::MAX.to_le_bytes());
        data[extra + 4..extra + 12].copy_from_slice(&(1u64 << 62).to_le_bytes());
        data
    }

    #[test]
    fn test_forged_entry_size_does_not_stop_the_pass() {
        let decoder = ArchiveDecoder::new(archive_with_forged_size()).unwrap();

        let records = decoder.records();
        let counters = records.counters();
        let ids: Vec<String> = records
            .filter_map(|r| r.primary_id().map(str::to_string))
            .collect();

        assert!(ids.contains(&"10.1/ok".to_string()));
        assert_eq!(counters.entries_read(), 2);
    }

    #[test]
    fn test_oversized_entries_are_skipped() {
        let big = format!(r#"{{"id": {{"dois": ["10.1/big"]}}, "title": "{}"}}"#, "x".repeat(2048));
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(big.as_bytes()).unwrap();
        let big_gz = gz.finish().unwrap();

        let data = archive(&[
            ("big.json", big.as_bytes()),
            ("big.json.gz", &big_gz),
            ("ok.json", br#"{"id": {"dois": ["10.1/ok"]}}"#),
        ]);
        let decoder = ArchiveDecoder::new(data).unwrap().with_max_entry_bytes(512);

        let records = decoder.records();
        let counters = records.counters();
        let ids: Vec<String> = records
            .filter_map(|r| r.primary_id().map(str::to_string))
            .collect();

        assert_eq!(ids, vec!["10.1/ok"]);
        assert_eq!(counters.entries_skipped(), 2);
    }

    #[test]
    fn test_read_bounded_limit() {
        let ok = read_bounded(&b"abcd"[..], 4, DecodeError::Io).unwrap();
        assert_eq!(ok, b"abcd");

        let err = read_bounded(&b"abcde"[..], 4, DecodeError::Io).unwrap_err();
        assert!(matches!(err, DecodeError::EntryTooLarge { limit: 4 }));
    }
}
