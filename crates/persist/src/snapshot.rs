//! File-backed snapshots of the entity store.
//!
//! Layout inside the snapshot directory:
//! ```text
//! cluster.meta.json              - metadata and schema version
//! snapshots/
//!   000001.records.cbor.zst      - CBOR+zstd compressed record sets
//! integrity/
//!   manifest.json                - hash chain manifest
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::store::StoredRecord;

const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
const META_FILE: &str = "cluster.meta.json";

/// Errors from snapshot file operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode snapshot records: {0}")]
    CborEncode(String),
    #[error("failed to decode snapshot records: {0}")]
    CborDecode(String),
    #[error("malformed snapshot metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot hash {actual} does not match recorded {expected}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("snapshot schema v{file_version} is not the supported v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("snapshot directory holds no snapshots")]
    NoSnapshots,
}

/// Metadata stored in `cluster.meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub schema_version: u32,
    pub snapshot_count: u32,
}

/// One link of the hash chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Integrity manifest chaining every snapshot hash to the previous one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

/// Contents of one snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix seconds at capture.
    pub taken_at: i64,
    pub records: Vec<StoredRecord>,
}

/// Directory of numbered, hash-chained snapshots.
pub struct SnapshotDir {
    root: PathBuf,
    meta: SnapshotMeta,
    manifest: IntegrityManifest,
}

impl SnapshotDir {
    /// Open or create a snapshot directory at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("snapshots"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join(META_FILE);
        let manifest_path = root.join("integrity").join("manifest.json");

        let (meta, manifest) = if meta_path.exists() {
            let meta: SnapshotMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.schema_version != SNAPSHOT_SCHEMA_VERSION {
                return Err(SnapshotError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: SNAPSHOT_SCHEMA_VERSION,
                });
            }
            let manifest: IntegrityManifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (meta, manifest)
        } else {
            let meta = SnapshotMeta {
                schema_version: SNAPSHOT_SCHEMA_VERSION,
                snapshot_count: 0,
            };
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            (meta, manifest)
        };

        tracing::debug!(
            root = %root.display(),
            snapshots = meta.snapshot_count,
            "snapshot dir opened"
        );
        Ok(Self {
            root,
            meta,
            manifest,
        })
    }

    /// Write `snapshot` as the next numbered file and extend the hash chain.
    pub fn write(&mut self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        let index = self.meta.snapshot_count + 1;
        let filename = snapshot_filename(index);
        let path = self.root.join("snapshots").join(&filename);

        let cbor_bytes = cbor_serialize(snapshot)?;
        let compressed = zstd_compress(&cbor_bytes)?;

        let hash = sha256_hex(&compressed);
        let prev_hash = self.manifest.entries.last().map(|e| e.sha256.clone());

        std::fs::write(&path, &compressed)?;

        self.meta.snapshot_count = index;
        self.manifest.entries.push(ManifestEntry {
            filename,
            sha256: hash,
            prev_hash,
        });

        self.save_meta()?;
        self.save_manifest()?;
        tracing::info!(
            path = %path.display(),
            records = snapshot.records.len(),
            "snapshot written"
        );
        Ok(path)
    }

    /// Load the newest snapshot, checking its hash against the manifest.
    pub fn load_latest(&self) -> Result<Snapshot, SnapshotError> {
        if self.meta.snapshot_count == 0 {
            return Err(SnapshotError::NoSnapshots);
        }
        let filename = snapshot_filename(self.meta.snapshot_count);
        let compressed = std::fs::read(self.root.join("snapshots").join(&filename))?;
        self.verify_file_hash(&filename, &compressed)?;

        let cbor_bytes = zstd_decompress(&compressed)?;
        cbor_deserialize(&cbor_bytes)
    }

    /// Verify every file hash and the continuity of the chain.
    pub fn verify_integrity(&self) -> Result<(), SnapshotError> {
        let mut prev_hash: Option<String> = None;
        for entry in &self.manifest.entries {
            if entry.prev_hash != prev_hash {
                return Err(SnapshotError::IntegrityMismatch {
                    expected: prev_hash.unwrap_or_else(|| "None".into()),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }

            let data = std::fs::read(self.root.join("snapshots").join(&entry.filename))?;
            let actual_hash = sha256_hex(&data);
            if actual_hash != entry.sha256 {
                return Err(SnapshotError::IntegrityMismatch {
                    expected: entry.sha256.clone(),
                    actual: actual_hash,
                });
            }

            prev_hash = Some(entry.sha256.clone());
        }
        Ok(())
    }

    /// Directory holding the snapshots.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    fn verify_file_hash(&self, filename: &str, data: &[u8]) -> Result<(), SnapshotError> {
        let entry = self
            .manifest
            .entries
            .iter()
            .find(|e| e.filename == filename)
            .ok_or_else(|| SnapshotError::IntegrityMismatch {
                expected: format!("manifest entry for {filename}"),
                actual: "none".into(),
            })?;
        let actual = sha256_hex(data);
        if entry.sha256 != actual {
            return Err(SnapshotError::IntegrityMismatch {
                expected: entry.sha256.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn save_meta(&self) -> Result<(), SnapshotError> {
        let path = self.root.join(META_FILE);
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), SnapshotError> {
        let path = self.root.join("integrity").join("manifest.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.manifest)?;
        Ok(())
    }
}

fn snapshot_filename(index: u32) -> String {
    format!("{index:06}.records.cbor.zst")
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SnapshotError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| SnapshotError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, SnapshotError> {
    ciborium::from_reader(data).map_err(|e| SnapshotError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
