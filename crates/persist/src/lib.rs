//! Persistence: the spatial entity store and its backend snapshots.
//!
//! # Invariants
//! - Primary records are written before their axis indices.
//! - Snapshots are hash-chained and verified before they are restored.

mod backend;
mod memory;
mod snapshot;
mod store;

pub use backend::{BackendError, KvBackend};
pub use memory::MemoryBackend;
pub use snapshot::{
    IntegrityManifest, ManifestEntry, Snapshot, SnapshotDir, SnapshotError, SnapshotMeta,
};
pub use store::{EntityStore, StoreError, StoredRecord};
