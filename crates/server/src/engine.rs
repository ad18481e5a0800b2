use cluster_persist::{EntityStore, KvBackend, Snapshot, SnapshotDir, SnapshotError, StoreError};
use cluster_partition::ViewportPartitioner;
use cluster_session::SessionRegistry;

use crate::config::ServerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// The shared services every session works against.
///
/// The store and the registry are locked independently, so a slow backend
/// never holds up delivery to viewers.
pub struct Engine {
    pub(crate) store: EntityStore,
    pub(crate) registry: SessionRegistry,
    pub(crate) partitioner: ViewportPartitioner,
    pub(crate) config: ServerConfig,
    /// Serializes first-contact provisioning.
    pub(crate) signup: tokio::sync::Mutex<()>,
}

impl Engine {
    /// Build the services around an opened store.
    pub fn new(store: EntityStore, config: ServerConfig) -> Self {
        Self {
            store,
            registry: SessionRegistry::new(),
            partitioner: ViewportPartitioner::new(config.partition.clone()),
            config,
            signup: tokio::sync::Mutex::new(()),
        }
    }

    /// The shared entity store.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Sessions of every logged-in player.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Restore the newest snapshot in `dir`, if there is one. Returns the
    /// number of restored records.
    pub fn restore_snapshot(&self, dir: &SnapshotDir) -> Result<usize, ServerError> {
        let snapshot = match dir.load_latest() {
            Ok(snapshot) => snapshot,
            Err(SnapshotError::NoSnapshots) => {
                tracing::info!(root = %dir.root().display(), "no snapshot to restore");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };
        dir.verify_integrity()?;
        Ok(self.store.restore(&snapshot.records)?)
    }

    /// Write the current store contents as a new snapshot.
    pub fn write_snapshot(&self, dir: &mut SnapshotDir) -> Result<(), ServerError> {
        let snapshot = Snapshot {
            taken_at: cluster_common::unix_now(),
            records: self.store.dump()?,
        };
        dir.write(&snapshot)?;
        Ok(())
    }

    /// Stop accepting sessions and release the backend.
    pub fn close(&self) -> Option<Box<dyn KvBackend>> {
        let released = self.registry.close();
        tracing::info!(sessions = released.len(), "engine closing");
        self.store.close()
    }
}
