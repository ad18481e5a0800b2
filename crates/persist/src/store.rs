//! Spatial entity store.
//!
//! Records live under their entity key. Every entity with a position is also
//! indexed in two sorted sets, one per axis, named after its kind, so range
//! queries never scan the whole keyspace.
//!
//! # Invariants
//! - `save` writes the primary record before touching the indices.
//! - A failed index write after a successful primary write is reported as
//!   [`StoreError::PartialIndex`], never swallowed.
//! - Scans skip undecodable records; direct fetches surface them.

use std::collections::HashSet;
use std::sync::Mutex;

use cluster_common::{Axis, Rect};
use cluster_kernel::{DecodeError, EncodeError, Entity, EntityKind, KeyError, Record};
use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, KvBackend};

/// Errors from entity store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("no entity stored under {0}")]
    NotFound(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("{key} was written but its index update failed: {source}")]
    PartialIndex {
        key: String,
        #[source]
        source: BackendError,
    },
    #[error("store is closed")]
    Closed,
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Missing and undecodable records look the same to a direct fetch.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::Decode(_))
    }
}

/// A raw record as held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    pub body: Vec<u8>,
}

/// Entity store over a single backend connection.
///
/// All operations take the same lock, which also serializes access to the
/// backend connection.
pub struct EntityStore {
    backend: Mutex<Option<Box<dyn KvBackend>>>,
}

impl EntityStore {
    /// Take ownership of an opened backend.
    pub fn open(backend: impl KvBackend + 'static) -> Self {
        tracing::info!("entity store opened");
        Self {
            backend: Mutex::new(Some(Box::new(backend))),
        }
    }

    /// Release the backend. Later operations fail with [`StoreError::Closed`].
    pub fn close(&self) -> Option<Box<dyn KvBackend>> {
        let backend = match self.backend.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if backend.is_some() {
            tracing::info!("entity store closed");
        }
        backend
    }

    /// Whether the backend is still attached.
    pub fn is_open(&self) -> bool {
        self.backend.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    fn with_backend<T>(
        &self,
        f: impl FnOnce(&mut dyn KvBackend) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.backend.lock().map_err(|_| StoreError::LockPoisoned)?;
        let backend = guard.as_deref_mut().ok_or(StoreError::Closed)?;
        f(backend)
    }

    /// Write the record, then both axis indices.
    pub fn save(&self, entity: &Entity) -> Result<(), StoreError> {
        let key = entity.key();
        let body = entity.encode()?;
        self.with_backend(|backend| {
            backend.set(&key, &body).map_err(|e| {
                tracing::error!(%key, error = %e, "primary write failed");
                StoreError::Backend(e)
            })?;
            if let Some(position) = entity.position() {
                for axis in Axis::BOTH {
                    let index = entity.kind().index_name(axis);
                    if let Err(source) = backend.zadd(&index, axis.of(position), &key) {
                        tracing::warn!(%key, %index, error = %source, "index write failed");
                        return Err(StoreError::PartialIndex { key, source });
                    }
                }
            }
            tracing::debug!(%key, "saved");
            Ok(())
        })
    }

    /// Fetch and decode the entity stored under `key`.
    pub fn get(&self, key: &str) -> Result<Entity, StoreError> {
        let body = self.with_backend(|backend| Ok(backend.get(key)?))?;
        let body = body.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Entity::decode(key, &body).map_err(|e| {
            tracing::warn!(key, error = %e, "undecodable record");
            StoreError::Decode(e)
        })
    }

    /// Fetch an entity that must be of kind `R`.
    pub fn get_as<R: Record>(&self, key: &str) -> Result<R, StoreError> {
        let wrong_kind = || {
            StoreError::Decode(DecodeError::Key(KeyError::WrongKind {
                key: key.to_string(),
                expected: R::KIND,
            }))
        };
        if EntityKind::of_key(key).map_err(DecodeError::from)? != R::KIND {
            return Err(wrong_kind());
        }
        R::from_entity(self.get(key)?).ok_or_else(wrong_kind)
    }

    /// Every entity whose key matches the glob `pattern`. Keys that are not
    /// entity keys and records that fail to decode are skipped.
    pub fn find(&self, pattern: &str) -> Result<Vec<Entity>, StoreError> {
        self.with_backend(|backend| {
            let keys = backend.keys(pattern)?;
            let mut found = Vec::with_capacity(keys.len());
            for key in keys {
                if EntityKind::of_key(&key).is_err() {
                    tracing::debug!(%key, "not an entity key, skipped");
                    continue;
                }
                let Some(body) = backend.get(&key)? else {
                    continue;
                };
                match Entity::decode(&key, &body) {
                    Ok(entity) => found.push(entity),
                    Err(e) => tracing::warn!(%key, error = %e, "skipping undecodable record"),
                }
            }
            Ok(found)
        })
    }

    /// Every decodable entity of kind `R`.
    pub fn find_all<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        Ok(self
            .find(&R::KIND.pattern())?
            .into_iter()
            .filter_map(R::from_entity)
            .collect())
    }

    /// Remove the record and its index entries. Returns whether a record
    /// existed.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.with_backend(|backend| {
            let existed = backend.del(key)?;
            if let Ok(kind) = EntityKind::of_key(key) {
                for axis in Axis::BOTH {
                    let index = kind.index_name(axis);
                    if let Err(source) = backend.zrem(&index, key) {
                        tracing::warn!(key, %index, error = %source, "index removal failed");
                        return Err(StoreError::PartialIndex {
                            key: key.to_string(),
                            source,
                        });
                    }
                }
            }
            tracing::debug!(key, existed, "deleted");
            Ok(existed)
        })
    }

    /// Keys of `kind` whose `axis` coordinate lies in `[low, high]`.
    pub fn range_by_axis(
        &self,
        axis: Axis,
        kind: EntityKind,
        low: f64,
        high: f64,
    ) -> Result<Vec<String>, StoreError> {
        self.with_backend(|backend| Ok(backend.zrange_by_score(&kind.index_name(axis), low, high)?))
    }

    /// Keys of `kind` inside `rect` (inclusive), ordered by x.
    pub fn keys_in_rect(&self, kind: EntityKind, rect: Rect) -> Result<Vec<String>, StoreError> {
        self.with_backend(|backend| {
            let by_x = backend.zrange_by_score(&kind.index_name(Axis::X), rect.min.x, rect.max.x)?;
            let by_y: HashSet<String> = backend
                .zrange_by_score(&kind.index_name(Axis::Y), rect.min.y, rect.max.y)?
                .into_iter()
                .collect();
            Ok(by_x.into_iter().filter(|key| by_y.contains(key)).collect())
        })
    }

    /// Entities of `kind` inside `rect`. Index entries whose record is gone or
    /// undecodable are skipped.
    pub fn find_in_rect(&self, kind: EntityKind, rect: Rect) -> Result<Vec<Entity>, StoreError> {
        let keys = self.keys_in_rect(kind, rect)?;
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            match self.get(&key) {
                Ok(entity) => found.push(entity),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(%key, error = %e, "stale index entry skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// Raw records of every entity kind, ordered by key.
    pub fn dump(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.with_backend(|backend| {
            let mut records = Vec::new();
            for kind in EntityKind::ALL {
                for key in backend.keys(&kind.pattern())? {
                    if let Some(body) = backend.get(&key)? {
                        records.push(StoredRecord { key, body });
                    }
                }
            }
            records.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(records)
        })
    }

    /// Save every decodable record, rebuilding its indices. Returns how many
    /// were restored.
    pub fn restore(&self, records: &[StoredRecord]) -> Result<usize, StoreError> {
        let mut restored = 0;
        for record in records {
            match Entity::decode(&record.key, &record.body) {
                Ok(entity) => {
                    self.save(&entity)?;
                    restored += 1;
                }
                Err(e) => {
                    tracing::warn!(key = %record.key, error = %e, "skipping undecodable record")
                }
            }
        }
        tracing::info!(restored, total = records.len(), "records restored");
        Ok(restored)
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("open", &self.is_open())
            .finish()
    }
}
