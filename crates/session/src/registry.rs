//! Per-player pool of live sessions.
//!
//! # Invariants
//! - Recipients are snapshotted under the lock and sent to outside it, so a
//!   removal that completes before a broadcast starts is never delivered to.
//! - One recipient's failure never stops delivery to the others. Delivery
//!   only queues frames on each client, so a stalled viewer cannot hold up
//!   the caller either.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cluster_common::SessionId;

use crate::client::Client;
use crate::response::Response;

/// Errors from registering a session.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("session registry is closed")]
    Closed,
}

/// Outcome of a send or broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

#[derive(Default)]
struct Pool {
    clients: HashMap<String, Vec<Arc<Client>>>,
    closed: bool,
}

/// Live sessions of every logged-in player.
#[derive(Default)]
pub struct SessionRegistry {
    pool: Mutex<Pool>,
}

impl SessionRegistry {
    /// An open, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // Pool mutations are single statements, so a poisoned lock still guards
    // consistent data.
    fn pool(&self) -> MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `client` under its username.
    pub fn add(&self, client: Arc<Client>) -> Result<(), RegistryError> {
        let mut pool = self.pool();
        if pool.closed {
            return Err(RegistryError::Closed);
        }
        tracing::debug!(
            username = client.username(),
            session = %client.id(),
            "session registered"
        );
        pool.clients
            .entry(client.username().to_string())
            .or_default()
            .push(client);
        Ok(())
    }

    /// Unregister a session. Returns whether it was registered.
    pub fn remove(&self, username: &str, id: SessionId) -> bool {
        let mut pool = self.pool();
        let Some(sessions) = pool.clients.get_mut(username) else {
            return false;
        };
        let before = sessions.len();
        sessions.retain(|c| c.id() != id);
        let removed = sessions.len() != before;
        if sessions.is_empty() {
            pool.clients.remove(username);
        }
        if removed {
            tracing::debug!(username, session = %id, "session unregistered");
        }
        removed
    }

    fn sessions_of(&self, username: &str) -> Vec<Arc<Client>> {
        self.pool()
            .clients
            .get(username)
            .cloned()
            .unwrap_or_default()
    }

    /// Queue `response` for every session of `username`.
    pub fn send(&self, username: &str, response: &Response) -> DeliveryReport {
        let sessions = self.sessions_of(username);
        self.deliver(username, &sessions, response)
    }

    /// Queue `response` for every session of every player.
    pub fn broadcast(&self, response: &Response) -> DeliveryReport {
        let recipients: Vec<(String, Vec<Arc<Client>>)> = self
            .pool()
            .clients
            .iter()
            .map(|(username, sessions)| (username.clone(), sessions.clone()))
            .collect();
        let mut report = DeliveryReport::default();
        for (username, sessions) in &recipients {
            report.merge(self.deliver(username, sessions, response));
        }
        report
    }

    // Never waits on a transport: a session whose queue is full or whose
    // writer has stopped is dropped instead.
    fn deliver(
        &self,
        username: &str,
        sessions: &[Arc<Client>],
        response: &Response,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if sessions.is_empty() {
            return report;
        }
        let frame = match response.sanitized_for(username).encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(username, error = %e, "failed to encode response");
                report.failed = sessions.len();
                return report;
            }
        };
        for client in sessions {
            match client.try_send_frame(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        username,
                        session = %client.id(),
                        error = %e,
                        "delivery failed, dropping session"
                    );
                    self.remove(username, client.id());
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Refuse further registrations and release every session.
    pub fn close(&self) -> Vec<Arc<Client>> {
        let mut pool = self.pool();
        pool.closed = true;
        let released: Vec<Arc<Client>> = pool.clients.drain().flat_map(|(_, s)| s).collect();
        tracing::info!(sessions = released.len(), "session registry closed");
        released
    }

    /// Whether `username` has at least one registered session.
    pub fn is_online(&self, username: &str) -> bool {
        self.pool().clients.contains_key(username)
    }

    pub fn player_count(&self) -> usize {
        self.pool().clients.len()
    }

    /// Registered sessions across every player.
    pub fn session_count(&self) -> usize {
        self.pool().clients.values().map(Vec::len).sum()
    }
}
