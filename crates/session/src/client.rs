use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cluster_common::SessionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::response::Response;
use crate::transport::{Session, TransportError};

/// Frames that may wait for a slow viewer before it is dropped.
pub const OUTBOUND_CAPACITY: usize = 256;
/// Longest a single frame may take to reach the transport.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// An authenticated session bound to one player.
///
/// Outgoing frames go through a bounded queue drained by a writer task, so
/// a viewer that stops reading only ever stalls its own writer. The writer
/// stops at the first failed or timed out send and the queue closes with it.
pub struct Client {
    id: SessionId,
    username: String,
    session: Arc<dyn Session>,
    outbound: mpsc::Sender<Vec<u8>>,
}

impl Client {
    /// Bind `session` to `username` with the default queue limits.
    ///
    /// Spawns the writer task, so it must run inside a tokio runtime.
    pub fn new(username: impl Into<String>, session: Arc<dyn Session>) -> Self {
        Self::with_limits(username, session, OUTBOUND_CAPACITY, SEND_TIMEOUT)
    }

    /// Like [`Client::new`] with an explicit queue capacity and per-frame
    /// send timeout.
    pub fn with_limits(
        username: impl Into<String>,
        session: Arc<dyn Session>,
        capacity: usize,
        send_timeout: Duration,
    ) -> Self {
        let id = SessionId::new();
        let (outbound, frames) = mpsc::channel(capacity.max(1));
        tokio::spawn(write_frames(id, session.clone(), frames, send_timeout));
        Self {
            id,
            username: username.into(),
            session,
            outbound,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Queue an encoded frame without waiting.
    pub fn try_send_frame(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Backlogged,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Sanitize `response` for this client's player and queue it, waiting
    /// for room if the queue is full.
    pub async fn send_response(&self, response: &Response) -> Result<(), TransportError> {
        let frame = response.sanitized_for(&self.username).encode()?;
        self.outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Whether the writer has stopped.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Wait until the writer has stopped.
    pub async fn closed(&self) {
        self.outbound.closed().await
    }
}

async fn write_frames(
    id: SessionId,
    session: Arc<dyn Session>,
    mut frames: mpsc::Receiver<Vec<u8>>,
    send_timeout: Duration,
) {
    while let Some(frame) = frames.recv().await {
        let error = match tokio::time::timeout(send_timeout, session.send(&frame)).await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(_) => TransportError::TimedOut(send_timeout),
        };
        tracing::warn!(session = %id, error = %error, "session writer stopped");
        return;
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("peer", &self.session.peer())
            .finish()
    }
}
