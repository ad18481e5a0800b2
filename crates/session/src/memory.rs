//! Channel-backed [`Session`] for tests and in-process viewers.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::response::Response;
use crate::transport::{Session, TransportError};

/// Server side of an in-memory connection.
pub struct MemorySession {
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: AtomicBool,
}

/// Viewer side of an in-memory connection.
pub struct MemoryPeer {
    to_session: Option<mpsc::UnboundedSender<Vec<u8>>>,
    from_session: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemorySession {
    /// A connected session and the peer driving it.
    pub fn pair() -> (MemorySession, MemoryPeer) {
        let (to_session, inbound) = mpsc::unbounded_channel();
        let (outbound, from_session) = mpsc::unbounded_channel();
        (
            MemorySession {
                inbound: Mutex::new(inbound),
                outbound,
                closed: AtomicBool::new(false),
            },
            MemoryPeer {
                to_session: Some(to_session),
                from_session,
            },
        )
    }

    /// Close from the server side; later sends fail and receives end.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.inbound.lock().await.recv().await)
    }

    fn peer(&self) -> String {
        "memory".to_string()
    }
}

impl MemoryPeer {
    /// Send a frame to the session. Returns false once either side closed.
    pub fn send(&self, frame: impl Into<Vec<u8>>) -> bool {
        self.to_session
            .as_ref()
            .is_some_and(|tx| tx.send(frame.into()).is_ok())
    }

    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send(value.to_string())
    }

    /// Stop sending; the session's next `receive` ends.
    pub fn close(&mut self) {
        self.to_session = None;
    }

    /// Drop the connection entirely, so sends from the session fail too.
    pub fn hang_up(&mut self) {
        self.to_session = None;
        self.from_session.close();
        while self.from_session.try_recv().is_ok() {}
    }

    /// Next frame sent by the session, or `None` once it is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.from_session.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.from_session.try_recv().ok()
    }

    /// Next frame, decoded.
    pub async fn recv_response(&mut self) -> Option<Response> {
        let frame = self.recv().await?;
        Response::decode(&frame).ok()
    }

    /// Every frame already delivered, decoded.
    pub fn drain_responses(&mut self) -> Vec<Response> {
        std::iter::from_fn(|| self.try_recv())
            .filter_map(|frame| Response::decode(&frame).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (session, mut peer) = MemorySession::pair();
        assert!(peer.send("ping"));
        assert_eq!(session.receive().await.unwrap(), Some(b"ping".to_vec()));
        session.send(b"pong").await.unwrap();
        assert_eq!(peer.recv().await, Some(b"pong".to_vec()));
    }

    #[tokio::test]
    async fn peer_close_ends_receive() {
        let (session, mut peer) = MemorySession::pair();
        peer.send("last");
        peer.close();
        assert_eq!(session.receive().await.unwrap(), Some(b"last".to_vec()));
        assert_eq!(session.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn hang_up_fails_sends() {
        let (session, mut peer) = MemorySession::pair();
        peer.hang_up();
        assert!(matches!(session.send(b"x").await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn server_close_fails_sends() {
        let (session, _peer) = MemorySession::pair();
        session.close();
        assert!(matches!(session.send(b"x").await, Err(TransportError::Closed)));
        assert_eq!(session.receive().await.unwrap(), None);
    }
}
