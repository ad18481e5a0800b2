use std::time::Duration;

use async_trait::async_trait;

/// Errors from a session transport. They end only the session they occur on.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("session closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("outbound queue is full")]
    Backlogged,
    #[error("send did not complete within {0:?}")]
    TimedOut(Duration),
    #[error("frame exceeds {0} bytes")]
    FrameTooLarge(usize),
}

/// A byte-oriented, bidirectional connection to one viewer.
///
/// `send` may be called concurrently with `receive` and with other `send`s;
/// implementations keep whole frames intact.
#[async_trait]
pub trait Session: Send + Sync {
    /// Deliver one frame.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Next frame from the peer, or `None` once the peer has closed.
    async fn receive(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Peer description for logs.
    fn peer(&self) -> String {
        "unknown".to_string()
    }
}
