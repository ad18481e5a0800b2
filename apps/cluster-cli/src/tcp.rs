//! Newline-delimited frames over TCP.

use std::net::SocketAddr;

use async_trait::async_trait;
use cluster_session::{Session, TransportError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

/// Longest accepted inbound frame, newline excluded.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// One viewer connection. Each frame is a JSON document on its own line.
pub struct TcpSession {
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    peer: SocketAddr,
    max_frame: usize,
}

impl TcpSession {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self::with_max_frame(stream, peer, MAX_FRAME_LEN)
    }

    /// A session refusing inbound frames longer than `max_frame` bytes.
    pub fn with_max_frame(stream: TcpStream, peer: SocketAddr, max_frame: usize) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: Mutex::new(BufReader::new(read)),
            writer: Mutex::new(write),
            peer,
            max_frame,
        }
    }
}

#[async_trait]
impl Session for TcpSession {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(frame).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut reader = self.reader.lock().await;
        let limit = self.max_frame as u64 + 1;
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = (&mut *reader)
                .take(limit)
                .read_until(b'\n', &mut line)
                .await?;
            if read == 0 {
                return Ok(None);
            }
            if line.len() > self.max_frame && !line.ends_with(b"\n") {
                return Err(TransportError::FrameTooLarge(self.max_frame));
            }
            let frame = line.trim_ascii();
            // blank lines are keep-alives
            if !frame.is_empty() {
                return Ok(Some(frame.to_vec()));
            }
        }
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn frames_are_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        let session = TcpSession::new(stream, peer);

        client.write_all(b"{\"a\":1}\n\n  \r\n{\"b\":2}\r\n").await.unwrap();
        assert_eq!(session.receive().await.unwrap(), Some(b"{\"a\":1}".to_vec()));
        assert_eq!(session.receive().await.unwrap(), Some(b"{\"b\":2}".to_vec()));

        session.send(b"{\"ok\":true}").await.unwrap();
        let mut reader = BufReader::new(&mut client);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "{\"ok\":true}\n");

        drop(reader);
        client.shutdown().await.unwrap();
        assert_eq!(session.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_frame_is_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        let session = TcpSession::with_max_frame(stream, peer, 8);

        client.write_all(b"12345678\n0123456789abcdef\n").await.unwrap();
        assert_eq!(session.receive().await.unwrap(), Some(b"12345678".to_vec()));
        assert!(matches!(
            session.receive().await,
            Err(TransportError::FrameTooLarge(8))
        ));
    }
}
