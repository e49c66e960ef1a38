//! Socket seam between sessions and the WebSocket transport.
//!
//! The upgrade handshake and frame plumbing belong to the network layer; a
//! session only needs a stream of inbound text payloads and a sink for
//! outbound text and ping frames. The [`mock`] module provides an in-memory
//! implementation for tests.

use crate::SyncResult;
use async_trait::async_trait;

/// The read half of a client connection.
#[async_trait]
pub trait SocketReader: Send {
    /// The next inbound text payload. Returns `None` once the peer closed
    /// the connection or the transport failed; implementations skip
    /// non-text frames internally.
    async fn recv_text(&mut self) -> Option<Vec<u8>>;
}

/// The write half of a client connection.
#[async_trait]
pub trait SocketWriter: Send {
    /// Sends a text frame.
    async fn send_text(&mut self, payload: Vec<u8>) -> SyncResult<()>;

    /// Sends a ping control frame.
    async fn send_ping(&mut self) -> SyncResult<()>;
}

/// An in-memory socket for testing session behavior end to end.
pub mod mock {
    use super::{SocketReader, SocketWriter};
    use crate::{SyncError, SyncResult};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    /// A frame the session wrote to its socket.
    #[derive(Debug, Clone, PartialEq)]
    pub enum SentFrame {
        Text(Vec<u8>),
        Ping,
    }

    /// Read half handed to the session.
    pub struct MockReader {
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    }

    /// Write half handed to the session.
    pub struct MockWriter {
        tx: mpsc::UnboundedSender<SentFrame>,
    }

    /// The far end of the connection, driven by the test.
    pub struct MockRemote {
        to_server: Option<mpsc::UnboundedSender<Vec<u8>>>,
        from_server: mpsc::UnboundedReceiver<SentFrame>,
    }

    /// Creates a connected socket pair.
    pub fn pair() -> (MockWriter, MockReader, MockRemote) {
        let (to_server, server_rx) = mpsc::unbounded_channel();
        let (server_tx, from_server) = mpsc::unbounded_channel();
        (
            MockWriter { tx: server_tx },
            MockReader { rx: server_rx },
            MockRemote {
                to_server: Some(to_server),
                from_server,
            },
        )
    }

    #[async_trait]
    impl SocketReader for MockReader {
        async fn recv_text(&mut self) -> Option<Vec<u8>> {
            self.rx.recv().await
        }
    }

    #[async_trait]
    impl SocketWriter for MockWriter {
        async fn send_text(&mut self, payload: Vec<u8>) -> SyncResult<()> {
            self.tx
                .send(SentFrame::Text(payload))
                .map_err(|_| SyncError::Socket("peer hung up".into()))
        }

        async fn send_ping(&mut self) -> SyncResult<()> {
            self.tx
                .send(SentFrame::Ping)
                .map_err(|_| SyncError::Socket("peer hung up".into()))
        }
    }

    impl MockRemote {
        /// Sends a client frame to the session. Returns false once the
        /// session's reader is gone.
        pub fn send(&self, payload: impl Into<Vec<u8>>) -> bool {
            self.to_server
                .as_ref()
                .is_some_and(|tx| tx.send(payload.into()).is_ok())
        }

        /// Simulates the client closing its side: the session's reader sees
        /// end-of-stream.
        pub fn close_write(&mut self) {
            self.to_server = None;
        }

        /// The next frame the session wrote, pings included.
        pub async fn next_frame(&mut self) -> Option<SentFrame> {
            self.from_server.recv().await
        }

        /// The next text frame the session wrote, skipping pings.
        pub async fn next_text(&mut self) -> Option<Vec<u8>> {
            loop {
                match self.from_server.recv().await? {
                    SentFrame::Text(payload) => return Some(payload),
                    SentFrame::Ping => continue,
                }
            }
        }

        /// A non-blocking read of the next written text frame.
        pub fn try_next_text(&mut self) -> Option<Vec<u8>> {
            loop {
                match self.from_server.try_recv().ok()? {
                    SentFrame::Text(payload) => return Some(payload),
                    SentFrame::Ping => continue,
                }
            }
        }
    }
}
