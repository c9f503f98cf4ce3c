//! Framed TCP transport.
//!
//! Every message is a big-endian `u32` length followed by that many payload
//! bytes. An empty frame is a heartbeat: the server answers it with any frame.
//! The handshake performed by [`TcpConnector::connect`] is one heartbeat
//! round trip, so a port that accepts TCP but does not speak the protocol is
//! reported as a handshake failure rather than a healthy server.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::pool::server::ServerDescriptor;
use crate::upstream::{Connection, Connector, ProtocolError};

const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Opens [`TcpSession`]s.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    probe_timeout: Duration,
    max_frame_len: usize,
}

impl TcpConnector {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probe_timeout,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Reject response frames larger than `len` bytes.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpSession;

    async fn connect(
        &self,
        server: &ServerDescriptor,
        timeout: Duration,
    ) -> Result<TcpSession, ProtocolError> {
        let address = server.address();
        let stream = match time::timeout(timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ProtocolError::Connect { address, source }),
            Err(_) => return Err(ProtocolError::Timeout(timeout)),
        };
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;

        let mut session = TcpSession {
            stream,
            peer,
            probe_timeout: self.probe_timeout,
            max_frame_len: self.max_frame_len,
            closed: false,
        };

        match time::timeout(timeout, session.round_trip(&[])).await {
            Ok(Ok(_)) => {
                tracing::trace!(peer = %peer, "Upstream handshake complete");
                Ok(session)
            }
            Ok(Err(e)) => {
                tracing::debug!(peer = %peer, error = %e, "Upstream handshake failed");
                session.disconnect().await;
                Err(ProtocolError::Handshake(address))
            }
            Err(_) => {
                session.disconnect().await;
                Err(ProtocolError::Handshake(address))
            }
        }
    }
}

/// One framed TCP session.
#[derive(Debug)]
pub struct TcpSession {
    stream: TcpStream,
    peer: SocketAddr,
    probe_timeout: Duration,
    max_frame_len: usize,
    closed: bool,
}

impl TcpSession {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Send one frame and read the reply. Any failure once the request is on
    /// the wire leaves the stream out of step, so the session is closed.
    async fn round_trip(&mut self, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        if self.closed {
            return Err(ProtocolError::Closed);
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| ProtocolError::Malformed(format!("request of {} bytes", payload.len())))?;

        let result = self.exchange(len, payload).await;
        if let Err(e) = &result {
            tracing::debug!(peer = %self.peer, error = %e, "Upstream session desynchronized, closing");
            self.disconnect().await;
        }
        result
    }

    async fn exchange(&mut self, len: u32, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        self.stream.write_all(&len.to_be_bytes()).await?;
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;

        let mut header = [0u8; 4];
        match self.stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::Closed)
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_frame_len {
            return Err(ProtocolError::Malformed(format!(
                "frame of {} bytes exceeds limit of {}",
                len, self.max_frame_len
            )));
        }

        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body).await?;
        Ok(body)
    }
}

#[async_trait]
impl Connection for TcpSession {
    type Request = Vec<u8>;
    type Response = Vec<u8>;

    async fn probe(&mut self) -> bool {
        matches!(
            time::timeout(self.probe_timeout, self.round_trip(&[])).await,
            Ok(Ok(_))
        )
    }

    async fn execute(&mut self, request: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
        if request.is_empty() {
            return Err(ProtocolError::Malformed("empty request frame".into()));
        }
        self.round_trip(&request).await
    }

    async fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(peer = %self.peer, error = %e, "Error closing upstream session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Echo server speaking the framed protocol.
    async fn spawn_echo() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    loop {
                        let mut header = [0u8; 4];
                        if socket.read_exact(&mut header).await.is_err() {
                            break;
                        }
                        let len = u32::from_be_bytes(header) as usize;
                        let mut body = vec![0u8; len];
                        if socket.read_exact(&mut body).await.is_err() {
                            break;
                        }
                        let _ = socket.write_all(&header).await;
                        let _ = socket.write_all(&body).await;
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn connect_execute_disconnect() {
        let addr = spawn_echo().await;
        let server = ServerDescriptor::new(addr.ip().to_string(), addr.port());
        let connector = TcpConnector::new(Duration::from_millis(500));

        let mut session = connector
            .connect(&server, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(session.probe().await);

        let reply = session.execute(b"quote 600000".to_vec()).await.unwrap();
        assert_eq!(reply, b"quote 600000");

        session.disconnect().await;
        assert!(!session.probe().await);
        assert!(matches!(
            session.execute(b"x".to_vec()).await,
            Err(ProtocolError::Closed)
        ));
    }

    #[tokio::test]
    async fn oversized_reply_closes_session() {
        let addr = spawn_echo().await;
        let server = ServerDescriptor::new(addr.ip().to_string(), addr.port());
        let connector = TcpConnector::new(Duration::from_millis(500)).with_max_frame_len(4);

        let mut session = connector
            .connect(&server, Duration::from_secs(1))
            .await
            .unwrap();

        let result = session.execute(vec![0u8; 8]).await;
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));

        // The unread body must never be taken for the next reply.
        assert!(!session.probe().await);
        assert!(matches!(
            session.execute(b"hi".to_vec()).await,
            Err(ProtocolError::Closed)
        ));
    }

    #[tokio::test]
    async fn connect_refused_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = ServerDescriptor::new("127.0.0.1", addr.port());
        let result = TcpConnector::default()
            .connect(&server, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ProtocolError::Connect { .. })));
    }

    #[tokio::test]
    async fn silent_server_fails_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let server = ServerDescriptor::new("127.0.0.1", addr.port());
        let result = TcpConnector::default()
            .connect(&server, Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(ProtocolError::Handshake(_))));
    }
}
