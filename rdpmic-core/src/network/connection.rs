use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use crate::address::SocketAddress;
use crate::codec::{self, REPLY_HEADER_SIZE};
use crate::error::RdpMicError;
use crate::message::{DataReply, ProtocolMessage};
use crate::state::ConnectionState;

// ── Connector ────────────────────────────────────────────────────

/// Opens the byte stream to the peer.
///
/// The manager never names a socket type directly, so tests can hand it
/// in-memory streams.
#[async_trait]
pub trait Connector: Send {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&mut self, address: &SocketAddress) -> std::io::Result<Self::Stream>;
}

/// Connects to a UNIX domain stream socket at the resolved path.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixConnector;

#[async_trait]
impl Connector for UnixConnector {
    type Stream = UnixStream;

    async fn connect(&mut self, address: &SocketAddress) -> std::io::Result<UnixStream> {
        UnixStream::connect(address.path()).await
    }
}

// ── ConnectionManager ────────────────────────────────────────────

/// Owns the single connection to the peer and its protocol state.
///
/// Every I/O failure closes the socket and resets the state to
/// `Disconnected`; the next call to [`ensure_connected`](Self::ensure_connected)
/// opens a fresh one.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    address: SocketAddress,
    stream: Option<C::Stream>,
    state: ConnectionState,
    io_timeout: Option<Duration>,
    connects: u64,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, address: SocketAddress) -> Self {
        Self {
            connector,
            address,
            stream: None,
            state: ConnectionState::default(),
            io_timeout: None,
            connects: 0,
        }
    }

    /// Bound every send and receive by `timeout`. `None` blocks for as long
    /// as the peer takes.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn address(&self) -> &SocketAddress {
        &self.address
    }

    /// Number of successful connects since construction.
    pub fn connect_count(&self) -> u64 {
        self.connects
    }

    /// Open the socket if none is live.
    pub async fn ensure_connected(&mut self) -> Result<(), RdpMicError> {
        if self.stream.is_some() {
            return Ok(());
        }

        debug!("trying to connect to {}", self.address);
        let stream = self
            .connector
            .connect(&self.address)
            .await
            .map_err(|source| RdpMicError::Connect {
                path: self.address.path().to_path_buf(),
                source,
            })?;

        self.stream = Some(stream);
        self.state.force_disconnect();
        self.state.connected()?;
        self.connects += 1;
        info!("connected to {}", self.address);
        Ok(())
    }

    /// Write all of `bytes`, looping over partial writes.
    pub async fn send_exact(&mut self, bytes: &[u8]) -> Result<(), RdpMicError> {
        let timeout = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(RdpMicError::NotConnected)?;
        let result = with_deadline(timeout, stream.write_all(bytes)).await;
        self.settle(result)
    }

    /// Read exactly `n` bytes, looping over partial reads.
    pub async fn recv_exact(&mut self, n: usize) -> Result<Bytes, RdpMicError> {
        let timeout = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(RdpMicError::NotConnected)?;
        let mut buf = vec![0u8; n];
        let result = with_deadline(timeout, stream.read_exact(&mut buf)).await;
        self.settle(result).map(|_| Bytes::from(buf))
    }

    // ── Protocol operations ──────────────────────────────────────

    /// Send Start. There is no acknowledgement: a completed write is
    /// taken as success.
    pub async fn start(&mut self) -> Result<(), RdpMicError> {
        self.state.check_can_start()?;
        self.send_exact(&codec::encode(ProtocolMessage::Start)).await?;
        self.state.started()
    }

    /// Send `Request(max_bytes)` and read the reply.
    pub async fn request(&mut self, max_bytes: u16) -> Result<DataReply, RdpMicError> {
        self.state.check_can_request()?;
        self.send_exact(&codec::encode(ProtocolMessage::Request { max_bytes }))
            .await?;

        let header = self.recv_exact(REPLY_HEADER_SIZE).await?;
        let available = codec::decode_length_reply([header[0], header[1]]);
        if available > max_bytes {
            self.close();
            return Err(RdpMicError::ReplyTooLarge {
                requested: max_bytes,
                available,
            });
        }
        if available == 0 {
            return Ok(DataReply::empty());
        }

        let payload = self.recv_exact(available as usize).await?;
        DataReply::new(payload)
    }

    /// Send Stop. On failure the connection is already closed.
    pub async fn stop(&mut self) -> Result<(), RdpMicError> {
        if !self.state.is_streaming() {
            return Err(RdpMicError::ProtocolViolation(
                "cannot stop: not in Streaming state",
            ));
        }
        self.send_exact(&codec::encode(ProtocolMessage::Stop)).await?;
        self.state.stopped()
    }

    /// Drop the socket and reset to `Disconnected`.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("closed connection to {}", self.address);
        }
        self.state.force_disconnect();
    }

    // ── Internal ─────────────────────────────────────────────────

    fn settle<T>(&mut self, result: Result<T, RdpMicError>) -> Result<T, RdpMicError> {
        if let Err(e) = &result {
            warn!("connection to {} lost: {e}", self.address);
            self.close();
        }
        result
    }
}

async fn with_deadline<T, F>(timeout: Option<Duration>, io: F) -> Result<T, RdpMicError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, io).await {
            Ok(result) => result.map_err(RdpMicError::Broken),
            Err(_) => Err(RdpMicError::Timeout(limit)),
        },
        None => io.await.map_err(RdpMicError::Broken),
    }
}
