//! Domain-specific error types for the capture bridge.
//!
//! All fallible operations return `Result<T, RdpMicError>`.
//! Nothing the peer sends can make the bridge panic: malformed input is a
//! typed error, and every transport error is recoverable by reconnecting.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the capture bridge.
#[derive(Debug, Error)]
pub enum RdpMicError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The rendezvous socket could not be reached.
    #[error("connect to {} failed: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A read or write on a live connection failed or hit end of stream.
    /// The connection has already been closed when this is returned.
    #[error("connection broken: {0}")]
    Broken(#[source] std::io::Error),

    /// An operation needed a live connection but none exists.
    #[error("not connected")]
    NotConnected,

    /// A single send or receive exceeded the configured I/O deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A frame did not have the fixed layout.
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),

    /// A message was sent in a connection state that does not allow it.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The peer announced more data than was asked for.
    #[error("reply too large: {available} bytes announced for a {requested} byte request")]
    ReplyTooLarge { requested: u16, available: u16 },

    // ── Configuration Errors ─────────────────────────────────────
    /// The sample format, channel count or rate is unusable.
    #[error("invalid sample spec: {0}")]
    InvalidSampleSpec(String),

    /// A configuration value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Channel Errors ───────────────────────────────────────────
    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// The downstream sink had no room; the chunk was dropped.
    #[error("sink full, dropped {bytes} byte chunk")]
    SinkFull { bytes: usize },

    /// A socket error surfaced through `Framed<_, PeerCodec>` on the
    /// serving side.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl RdpMicError {
    /// Returns `true` for failures that are recovered by dropping the
    /// connection and trying again on a later tick.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Broken(_)
                | Self::NotConnected
                | Self::Timeout(_)
                | Self::ReplyTooLarge { .. }
                | Self::Io(_)
        )
    }

    /// Returns `true` for errors raised while validating configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidSampleSpec(_) | Self::InvalidConfig(_))
    }
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RdpMicError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RdpMicError::ChannelClosed
    }
}
