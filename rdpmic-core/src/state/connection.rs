//! Connection state machine for the capture channel.
//!
//! Provides a `ConnectionState` enum that models the transport lifecycle,
//! with validated transitions that return `Result` instead of panicking.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::RdpMicError;

// ── ConnectionState ──────────────────────────────────────────────

/// The current state of the connection to the peer.
///
/// ```text
///  Disconnected ──► Connected ──► Streaming
///       ▲               │              │
///       └───────────────┴──────────────┘
///          (I/O failure, Stop, teardown)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live socket. Initial / terminal state.
    #[default]
    Disconnected,

    /// Socket is open; the remote device has not been started.
    Connected,

    /// Start was sent; Request frames may be issued.
    Streaming {
        /// When the Start frame went out.
        since: Instant,
    },
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
            Self::Streaming { .. } => write!(f, "Streaming"),
        }
    }
}

impl ConnectionState {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Returns `true` while a socket is open, streaming or not.
    pub fn is_connected(&self) -> bool {
        !self.is_disconnected()
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// How long the remote device has been streaming at `now`.
    ///
    /// Returns `None` for any other state.
    pub fn streaming_duration(&self, now: Instant) -> Option<Duration> {
        match self {
            Self::Streaming { since } => Some(now.saturating_duration_since(*since)),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connected`.
    ///
    /// Valid from: `Disconnected`.
    pub fn connected(&mut self) -> Result<(), RdpMicError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connected;
                Ok(())
            }
            _ => Err(RdpMicError::ProtocolViolation(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Check that a Start frame may be sent.
    ///
    /// Valid from: `Connected`.
    pub fn check_can_start(&self) -> Result<(), RdpMicError> {
        match self {
            Self::Connected => Ok(()),
            Self::Disconnected => Err(RdpMicError::NotConnected),
            Self::Streaming { .. } => Err(RdpMicError::ProtocolViolation(
                "cannot start: already streaming",
            )),
        }
    }

    /// Transition to `Streaming` after Start went out.
    ///
    /// Valid from: `Connected`.
    pub fn started(&mut self) -> Result<(), RdpMicError> {
        self.check_can_start()?;
        *self = Self::Streaming {
            since: Instant::now(),
        };
        Ok(())
    }

    /// Check that a Request frame may be sent.
    ///
    /// Valid from: `Streaming`.
    pub fn check_can_request(&self) -> Result<(), RdpMicError> {
        match self {
            Self::Streaming { .. } => Ok(()),
            Self::Disconnected => Err(RdpMicError::NotConnected),
            Self::Connected => Err(RdpMicError::ProtocolViolation(
                "cannot request: Start has not been sent",
            )),
        }
    }

    /// Transition back to `Connected` after Stop went out.
    ///
    /// Valid from: `Streaming`.
    pub fn stopped(&mut self) -> Result<(), RdpMicError> {
        match self {
            Self::Streaming { .. } => {
                *self = Self::Connected;
                Ok(())
            }
            _ => Err(RdpMicError::ProtocolViolation(
                "cannot stop: not in Streaming state",
            )),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    ///
    /// Used on every I/O failure and on teardown.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────
