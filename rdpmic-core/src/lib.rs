//! # rdpmic-core
//!
//! Client side of the xrdp microphone channel: pulls PCM captured on the
//! remote desktop client out of a local UNIX socket, paced to the local
//! sample clock.
//!
//! This crate contains:
//! - **Protocol types**: `ProtocolMessage`, `Opcode`, `DataReply`
//! - **Codec**: fixed 11-byte control frames, length-prefixed replies, and
//!   `PeerCodec` for the serving side via `tokio_util`
//! - **Address**: socket path resolution from config, environment and `DISPLAY`
//! - **Sample**: `SampleSpec` and byte/time conversion
//! - **Network**: `ConnectionManager` with reconnect-on-failure, `PeerSession`
//! - **State**: the `ConnectionState` machine
//! - **Capture**: pacing clock, scheduler, worker task and chunk sinks
//! - **Error**: `RdpMicError`, typed, `thiserror`-based error hierarchy

pub mod address;
pub mod capture;
pub mod codec;
pub mod error;
pub mod message;
pub mod network;
pub mod sample;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use address::SocketAddress;
pub use capture::{
    AudioChunk, CaptureHandle, CaptureScheduler, CaptureStats, ChannelSink, ChunkSink, HostState,
    SchedulerConfig, TickOutcome,
};
pub use codec::{FRAME_SIZE, PeerCodec};
pub use error::RdpMicError;
pub use message::{DataReply, Opcode, ProtocolMessage};
pub use network::{ConnectionManager, Connector, PeerSession, UnixConnector};
pub use sample::{SampleFormat, SampleSpec};
pub use state::ConnectionState;
