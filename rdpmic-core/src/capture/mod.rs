//! # Capture pipeline
//!
//! ```text
//!  host ──[ControlMessage]──► worker (service::run)
//!                               │
//!                               ▼
//!                        CaptureScheduler::tick ──► ConnectionManager ──► peer
//!                               │
//!                               ▼
//!                         ChunkSink::deliver_chunk
//! ```
//!
//! | Module      | Purpose                                            |
//! |-------------|----------------------------------------------------|
//! | `clock`     | Elapsed-time to bytes-due pacing                   |
//! | `scheduler` | Start / Request / Stop state machine               |
//! | `service`   | Worker task, control channel, host-facing handle   |
//! | `sink`      | Downstream chunk delivery                          |
//! | `stats`     | Counters and latency published over `watch`        |

pub mod clock;
pub mod scheduler;
pub mod service;
pub mod sink;
pub mod stats;

// ── Re-exports ───────────────────────────────────────────────────

pub use clock::{CaptureClock, DEFAULT_LATENCY, MAX_REQUEST_BYTES, MIN_LATENCY, REQUEST_OVERSHOOT};
pub use scheduler::{CaptureScheduler, HostState, SchedulerConfig, TickOutcome};
pub use service::{CaptureHandle, ControlMessage};
pub use sink::{AudioChunk, ChannelSink, ChunkSink};
pub use stats::CaptureStats;
