//! Counters the capture worker publishes for the host.

use std::time::Duration;

/// Snapshot published after every tick that changes something.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Chunks handed to the sink.
    pub chunks_delivered: u64,
    /// Total PCM bytes handed to the sink.
    pub bytes_delivered: u64,
    /// Requests answered with a zero length.
    pub empty_replies: u64,
    /// Request frames written.
    pub requests_sent: u64,
    /// Successful connects, including the first.
    pub connects: u64,
    /// Connect failures and broken connections.
    pub transport_errors: u64,
    /// Whether Start is currently in effect.
    pub streaming: bool,
    /// Answer to a host latency query at publish time: how far the last
    /// delivery lies ahead of the clock, or zero.
    pub pending_latency: Duration,
}
