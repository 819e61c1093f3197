//! Pacing clock for the capture loop.

use std::time::Duration;

use tokio::time::Instant;

use crate::sample::SampleSpec;

/// Upper bound of the 16-bit request length field.
pub const MAX_REQUEST_BYTES: u16 = u16::MAX;

/// Requests ask for this many times the elapsed-time byte count, so the
/// loop catches up after a late wake-up. The peer may return less.
pub const REQUEST_OVERSHOOT: usize = 4;

pub const DEFAULT_LATENCY: Duration = Duration::from_millis(10);

/// Shortest tick interval. Reconnect attempts happen at most once a tick,
/// so this also floors the retry rate.
pub const MIN_LATENCY: Duration = Duration::from_millis(1);

/// Tracks when audio was last delivered and how much is due now.
#[derive(Debug, Clone)]
pub struct CaptureClock {
    last_post_time: Instant,
    latency: Duration,
    max_request_bytes: u16,
}

impl CaptureClock {
    pub fn new(latency: Duration, now: Instant) -> Self {
        Self {
            last_post_time: now,
            latency: latency.max(MIN_LATENCY),
            max_request_bytes: MAX_REQUEST_BYTES,
        }
    }

    pub fn last_post_time(&self) -> Instant {
        self.last_post_time
    }

    /// Interval between ticks while streaming.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn max_request_bytes(&self) -> u16 {
        self.max_request_bytes
    }

    /// Restart the elapsed-time count, e.g. when the host starts running.
    pub fn reset(&mut self, now: Instant) {
        self.last_post_time = now;
    }

    /// Record a delivered chunk.
    pub fn posted(&mut self, now: Instant) {
        self.last_post_time = now;
    }

    /// Bytes to ask for at `now`: the elapsed time in whole frames, times
    /// [`REQUEST_OVERSHOOT`], capped at the request field width.
    pub fn bytes_due(&self, spec: &SampleSpec, now: Instant) -> u16 {
        let elapsed = now.saturating_duration_since(self.last_post_time);
        let want = spec
            .bytes_for_duration(elapsed)
            .saturating_mul(REQUEST_OVERSHOOT);
        want.min(self.max_request_bytes as usize) as u16
    }

    /// Absolute time of the next tick after one that ran at `now`.
    pub fn next_deadline(&self, now: Instant) -> Instant {
        now + self.latency
    }

    /// Latency reported to the host: how far the last delivery lies in
    /// the future, or zero.
    pub fn pending_latency(&self, now: Instant) -> Duration {
        self.last_post_time.saturating_duration_since(now)
    }
}
