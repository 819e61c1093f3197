//! The capture state machine.
//!
//! One [`tick`](CaptureScheduler::tick) per pacing interval:
//!
//! 1. If the remote device is not streaming, connect and send Start.
//! 2. Work out how many bytes are due since the last delivery.
//! 3. Send `Request(due)`, read the length reply and the payload.
//! 4. Hand a non-empty payload to the sink and restart the clock.
//!
//! Any transport failure closes the connection. The next tick reconnects
//! and sends Start again before requesting anything.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::capture::clock::CaptureClock;
use crate::capture::sink::{AudioChunk, ChunkSink};
use crate::capture::stats::CaptureStats;
use crate::error::RdpMicError;
use crate::network::{ConnectionManager, Connector};
use crate::sample::SampleSpec;

// ── HostState ────────────────────────────────────────────────────

/// Run state of the host-side audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostState {
    /// Someone is recording from the source.
    Running,
    /// Nobody is recording; the remote device should be closed.
    #[default]
    Idle,
}

impl HostState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

// ── TickOutcome ──────────────────────────────────────────────────

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The host is idle; nothing was sent.
    Idle,
    /// Less than one frame of time has passed since the last delivery.
    NothingDue,
    /// The peer had no data yet.
    NoData,
    /// A chunk of this many bytes reached the sink.
    Delivered(usize),
    /// The sink refused the chunk; the clock was not advanced.
    SinkRejected,
    /// Connecting, Start or the request failed; the connection is closed.
    TransportFailed,
}

// ── SchedulerConfig ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub sample_spec: SampleSpec,
    /// Tick interval while streaming.
    pub latency: Duration,
    /// Name used in log lines.
    pub source_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sample_spec: SampleSpec::default(),
            latency: crate::capture::clock::DEFAULT_LATENCY,
            source_name: "xrdp-source".into(),
        }
    }
}

// ── CaptureScheduler ─────────────────────────────────────────────

/// Owns everything one capture bridge needs: the connection, the sink,
/// the pacing clock and the host run state.
pub struct CaptureScheduler<C: Connector, S: ChunkSink> {
    conn: ConnectionManager<C>,
    sink: S,
    clock: CaptureClock,
    spec: SampleSpec,
    host: HostState,
    name: String,
    stats: CaptureStats,
    stats_tx: watch::Sender<CaptureStats>,
}

impl<C: Connector, S: ChunkSink> CaptureScheduler<C, S> {
    pub fn new(conn: ConnectionManager<C>, sink: S, config: SchedulerConfig) -> Self {
        Self::new_at(conn, sink, config, Instant::now())
    }

    /// Like [`new`](Self::new) with an explicit clock origin.
    pub fn new_at(
        conn: ConnectionManager<C>,
        sink: S,
        config: SchedulerConfig,
        now: Instant,
    ) -> Self {
        let (stats_tx, _) = watch::channel(CaptureStats::default());
        Self {
            conn,
            sink,
            clock: CaptureClock::new(config.latency, now),
            spec: config.sample_spec,
            host: HostState::Idle,
            name: config.source_name,
            stats: CaptureStats::default(),
            stats_tx,
        }
    }

    /// Obtain a `watch::Receiver` for capture statistics.
    pub fn stats_receiver(&self) -> watch::Receiver<CaptureStats> {
        self.stats_tx.subscribe()
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn clock(&self) -> &CaptureClock {
        &self.clock
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.conn
    }

    pub fn sample_spec(&self) -> &SampleSpec {
        &self.spec
    }

    pub fn host_state(&self) -> HostState {
        self.host
    }

    pub fn is_streaming(&self) -> bool {
        self.conn.state().is_streaming()
    }

    /// When the worker should wake next after a tick at `now`.
    /// `None` while idle: the timer is disabled.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.host
            .is_running()
            .then(|| self.clock.next_deadline(now))
    }

    /// React to a host run/idle transition.
    pub async fn set_host_state(&mut self, state: HostState, now: Instant) {
        match (self.host, state) {
            (HostState::Idle, HostState::Running) => {
                debug!("{}: host running", self.name);
                self.clock.reset(now);
            }
            (HostState::Running, HostState::Idle) => {
                debug!("{}: host idle", self.name);
                self.stop_streaming(now).await;
            }
            _ => {}
        }
        self.host = state;
    }

    /// Run one pacing step at `now`.
    pub async fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.host.is_running() {
            return TickOutcome::Idle;
        }

        if !self.is_streaming() {
            if let Err(e) = self.begin_streaming(now).await {
                return self.transport_failed(e, now);
            }
        }

        let want = self.clock.bytes_due(&self.spec, now);
        if want == 0 {
            return TickOutcome::NothingDue;
        }

        self.stats.requests_sent += 1;
        let reply = match self.conn.request(want).await {
            Ok(reply) => reply,
            Err(e) => return self.transport_failed(e, now),
        };

        if reply.is_empty() {
            self.stats.empty_replies += 1;
            self.publish(now);
            return TickOutcome::NoData;
        }

        let len = reply.available_bytes() as usize;
        let chunk = AudioChunk {
            data: reply.into_payload(),
            timestamp: now,
        };
        match self.sink.deliver_chunk(chunk) {
            Ok(()) => {
                self.clock.posted(now);
                self.stats.chunks_delivered += 1;
                self.stats.bytes_delivered += len as u64;
                self.publish(now);
                TickOutcome::Delivered(len)
            }
            Err(e) => {
                warn!("{}: sink rejected {len} bytes: {e}", self.name);
                TickOutcome::SinkRejected
            }
        }
    }

    /// Stop the remote device if needed and close the connection.
    pub async fn teardown(&mut self) {
        let now = Instant::now();
        self.stop_streaming(now).await;
        self.conn.close();
        self.publish(now);
        info!("{}: capture shut down", self.name);
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn begin_streaming(&mut self, now: Instant) -> Result<(), RdpMicError> {
        self.conn.ensure_connected().await?;
        self.conn.start().await?;
        self.publish(now);
        info!("{}: started recording from {}", self.name, self.conn.address());
        Ok(())
    }

    /// Best-effort Stop: a failure is logged and otherwise ignored.
    async fn stop_streaming(&mut self, now: Instant) {
        if !self.is_streaming() {
            return;
        }
        match self.conn.stop().await {
            Ok(()) => info!("{}: stopped recording", self.name),
            Err(e) => debug!("{}: stop not delivered: {e}", self.name),
        }
        self.publish(now);
    }

    fn transport_failed(&mut self, error: RdpMicError, now: Instant) -> TickOutcome {
        if error.is_transport() {
            debug!("{}: {error}", self.name);
        } else {
            warn!("{}: unexpected error, resetting connection: {error}", self.name);
        }
        self.conn.close();
        self.stats.transport_errors += 1;
        self.publish(now);
        TickOutcome::TransportFailed
    }

    fn publish(&mut self, now: Instant) {
        self.stats.streaming = self.is_streaming();
        self.stats.connects = self.conn.connect_count();
        self.stats.pending_latency = self.clock.pending_latency(now);
        self.stats_tx.send_replace(self.stats.clone());
    }
}
