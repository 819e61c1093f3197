//! The capture worker task and the host-facing handle.
//!
//! The host never touches the scheduler directly. It sends
//! [`ControlMessage`]s; the worker applies them at the top of each loop
//! iteration, then ticks if the host is running.
//!
//! ```no_run
//! # use rdpmic_core::capture::{CaptureHandle, HostState};
//! # async fn example(handle: CaptureHandle) -> Result<(), rdpmic_core::RdpMicError> {
//! handle.on_host_state_changed(HostState::Running).await?;
//! // … later …
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::capture::scheduler::{CaptureScheduler, HostState};
use crate::capture::sink::ChunkSink;
use crate::capture::stats::CaptureStats;
use crate::error::RdpMicError;
use crate::network::Connector;

const CONTROL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    HostState(HostState),
    Shutdown,
}

// ── CaptureHandle ────────────────────────────────────────────────

/// Host-side handle to a running capture worker.
pub struct CaptureHandle {
    control: mpsc::Sender<ControlMessage>,
    stats: watch::Receiver<CaptureStats>,
    worker: JoinHandle<()>,
}

impl CaptureHandle {
    /// Spawn the worker for `scheduler` on the current Tokio runtime.
    pub fn spawn<C, S>(scheduler: CaptureScheduler<C, S>) -> Self
    where
        C: Connector + 'static,
        S: ChunkSink + 'static,
    {
        let (control, rx) = mpsc::channel(CONTROL_CAPACITY);
        let stats = scheduler.stats_receiver();
        let worker = tokio::spawn(run(scheduler, rx));
        Self {
            control,
            stats,
            worker,
        }
    }

    pub async fn on_host_state_changed(&self, state: HostState) -> Result<(), RdpMicError> {
        self.control
            .send(ControlMessage::HostState(state))
            .await
            .map_err(RdpMicError::from)
    }

    /// Obtain a `watch::Receiver` for capture statistics.
    pub fn stats_receiver(&self) -> watch::Receiver<CaptureStats> {
        self.stats.clone()
    }

    /// Latency to report to the host, as of the worker's last publish.
    pub fn pending_latency(&self) -> Duration {
        self.stats.borrow().pending_latency
    }

    /// Ask the worker to stop, then wait for its teardown to finish.
    pub async fn shutdown(self) -> Result<(), RdpMicError> {
        // A closed channel means the worker is already gone.
        let _ = self.control.send(ControlMessage::Shutdown).await;
        self.worker
            .await
            .map_err(|e| RdpMicError::Other(format!("capture worker failed: {e}")))
    }
}

// ── Worker loop ──────────────────────────────────────────────────

/// Drive `scheduler` until a `Shutdown` arrives or every sender is dropped.
///
/// While the host runs, the loop wakes at absolute deadlines one latency
/// interval after the previous tick. While idle it sleeps on the control
/// channel alone.
pub async fn run<C, S>(mut scheduler: CaptureScheduler<C, S>, mut control: mpsc::Receiver<ControlMessage>)
where
    C: Connector,
    S: ChunkSink,
{
    let mut deadline: Option<Instant> = None;

    loop {
        let message = match deadline {
            Some(at) => tokio::select! {
                biased;
                message = control.recv() => Some(message),
                _ = tokio::time::sleep_until(at) => None,
            },
            None => Some(control.recv().await),
        };

        match message {
            Some(None) | Some(Some(ControlMessage::Shutdown)) => break,
            Some(Some(ControlMessage::HostState(state))) => {
                scheduler.set_host_state(state, Instant::now()).await;
            }
            None => {}
        }

        let now = Instant::now();
        if scheduler.host_state().is_running() {
            let outcome = scheduler.tick(now).await;
            debug!("tick: {outcome:?}");
        }
        deadline = scheduler.next_deadline(now);
    }

    scheduler.teardown().await;
}
