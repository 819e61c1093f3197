//! Microphone source service core logic.
//!
//! Wires one capture bridge together and runs it until stopped:
//!
//! ```text
//!  UnixConnector ─► ConnectionManager ─► CaptureScheduler ─► ChannelSink
//!                                             ▲                 │
//!                       SIGUSR1 / SIGUSR2 ────┘                 ▼
//!                       (CaptureHandle)                    PCM writer ─► file | stdout
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, warn};

use rdpmic_core::{
    AudioChunk, CaptureHandle, CaptureScheduler, CaptureStats, ChannelSink, ConnectionManager,
    HostState, UnixConnector,
};

use crate::config::SourceConfig;

type Output = Box<dyn AsyncWrite + Unpin + Send>;

// ── SourceService ────────────────────────────────────────────────

/// The top-level microphone source service.
///
/// Owns the configuration and a stop signal. `run` builds the capture
/// worker, reports the host as running, and then follows suspend/resume
/// signals until stopped.
pub struct SourceService {
    config: SourceConfig,
    stop: Arc<Notify>,
}

impl SourceService {
    /// Create a new service with the given config.
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Obtain a handle that stops the service from another task.
    pub fn stop_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.stop)
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Run the service until stopped.
    ///
    /// 1. Validates the sample spec and resolves the socket path.
    /// 2. Opens the output and spawns the PCM writer.
    /// 3. Spawns the capture worker and marks the host running.
    /// 4. `SIGUSR1` suspends capture, `SIGUSR2` resumes it.
    /// 5. On stop, the worker sends Stop if needed and closes the socket.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let scheduler_config = self.config.to_scheduler_config()?;
        let address = self.config.socket_address();
        let name = scheduler_config.source_name.clone();

        info!(
            "{name} ({}): {} from {address}",
            self.config.audio.description, scheduler_config.sample_spec
        );

        let output = open_output(self.config.output_path().as_deref()).await?;
        let (sink, chunks) = ChannelSink::new(ChannelSink::DEFAULT_CAPACITY);
        let mut writer = tokio::spawn(write_chunks(output, chunks));

        let conn = ConnectionManager::new(UnixConnector, address)
            .with_io_timeout(self.config.io_timeout());
        let handle = CaptureHandle::spawn(CaptureScheduler::new(conn, sink, scheduler_config));
        let mut stats = handle.stats_receiver();

        let mut suspend = signal(SignalKind::user_defined1())?;
        let mut resume = signal(SignalKind::user_defined2())?;

        handle.on_host_state_changed(HostState::Running).await?;
        let mut streaming = false;
        let mut writer_done = false;

        loop {
            tokio::select! {
                _ = self.stop.notified() => break,
                Some(()) = suspend.recv() => {
                    info!("{name}: suspended");
                    handle.on_host_state_changed(HostState::Idle).await?;
                }
                Some(()) = resume.recv() => {
                    info!("{name}: resumed");
                    handle.on_host_state_changed(HostState::Running).await?;
                }
                Ok(()) = stats.changed() => {
                    let now_streaming = stats.borrow_and_update().streaming;
                    if now_streaming != streaming {
                        streaming = now_streaming;
                        debug!("{name}: streaming = {streaming}");
                    }
                }
                result = &mut writer => {
                    writer_done = true;
                    match result {
                        Ok(Ok(written)) => warn!("{name}: output closed after {written} bytes"),
                        Ok(Err(e)) => error!("{name}: output write failed: {e}"),
                        Err(e) => error!("{name}: writer task failed: {e}"),
                    }
                    break;
                }
            }
        }

        let last = stats.borrow().clone();
        handle.shutdown().await?;

        // The sink is gone with the worker, so the writer drains and ends.
        if !writer_done {
            match writer.await {
                Ok(Ok(written)) => debug!("{name}: wrote {written} bytes"),
                Ok(Err(e)) => warn!("{name}: output write failed: {e}"),
                Err(e) => warn!("{name}: writer task failed: {e}"),
            }
        }

        log_summary(&name, &last);
        info!("{name}: service stopped");
        Ok(())
    }
}

// ── Internal ─────────────────────────────────────────────────────

async fn open_output(path: Option<&Path>) -> std::io::Result<Output> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::create(path).await?;
            info!("writing PCM to {}", path.display());
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Copy chunks to `output` until the sender side closes.
async fn write_chunks(
    mut output: Output,
    mut chunks: mpsc::Receiver<AudioChunk>,
) -> std::io::Result<u64> {
    let mut written = 0u64;
    while let Some(chunk) = chunks.recv().await {
        output.write_all(&chunk.data).await?;
        output.flush().await?;
        written += chunk.len() as u64;
    }
    output.shutdown().await?;
    Ok(written)
}

fn log_summary(name: &str, stats: &CaptureStats) {
    info!(
        "{name}: {} chunks, {} bytes, {} empty replies, {} connects, {} transport errors",
        stats.chunks_delivered,
        stats.bytes_delivered,
        stats.empty_replies,
        stats.connects,
        stats.transport_errors
    );
}

// ── Tests ────────────────────────────────────────────────────────
