//! Downstream delivery of captured audio.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use crate::error::RdpMicError;

/// A buffer of raw PCM bytes and the tick at which it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub data: Bytes,
    pub timestamp: Instant,
}

impl AudioChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Consumer of delivered chunks, called from the capture worker.
///
/// Implementations must not block: the worker's next tick waits on them.
pub trait ChunkSink: Send {
    fn deliver_chunk(&mut self, chunk: AudioChunk) -> Result<(), RdpMicError>;
}

impl<F> ChunkSink for F
where
    F: FnMut(AudioChunk) -> Result<(), RdpMicError> + Send,
{
    fn deliver_chunk(&mut self, chunk: AudioChunk) -> Result<(), RdpMicError> {
        self(chunk)
    }
}

// ── ChannelSink ──────────────────────────────────────────────────

/// Forwards chunks over a bounded mpsc channel.
///
/// A full channel rejects the chunk rather than stalling the worker.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<AudioChunk>,
}

impl ChannelSink {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AudioChunk>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ChunkSink for ChannelSink {
    fn deliver_chunk(&mut self, chunk: AudioChunk) -> Result<(), RdpMicError> {
        self.tx.try_send(chunk).map_err(|e| match e {
            TrySendError::Full(chunk) => RdpMicError::SinkFull { bytes: chunk.len() },
            TrySendError::Closed(_) => RdpMicError::ChannelClosed,
        })
    }
}
