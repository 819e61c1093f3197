//! Shared test doubles: a queue-backed connector and a scripted stream.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use rdpmic_core::codec::{FRAME_SIZE, FrameBytes, decode_frame};
use rdpmic_core::{Connector, ProtocolMessage, SocketAddress};

// ── QueueConnector ───────────────────────────────────────────────

/// Hands out pre-built streams in order; refuses once they run out.
pub struct QueueConnector<S> {
    streams: VecDeque<S>,
    pub attempts: usize,
}

impl<S> QueueConnector<S> {
    pub fn new(streams: impl IntoIterator<Item = S>) -> Self {
        Self {
            streams: streams.into_iter().collect(),
            attempts: 0,
        }
    }
}

#[async_trait]
impl<S> Connector for QueueConnector<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Stream = S;

    async fn connect(&mut self, _address: &SocketAddress) -> io::Result<S> {
        self.attempts += 1;
        self.streams
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionRefused))
    }
}

pub fn test_address() -> SocketAddress {
    SocketAddress::resolve(Some("/tmp/.xrdp-test"), Some("audio_in"), None)
}

// ── ScriptedStream ───────────────────────────────────────────────

#[derive(Default)]
struct Script {
    written: Vec<u8>,
    rejected: Vec<u8>,
    to_read: VecDeque<u8>,
    first_write_limit: Option<usize>,
    fail_writes: bool,
    write_calls: usize,
}

/// In-memory stream that records writes and serves pre-loaded reads.
///
/// Reads past the loaded data return end of stream.
pub struct ScriptedStream {
    script: Arc<Mutex<Script>>,
}

/// Test-side view of a [`ScriptedStream`].
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedStream {
    pub fn new() -> (Self, ScriptHandle) {
        let script = Arc::new(Mutex::new(Script::default()));
        (
            Self {
                script: Arc::clone(&script),
            },
            ScriptHandle { script },
        )
    }
}

impl ScriptHandle {
    /// Queue bytes for the bridge to read.
    pub fn push_read(&self, bytes: &[u8]) {
        self.script.lock().unwrap().to_read.extend(bytes);
    }

    /// Queue a length reply followed by `len` payload bytes of `fill`.
    pub fn push_reply(&self, len: u16, fill: u8) {
        self.push_read(&len.to_le_bytes());
        self.push_read(&vec![fill; len as usize]);
    }

    /// Accept at most `limit` bytes on the next write call.
    pub fn limit_first_write(&self, limit: usize) {
        self.script.lock().unwrap().first_write_limit = Some(limit);
    }

    /// Make every further write fail with `BrokenPipe`.
    pub fn fail_writes(&self) {
        self.script.lock().unwrap().fail_writes = true;
    }

    pub fn written(&self) -> Vec<u8> {
        self.script.lock().unwrap().written.clone()
    }

    pub fn rejected(&self) -> Vec<u8> {
        self.script.lock().unwrap().rejected.clone()
    }

    pub fn write_calls(&self) -> usize {
        self.script.lock().unwrap().write_calls
    }

    /// Decode the accepted bytes as a sequence of control frames.
    pub fn frames(&self) -> Vec<ProtocolMessage> {
        decode_all(&self.written())
    }

    /// Decode the refused bytes as a sequence of control frames.
    pub fn rejected_frames(&self) -> Vec<ProtocolMessage> {
        decode_all(&self.rejected())
    }
}

pub fn decode_all(bytes: &[u8]) -> Vec<ProtocolMessage> {
    assert_eq!(bytes.len() % FRAME_SIZE, 0, "partial frame on the wire");
    bytes
        .chunks(FRAME_SIZE)
        .map(|chunk| {
            let frame: FrameBytes = chunk.try_into().unwrap();
            decode_frame(&frame).unwrap()
        })
        .collect()
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut script = self.script.lock().unwrap();
        script.write_calls += 1;
        if script.fail_writes {
            script.rejected.extend_from_slice(buf);
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        let n = match script.first_write_limit.take() {
            Some(limit) => limit.min(buf.len()),
            None => buf.len(),
        };
        script.written.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut script = self.script.lock().unwrap();
        let n = buf.remaining().min(script.to_read.len());
        let bytes: Vec<u8> = script.to_read.drain(..n).collect();
        buf.put_slice(&bytes);
        Poll::Ready(Ok(()))
    }
}
