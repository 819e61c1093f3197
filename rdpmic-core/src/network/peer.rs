//! Serving end of the capture channel.
//!
//! The bridge itself only ever plays the client role. `PeerSession` speaks
//! the other side, which is what a capture-device owner (or a test double
//! of one) runs on each accepted socket.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::PeerCodec;
use crate::error::RdpMicError;
use crate::message::{DataReply, ProtocolMessage};

pub struct PeerSession<S> {
    framed: Framed<S, PeerCodec>,
    capturing: bool,
}

impl<S> PeerSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, PeerCodec),
            capturing: false,
        }
    }

    /// Whether the last control frame seen was Start.
    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Next control frame, or `None` once the bridge hangs up.
    pub async fn next_message(&mut self) -> Option<Result<ProtocolMessage, RdpMicError>> {
        let message = self.framed.next().await;
        match &message {
            Some(Ok(ProtocolMessage::Start)) => self.capturing = true,
            Some(Ok(ProtocolMessage::Stop)) => self.capturing = false,
            _ => {}
        }
        message
    }

    pub async fn reply(&mut self, reply: DataReply) -> Result<(), RdpMicError> {
        self.framed.send(reply).await
    }

    /// Answer every Request with `fill(max_bytes)` until the bridge hangs up.
    ///
    /// Requests that arrive before Start are answered with an empty reply.
    pub async fn serve<F>(mut self, mut fill: F) -> Result<(), RdpMicError>
    where
        F: FnMut(u16) -> DataReply,
    {
        while let Some(message) = self.next_message().await {
            match message? {
                ProtocolMessage::Request { max_bytes } => {
                    let reply = if self.capturing {
                        fill(max_bytes)
                    } else {
                        DataReply::empty()
                    };
                    self.reply(reply).await?;
                }
                other => debug!("peer received {other}"),
            }
        }
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.framed.into_inner()
    }
}
