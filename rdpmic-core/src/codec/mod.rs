//! Byte-level framing for the capture channel.
//!
//! ## Wire format
//!
//! **Control frame** (bridge → peer, 11 bytes, little-endian):
//! ```text
//! reserved:   [u8; 4]  (0)
//! marker:     u8       (always 11)
//! reserved:   [u8; 3]  (0)
//! opcode:     u8       (1 = Start, 2 = Stop, 3 = Request)
//! parameter:  u16      (byte cap for Request, 0 otherwise)
//! ```
//!
//! **Data reply** (peer → bridge):
//! ```text
//! length:     u16      (0 = nothing available, no payload follows)
//! payload:    [u8]     (exactly `length` bytes of raw PCM)
//! ```
//!
//! The free functions are pure. [`PeerCodec`] is the serving-side
//! `tokio_util` codec: it decodes control frames and encodes replies.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::RdpMicError;
use crate::message::{DataReply, Opcode, ProtocolMessage};

// ── Constants ────────────────────────────────────────────────────

/// Size of every control frame.
pub const FRAME_SIZE: usize = 11;

/// Literal value of byte 4. A protocol constant, not a computed length.
pub const FRAME_LENGTH_MARKER: u8 = 11;

/// Size of the length prefix of a data reply.
pub const REPLY_HEADER_SIZE: usize = 2;

const MARKER_OFFSET: usize = 4;
const OPCODE_OFFSET: usize = 8;
const PARAMETER_OFFSET: usize = 9;

pub type FrameBytes = [u8; FRAME_SIZE];

// ── Pure encode / decode ─────────────────────────────────────────

/// Serialize a control message into its fixed 11-byte frame.
pub fn encode(msg: ProtocolMessage) -> FrameBytes {
    let mut frame: FrameBytes = [0; FRAME_SIZE];
    frame[MARKER_OFFSET] = FRAME_LENGTH_MARKER;
    frame[OPCODE_OFFSET] = msg.opcode() as u8;
    frame[PARAMETER_OFFSET..FRAME_SIZE].copy_from_slice(&msg.parameter().to_le_bytes());
    frame
}

/// Parse a control frame. Reserved bytes are ignored.
pub fn decode_frame(frame: &FrameBytes) -> Result<ProtocolMessage, RdpMicError> {
    if frame[MARKER_OFFSET] != FRAME_LENGTH_MARKER {
        return Err(RdpMicError::InvalidFrame("frame length marker is not 11"));
    }
    let opcode = Opcode::try_from(frame[OPCODE_OFFSET])?;
    let parameter = u16::from_le_bytes([frame[PARAMETER_OFFSET], frame[PARAMETER_OFFSET + 1]]);
    Ok(ProtocolMessage::from_parts(opcode, parameter))
}

/// Number of payload bytes the peer will send after this prefix.
pub fn decode_length_reply(bytes: [u8; REPLY_HEADER_SIZE]) -> u16 {
    u16::from_le_bytes(bytes)
}

pub fn encode_length_reply(available: u16) -> [u8; REPLY_HEADER_SIZE] {
    available.to_le_bytes()
}

// ── PeerCodec ────────────────────────────────────────────────────

/// Codec for the serving end of the channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeerCodec;

impl tokio_util::codec::Decoder for PeerCodec {
    type Item = ProtocolMessage;
    type Error = RdpMicError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_SIZE {
            src.reserve(FRAME_SIZE - src.len());
            return Ok(None);
        }
        let mut frame: FrameBytes = [0; FRAME_SIZE];
        frame.copy_from_slice(&src[..FRAME_SIZE]);
        src.advance(FRAME_SIZE);
        decode_frame(&frame).map(Some)
    }
}

impl tokio_util::codec::Encoder<DataReply> for PeerCodec {
    type Error = RdpMicError;

    fn encode(&mut self, item: DataReply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(REPLY_HEADER_SIZE + item.payload().len());
        dst.put_u16_le(item.available_bytes());
        dst.extend_from_slice(item.payload());
        Ok(())
    }
}
