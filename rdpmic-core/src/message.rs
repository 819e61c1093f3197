//! Protocol message types.
//!
//! Uses proper enums with `TryFrom`, no panics on unknown values.

use std::fmt;

use bytes::Bytes;

use crate::error::RdpMicError;

// ── Opcode ───────────────────────────────────────────────────────

/// Operation code carried in byte 8 of every control frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Open the remote capture device.
    Start = 0x01,
    /// Close the remote capture device.
    Stop = 0x02,
    /// Ask for up to N bytes of captured audio.
    Request = 0x03,
}

impl TryFrom<u8> for Opcode {
    type Error = RdpMicError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Opcode::Start),
            0x02 => Ok(Opcode::Stop),
            0x03 => Ok(Opcode::Request),
            _ => Err(RdpMicError::UnknownVariant {
                type_name: "Opcode",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Start => write!(f, "Start"),
            Opcode::Stop => write!(f, "Stop"),
            Opcode::Request => write!(f, "Request"),
        }
    }
}

// ── ProtocolMessage ──────────────────────────────────────────────

/// A control message sent from the bridge to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMessage {
    Start,
    Stop,
    Request {
        /// Upper bound on the payload the peer may return.
        max_bytes: u16,
    },
}

impl ProtocolMessage {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Start => Opcode::Start,
            Self::Stop => Opcode::Stop,
            Self::Request { .. } => Opcode::Request,
        }
    }

    /// The 16-bit parameter field: the byte cap for `Request`, zero otherwise.
    pub fn parameter(&self) -> u16 {
        match self {
            Self::Request { max_bytes } => *max_bytes,
            Self::Start | Self::Stop => 0,
        }
    }

    /// Rebuild a message from its opcode and parameter fields.
    pub fn from_parts(opcode: Opcode, parameter: u16) -> Self {
        match opcode {
            Opcode::Start => Self::Start,
            Opcode::Stop => Self::Stop,
            Opcode::Request => Self::Request {
                max_bytes: parameter,
            },
        }
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request { max_bytes } => write!(f, "Request({max_bytes})"),
            other => write!(f, "{}", other.opcode()),
        }
    }
}

// ── DataReply ────────────────────────────────────────────────────

/// The peer's answer to a `Request`: a length prefix and that many bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataReply {
    payload: Bytes,
}

impl DataReply {
    /// Build a reply. Fails if the payload does not fit the 16-bit length.
    pub fn new(payload: impl Into<Bytes>) -> Result<Self, RdpMicError> {
        let payload = payload.into();
        if payload.len() > u16::MAX as usize {
            return Err(RdpMicError::InvalidFrame("reply payload exceeds 65535 bytes"));
        }
        Ok(Self { payload })
    }

    /// A reply announcing that no data is available yet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn available_bytes(&self) -> u16 {
        self.payload.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
