//! Sample format description and byte/time conversion.
//!
//! The pacing loop turns elapsed wall-clock time into a byte count. It must
//! round exactly like the consumer does, so conversions work in whole frames
//! (one sample for every channel) and truncate toward zero.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RdpMicError;

/// Highest channel count accepted.
pub const CHANNELS_MAX: u8 = 32;

/// Highest sample rate accepted.
pub const RATE_MAX: u32 = 384_000;

const MICROS_PER_SEC: u128 = 1_000_000;

// ── SampleFormat ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    #[serde(rename = "u8")]
    U8,
    #[serde(rename = "alaw")]
    ALaw,
    #[serde(rename = "ulaw")]
    ULaw,
    #[serde(rename = "s16le")]
    S16Le,
    #[serde(rename = "s16be")]
    S16Be,
    #[serde(rename = "float32le")]
    Float32Le,
    #[serde(rename = "float32be")]
    Float32Be,
    #[serde(rename = "s32le")]
    S32Le,
    #[serde(rename = "s32be")]
    S32Be,
    #[serde(rename = "s24le")]
    S24Le,
    #[serde(rename = "s24be")]
    S24Be,
    #[serde(rename = "s24-32le")]
    S24In32Le,
    #[serde(rename = "s24-32be")]
    S24In32Be,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 | Self::ALaw | Self::ULaw => 1,
            Self::S16Le | Self::S16Be => 2,
            Self::S24Le | Self::S24Be => 3,
            Self::Float32Le
            | Self::Float32Be
            | Self::S32Le
            | Self::S32Be
            | Self::S24In32Le
            | Self::S24In32Be => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::ALaw => "alaw",
            Self::ULaw => "ulaw",
            Self::S16Le => "s16le",
            Self::S16Be => "s16be",
            Self::Float32Le => "float32le",
            Self::Float32Be => "float32be",
            Self::S32Le => "s32le",
            Self::S32Be => "s32be",
            Self::S24Le => "s24le",
            Self::S24Be => "s24be",
            Self::S24In32Le => "s24-32le",
            Self::S24In32Be => "s24-32be",
        }
    }
}

impl FromStr for SampleFormat {
    type Err = RdpMicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "u8" => Self::U8,
            "alaw" | "a-law" => Self::ALaw,
            "ulaw" | "mulaw" | "u-law" => Self::ULaw,
            "s16le" => Self::S16Le,
            "s16be" => Self::S16Be,
            "float32le" | "f32le" => Self::Float32Le,
            "float32be" | "f32be" => Self::Float32Be,
            "s32le" => Self::S32Le,
            "s32be" => Self::S32Be,
            "s24le" => Self::S24Le,
            "s24be" => Self::S24Be,
            "s24-32le" => Self::S24In32Le,
            "s24-32be" => Self::S24In32Be,
            other => {
                return Err(RdpMicError::InvalidSampleSpec(format!(
                    "unknown sample format '{other}'"
                )));
            }
        };
        Ok(format)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── SampleSpec ───────────────────────────────────────────────────

/// Format, channel count and rate of the PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSpec {
    pub format: SampleFormat,
    pub channels: u8,
    pub rate: u32,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            format: SampleFormat::S16Le,
            channels: 2,
            rate: 44_100,
        }
    }
}

impl SampleSpec {
    /// Build and validate a spec.
    pub fn new(format: SampleFormat, channels: u8, rate: u32) -> Result<Self, RdpMicError> {
        let spec = Self {
            format,
            channels,
            rate,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), RdpMicError> {
        if self.channels == 0 || self.channels > CHANNELS_MAX {
            return Err(RdpMicError::InvalidSampleSpec(format!(
                "channel count {} outside 1..={CHANNELS_MAX}",
                self.channels
            )));
        }
        if self.rate == 0 || self.rate > RATE_MAX {
            return Err(RdpMicError::InvalidSampleSpec(format!(
                "sample rate {} outside 1..={RATE_MAX}",
                self.rate
            )));
        }
        Ok(())
    }

    /// Bytes in one frame: channels × bytes-per-sample.
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }

    /// Bytes of audio covering `duration`, in whole frames, truncated.
    pub fn bytes_for_duration(&self, duration: Duration) -> usize {
        let frames = duration.as_micros() * self.rate as u128 / MICROS_PER_SEC;
        usize::try_from(frames)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.frame_size())
    }

    /// Playback time of `bytes`, ignoring any trailing partial frame.
    pub fn duration_for_bytes(&self, bytes: usize) -> Duration {
        let frames = (bytes / self.frame_size()) as u128;
        let micros = frames * MICROS_PER_SEC / self.rate as u128;
        Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for SampleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}ch {}Hz", self.format, self.channels, self.rate)
    }
}
