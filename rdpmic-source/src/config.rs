//! Configuration for the microphone source service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rdpmic_core::address::ENV_DISPLAY;
use rdpmic_core::capture::{DEFAULT_LATENCY, SchedulerConfig};
use rdpmic_core::{RdpMicError, SampleFormat, SampleSpec, SocketAddress};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Sample format and source identity.
    pub audio: AudioConfig,
    /// Pacing and I/O limits.
    pub capture: CaptureConfig,
    /// Where the peer's socket lives.
    pub socket: SocketConfig,
    /// Where delivered PCM goes.
    pub output: OutputConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Sample format and source identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample format name, e.g. "s16le", "float32le", "s24-32le".
    pub format: String,
    pub channels: u8,
    /// Sample rate in Hz.
    pub rate: u32,
    pub source_name: String,
    pub description: String,
}

/// Pacing and I/O limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Tick interval in milliseconds (minimum 1).
    pub latency_time_ms: u64,
    /// Per-operation socket timeout in milliseconds. 0 disables it.
    pub io_timeout_ms: u64,
}

/// Socket location overrides.
///
/// A key that is present, even as an empty string, hides the matching
/// environment variable. Empty then means the built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Directory holding the socket (`$XRDP_SOCKET_PATH`).
    pub path: Option<String>,
    /// Socket file name (`$XRDP_PULSE_SOURCE_SOCKET`).
    pub name: Option<String>,
    /// X display string used for the default name (`$DISPLAY`).
    pub display: Option<String>,
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File receiving raw PCM. If empty, writes to stdout.
    pub file: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs to stderr.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for AudioConfig {
    fn default() -> Self {
        let spec = SampleSpec::default();
        Self {
            format: spec.format.name().into(),
            channels: spec.channels,
            rate: spec.rate,
            source_name: "xrdp-source".into(),
            description: "remote audio input".into(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            latency_time_ms: DEFAULT_LATENCY.as_millis() as u64,
            io_timeout_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

/// How a config file load went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// No readable file; defaults are in use.
    Missing,
    /// The file did not parse; defaults are in use.
    Invalid(String),
}

impl LoadOutcome {
    pub fn log(&self, path: &Path) {
        match self {
            Self::Loaded => tracing::info!("loaded config from {}", path.display()),
            Self::Missing => tracing::info!("no config at {}; using defaults", path.display()),
            Self::Invalid(e) => {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display())
            }
        }
    }
}

impl SourceConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        let (config, outcome) = Self::load_reporting(path);
        outcome.log(path);
        config
    }

    /// Like [`load`](Self::load), but hands back what happened instead of
    /// logging it, for callers that load before logging is set up.
    pub fn load_reporting(path: &Path) -> (Self, LoadOutcome) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, LoadOutcome::Loaded),
                Err(e) => (Self::default(), LoadOutcome::Invalid(e.to_string())),
            },
            Err(_) => (Self::default(), LoadOutcome::Missing),
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// The configured sample spec. Bad values are fatal at startup.
    pub fn sample_spec(&self) -> Result<SampleSpec, RdpMicError> {
        let format: SampleFormat = self.audio.format.parse()?;
        SampleSpec::new(format, self.audio.channels, self.audio.rate)
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.capture.latency_time_ms)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        (self.capture.io_timeout_ms > 0).then(|| Duration::from_millis(self.capture.io_timeout_ms))
    }

    /// Resolve the peer's socket against the process environment.
    pub fn socket_address(&self) -> SocketAddress {
        self.socket_address_with(|key| std::env::var(key).ok())
    }

    /// Like [`socket_address`](Self::socket_address) with environment
    /// values supplied by `lookup`.
    pub fn socket_address_with<F>(&self, lookup: F) -> SocketAddress
    where
        F: Fn(&str) -> Option<String>,
    {
        SocketAddress::resolve_with(
            self.socket.path.as_deref(),
            self.socket.name.as_deref(),
            |key| match &self.socket.display {
                Some(display) if key == ENV_DISPLAY => Some(display.clone()),
                _ => lookup(key),
            },
        )
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        (!self.output.file.is_empty()).then(|| PathBuf::from(&self.output.file))
    }

    /// Convert audio and capture settings into a `SchedulerConfig`.
    pub fn to_scheduler_config(&self) -> Result<SchedulerConfig, RdpMicError> {
        if self.audio.source_name.trim().is_empty() {
            return Err(RdpMicError::InvalidConfig("source_name is empty".into()));
        }
        Ok(SchedulerConfig {
            sample_spec: self.sample_spec()?,
            latency: self.latency(),
            source_name: self.audio.source_name.clone(),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
