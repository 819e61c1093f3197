//! # rdpmic-source: Remote Microphone Source
//!
//! Runs one capture bridge against the xrdp audio-input socket and writes
//! the PCM it receives to a file or stdout.
//!
//! ## Signals
//!
//! - `SIGUSR1`: suspend capture (the remote device is stopped).
//! - `SIGUSR2`: resume capture.
//! - Ctrl-C: stop the remote device, close the socket and exit.

pub mod config;
pub mod service;
