//! Rendezvous socket path resolution.
//!
//! The peer listens on a UNIX socket whose path is picked, in order, from
//! explicit configuration, the environment, or the X display number:
//!
//! ```text
//! dir  = explicit dir  | $XRDP_SOCKET_PATH        | /tmp/.xrdp
//! name = explicit name | $XRDP_PULSE_SOURCE_SOCKET | xrdp_chansrv_audio_out_socket_<display>
//! path = dir + "/" + name
//! ```
//!
//! Resolution is lexical. Nothing checks that the socket exists.

use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_SOCKET_DIR: &str = "/tmp/.xrdp";
pub const SOCKET_NAME_PREFIX: &str = "xrdp_chansrv_audio_out_socket_";

pub const ENV_SOCKET_DIR: &str = "XRDP_SOCKET_PATH";
pub const ENV_SOCKET_NAME: &str = "XRDP_PULSE_SOURCE_SOCKET";
pub const ENV_DISPLAY: &str = "DISPLAY";

/// Display number from an X display string `[host][:display[.screen]]`.
///
/// Characters after a `:` (up to the next `.`) form the display segment;
/// its leading decimal digits are the result. Anything malformed is 0.
pub fn display_number(display: Option<&str>) -> u32 {
    let Some(display) = display else {
        return 0;
    };

    let mut segment = String::new();
    let mut in_display = false;
    for ch in display.chars() {
        match ch {
            ':' => in_display = true,
            '.' => in_display = false,
            c if in_display => segment.push(c),
            _ => {}
        }
    }

    let digits: String = segment
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ── SocketAddress ────────────────────────────────────────────────

/// The resolved path of the peer's socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketAddress {
    path: PathBuf,
}

impl SocketAddress {
    /// Pure resolution from already-looked-up values.
    pub fn resolve(
        explicit_dir: Option<&str>,
        explicit_name: Option<&str>,
        display: Option<&str>,
    ) -> Self {
        let dir = non_empty(explicit_dir).unwrap_or(DEFAULT_SOCKET_DIR);
        let path = match non_empty(explicit_name) {
            Some(name) => format!("{dir}/{name}"),
            None => format!("{dir}/{SOCKET_NAME_PREFIX}{}", display_number(display)),
        };
        Self {
            path: PathBuf::from(path),
        }
    }

    /// Resolve with environment fallbacks supplied by `lookup`.
    ///
    /// A present explicit value shadows the environment even when it is
    /// empty, in which case it falls through to the default.
    pub fn resolve_with<F>(explicit_dir: Option<&str>, explicit_name: Option<&str>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_dir = lookup(ENV_SOCKET_DIR);
        let env_name = lookup(ENV_SOCKET_NAME);
        let display = lookup(ENV_DISPLAY);

        let dir = explicit_dir.or(env_dir.as_deref());
        let name = explicit_name.or(env_name.as_deref());
        Self::resolve(dir, name, display.as_deref())
    }

    /// Resolve against the process environment.
    pub fn from_env(explicit_dir: Option<&str>, explicit_name: Option<&str>) -> Self {
        Self::resolve_with(explicit_dir, explicit_name, |key| std::env::var(key).ok())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl From<PathBuf> for SocketAddress {
    fn from(path: PathBuf) -> Self {
        Self { path }
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn display_number_from_host_display_screen() {
        assert_eq!(display_number(Some("host:10.0")), 10);
        assert_eq!(display_number(Some(":3")), 3);
        assert_eq!(display_number(Some("localhost:12")), 12);
        assert_eq!(display_number(Some("unix:7.2")), 7);
    }

    #[test]
    fn display_number_degrades_to_zero() {
        assert_eq!(display_number(None), 0);
        assert_eq!(display_number(Some("")), 0);
        assert_eq!(display_number(Some("localhost")), 0);
        assert_eq!(display_number(Some("host:abc.0")), 0);
        assert_eq!(display_number(Some("host:.1")), 0);
        assert_eq!(display_number(Some("host:-4")), 0);
    }

    #[test]
    fn display_number_takes_leading_digits() {
        assert_eq!(display_number(Some(":12abc")), 12);
        assert_eq!(display_number(Some(": 5")), 5);
    }

    #[test]
    fn resolve_defaults() {
        let addr = SocketAddress::resolve(None, None, None);
        assert_eq!(
            addr.path(),
            Path::new("/tmp/.xrdp/xrdp_chansrv_audio_out_socket_0")
        );

        let addr = SocketAddress::resolve(Some(""), Some(""), Some(":11"));
        assert_eq!(
            addr.path(),
            Path::new("/tmp/.xrdp/xrdp_chansrv_audio_out_socket_11")
        );
    }

    #[test]
    fn resolve_explicit_values() {
        let addr = SocketAddress::resolve(Some("/run/xrdp/1000"), Some("mic"), Some(":11"));
        assert_eq!(addr.to_string(), "/run/xrdp/1000/mic");
    }

    #[test]
    fn resolve_with_environment() {
        let env: HashMap<&str, &str> = [
            (ENV_SOCKET_DIR, "/var/run/xrdp/sockdir"),
            (ENV_DISPLAY, "host:4.0"),
        ]
        .into_iter()
        .collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let addr = SocketAddress::resolve_with(None, None, lookup);
        assert_eq!(
            addr.path(),
            Path::new("/var/run/xrdp/sockdir/xrdp_chansrv_audio_out_socket_4")
        );

        let addr = SocketAddress::resolve_with(Some("/srv"), Some("source"), lookup);
        assert_eq!(addr.path(), Path::new("/srv/source"));
    }
}
