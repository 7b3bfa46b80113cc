#![deny(unsafe_code)]

//! Environment-derived configuration for sockserve.
//!
//! The server reads its configuration once at startup from a handful of
//! environment variables and never touches it again. [`ServerConfig`] is the
//! resolved, immutable result; [`select_transport`] holds the rule that picks
//! the listening transport from the ordered [`TransportCandidate`] list.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

/// TCP port used when neither `PORT` nor `SOCKET_PATH` is configured.
pub const DEFAULT_TCP_PORT: u16 = 8080;

/// Display value reported for unset labels.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Environment variable selecting TCP mode.
pub const PORT_VAR: &str = "PORT";
/// Environment variable selecting Unix socket mode.
pub const SOCKET_PATH_VAR: &str = "SOCKET_PATH";
/// Environment variable holding the environment display label.
pub const APP_ENV_VAR: &str = "APP_ENV";
/// Environment variable holding the version display label.
pub const APP_VERSION_VAR: &str = "APP_VERSION";

/// Errors that can occur while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a port number between 1 and 65535, got {value:?}")]
    InvalidPort { var: &'static str, value: String },
}

/// The listening transport chosen at startup.
///
/// Exactly one of port or socket path exists per variant, so the two can
/// never both be active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    /// TCP on loopback, port taken from `PORT`.
    Tcp { port: u16 },
    /// Unix domain socket at the path taken from `SOCKET_PATH`.
    UnixSocket { path: PathBuf },
    /// Nothing configured: TCP on loopback, [`DEFAULT_TCP_PORT`].
    DefaultTcp,
}

impl TransportKind {
    /// The TCP port to bind, if this is a TCP transport.
    pub fn tcp_port(&self) -> Option<u16> {
        match self {
            TransportKind::Tcp { port } => Some(*port),
            TransportKind::DefaultTcp => Some(DEFAULT_TCP_PORT),
            TransportKind::UnixSocket { .. } => None,
        }
    }

    /// The socket path to bind, if this is a Unix socket transport.
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            TransportKind::UnixSocket { path } => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp { port } => write!(f, "tcp 127.0.0.1:{port}"),
            TransportKind::UnixSocket { path } => write!(f, "unix {}", path.display()),
            TransportKind::DefaultTcp => write!(f, "tcp 127.0.0.1:{DEFAULT_TCP_PORT} (default)"),
        }
    }
}

/// A configured source of a listening transport.
///
/// Candidates are consulted in [`TransportCandidate::PRECEDENCE`] order and
/// the first one present wins. TCP comes first, so `SOCKET_PATH` is ignored
/// whenever `PORT` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCandidate {
    Port,
    SocketPath,
}

impl TransportCandidate {
    /// First-match order used by [`select_transport`].
    pub const PRECEDENCE: [TransportCandidate; 2] =
        [TransportCandidate::Port, TransportCandidate::SocketPath];

    /// The environment variable this candidate is read from.
    pub fn env_var(self) -> &'static str {
        match self {
            TransportCandidate::Port => PORT_VAR,
            TransportCandidate::SocketPath => SOCKET_PATH_VAR,
        }
    }

    fn resolve(self, value: String) -> Result<TransportKind, ConfigError> {
        match self {
            TransportCandidate::Port => {
                let port = value
                    .trim()
                    .parse::<u16>()
                    .ok()
                    .filter(|port| *port != 0)
                    .ok_or_else(|| ConfigError::InvalidPort {
                        var: PORT_VAR,
                        value: value.clone(),
                    })?;
                Ok(TransportKind::Tcp { port })
            }
            TransportCandidate::SocketPath => Ok(TransportKind::UnixSocket {
                path: PathBuf::from(value),
            }),
        }
    }
}

/// Pick the listening transport from the ordered candidate list.
///
/// Empty values count as unset. A present but malformed candidate is an
/// error; it does not fall through to the next one.
pub fn select_transport<F>(lookup: F) -> Result<TransportKind, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for candidate in TransportCandidate::PRECEDENCE {
        let Some(value) = lookup(candidate.env_var()).filter(|v| !v.is_empty()) else {
            continue;
        };
        debug!(var = candidate.env_var(), "transport candidate matched");
        return candidate.resolve(value);
    }
    debug!("no transport configured, using default TCP port");
    Ok(TransportKind::DefaultTcp)
}

/// Server configuration, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listening transport.
    pub transport: TransportKind,

    /// Display label from `APP_ENV`.
    pub environment_label: String,

    /// Display label from `APP_VERSION`.
    pub version_label: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::DefaultTcp,
            environment_label: UNKNOWN_LABEL.to_string(),
            version_label: UNKNOWN_LABEL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport = select_transport(&lookup)?;
        Ok(Self {
            transport,
            environment_label: lookup(APP_ENV_VAR).unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            version_label: lookup(APP_VERSION_VAR).unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        })
    }
}
