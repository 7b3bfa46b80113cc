//! Transport selector — turns the configured [`TransportKind`] into a bound
//! [`ListeningEndpoint`].
//!
//! TCP endpoints always bind the IPv4 loopback address. Unix socket endpoints
//! clear any stale filesystem entry first, then widen the socket file's mode
//! to `0777` so arbitrary local processes can connect. The socket file is
//! owned by a [`SocketFileGuard`] that unlinks it exactly once, whichever way
//! the endpoint goes out of scope.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, info, warn};

use sockserve_config::{DEFAULT_TCP_PORT, TransportKind};

/// Mode applied to the Unix socket file after binding.
pub const SOCKET_FILE_MODE: u32 = 0o777;

/// Errors raised while preparing a listening endpoint. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("failed to bind TCP listener on {addr}: {source}")]
    Tcp { addr: SocketAddr, source: io::Error },

    #[error("failed to remove stale socket file at {path}: {source}")]
    StaleSocket { path: PathBuf, source: io::Error },

    #[error("failed to bind Unix socket at {path}: {source}")]
    Unix { path: PathBuf, source: io::Error },

    #[error("failed to set permissions on socket file {path}: {source}")]
    Permissions { path: PathBuf, source: io::Error },
}

/// Address of a listening endpoint, as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl EndpointAddr {
    /// The address a server configured with `transport` will listen on.
    pub fn from_transport(transport: &TransportKind) -> Self {
        match transport {
            TransportKind::UnixSocket { path } => EndpointAddr::Unix(path.clone()),
            TransportKind::Tcp { port } => EndpointAddr::Tcp(loopback(*port)),
            TransportKind::DefaultTcp => EndpointAddr::Tcp(loopback(DEFAULT_TCP_PORT)),
        }
    }
}

impl fmt::Display for EndpointAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointAddr::Tcp(addr) => write!(f, "{addr}"),
            EndpointAddr::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
}

/// Owns the filesystem entry backing a Unix socket listener.
///
/// The file is unlinked once: either by [`SocketFileGuard::release`] or,
/// failing that, on drop. An entry that is already gone is not an error.
#[derive(Debug)]
pub struct SocketFileGuard {
    path: PathBuf,
    armed: bool,
}

impl SocketFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Path of the socket file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlink the socket file now. Returns `true` if a file was removed.
    pub fn release(mut self) -> bool {
        self.unlink()
    }

    fn unlink(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = false;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "socket file removed");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to remove socket file");
                false
            }
        }
    }
}

impl Drop for SocketFileGuard {
    fn drop(&mut self) {
        self.unlink();
    }
}

/// A bound, listening handle ready to be served.
#[derive(Debug)]
pub enum ListeningEndpoint {
    Tcp(TcpListener),
    Unix {
        listener: UnixListener,
        socket_file: SocketFileGuard,
    },
}

impl ListeningEndpoint {
    /// The address clients should connect to.
    ///
    /// For TCP this is the actual bound address, so port `0` resolves to the
    /// port the OS picked.
    pub fn local_addr(&self) -> io::Result<EndpointAddr> {
        match self {
            ListeningEndpoint::Tcp(listener) => listener.local_addr().map(EndpointAddr::Tcp),
            ListeningEndpoint::Unix { socket_file, .. } => {
                Ok(EndpointAddr::Unix(socket_file.path().to_path_buf()))
            }
        }
    }
}

/// Bind the listening endpoint described by `transport`.
pub async fn bind(transport: &TransportKind) -> Result<ListeningEndpoint, BindError> {
    match transport {
        TransportKind::UnixSocket { path } => bind_unix(path),
        TransportKind::Tcp { port } => bind_tcp(*port).await,
        TransportKind::DefaultTcp => bind_tcp(DEFAULT_TCP_PORT).await,
    }
}

/// Bind a TCP listener on `127.0.0.1:<port>`.
pub async fn bind_tcp(port: u16) -> Result<ListeningEndpoint, BindError> {
    let addr = loopback(port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BindError::Tcp { addr, source })?;
    let bound = listener.local_addr().unwrap_or(addr);
    info!(addr = %bound, "listening on TCP");
    Ok(ListeningEndpoint::Tcp(listener))
}

/// Bind a Unix socket listener at `path`.
///
/// Must be called from within a tokio runtime.
pub fn bind_unix(path: &Path) -> Result<ListeningEndpoint, BindError> {
    remove_stale_socket(path)?;

    let listener = UnixListener::bind(path).map_err(|source| BindError::Unix {
        path: path.to_path_buf(),
        source,
    })?;
    let socket_file = SocketFileGuard::new(path.to_path_buf());

    // On failure the guard drops here and takes the fresh socket file with it.
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_FILE_MODE)).map_err(
        |source| BindError::Permissions {
            path: path.to_path_buf(),
            source,
        },
    )?;

    info!(
        path = %path.display(),
        mode = %format_args!("{SOCKET_FILE_MODE:o}"),
        "listening on Unix socket"
    );
    Ok(ListeningEndpoint::Unix {
        listener,
        socket_file,
    })
}

fn remove_stale_socket(path: &Path) -> Result<(), BindError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "removed stale socket file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BindError::StaleSocket {
            path: path.to_path_buf(),
            source,
        }),
    }
}
