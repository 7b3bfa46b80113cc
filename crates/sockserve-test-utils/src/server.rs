//! Running-server fixture.
//!
//! [`TestServer`] binds a real listening endpoint, serves it on a background
//! task, and records every request in a [`MemoryRequestSink`]. Unix socket
//! servers live in an owned temp directory that is deleted when the fixture
//! is dropped, guaranteeing cleanup even on panic.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sockserve_config::ServerConfig;
use sockserve_core::{
    Daemon, DaemonError, EndpointAddr, EndpointClient, MemoryRequestSink, ServerPhase,
    ServiceIdentity, ShutdownHandle, ShutdownTrigger,
};
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::TestConfigBuilder;

/// How long [`TestServer::stop`] waits for the serve task.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A server running on a background task.
pub struct TestServer {
    pub addr: EndpointAddr,
    pub requests: Arc<MemoryRequestSink>,
    shutdown: ShutdownHandle,
    phase: watch::Receiver<ServerPhase>,
    task: JoinHandle<Result<ShutdownTrigger, DaemonError>>,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Serve on `server.sock` inside a fresh temp directory.
    pub async fn unix(identity: ServiceIdentity) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config = TestConfigBuilder::new()
            .unix_socket(temp_dir.path().join("server.sock"))
            .build();
        Self::start_in(config, identity, temp_dir).await
    }

    /// Serve on an ephemeral loopback TCP port.
    pub async fn tcp(identity: ServiceIdentity) -> Self {
        Self::start(TestConfigBuilder::new().ephemeral_tcp().build(), identity).await
    }

    /// Serve with an explicit configuration.
    pub async fn start(config: ServerConfig, identity: ServiceIdentity) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        Self::start_in(config, identity, temp_dir).await
    }

    async fn start_in(config: ServerConfig, identity: ServiceIdentity, temp_dir: TempDir) -> Self {
        let requests = Arc::new(MemoryRequestSink::new(256));
        let daemon = Daemon::new(config, identity).with_request_sink(requests.clone());
        let shutdown = daemon.shutdown_handle();
        let mut phase = daemon.phase();

        let endpoint = daemon.bind().await.expect("failed to bind test server");
        let addr = endpoint
            .local_addr()
            .expect("failed to read bound address");
        debug!(%addr, "test server bound");

        let task = tokio::spawn(async move {
            daemon
                .serve(endpoint, std::future::pending::<ShutdownTrigger>())
                .await
        });

        phase
            .wait_for(|p| *p >= ServerPhase::Serving)
            .await
            .expect("test server exited before serving");

        Self {
            addr,
            requests,
            shutdown,
            phase,
            task,
            _temp_dir: temp_dir,
        }
    }

    /// A client pointed at this server.
    pub fn client(&self) -> EndpointClient {
        EndpointClient::new(self.addr.clone())
    }

    /// The socket file, for Unix socket servers.
    pub fn socket_path(&self) -> Option<&Path> {
        match &self.addr {
            EndpointAddr::Unix(path) => Some(path),
            EndpointAddr::Tcp(_) => None,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ServerPhase {
        *self.phase.borrow()
    }

    /// Request a stop and wait for the serve task to finish.
    pub async fn stop(self) -> Result<ShutdownTrigger, DaemonError> {
        self.shutdown.request_stop();
        tokio::time::timeout(STOP_TIMEOUT, self.task)
            .await
            .expect("test server did not stop in time")
            .expect("test server task panicked")
    }
}
