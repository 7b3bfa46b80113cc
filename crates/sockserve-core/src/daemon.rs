//! Server process lifecycle — bind, serve, shut down, clean up.
//!
//! A [`Daemon`] moves through [`ServerPhase`] exactly once:
//! `Unstarted → Bound → Serving → ShuttingDown → Stopped`. Shutdown is
//! triggered by SIGINT, SIGTERM, or [`ShutdownHandle::request_stop`]; none of
//! these is an error. The listening endpoint and its socket file are released
//! on every exit path before the phase reaches `Stopped`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info};

use sockserve_config::ServerConfig;

use crate::api::{self, AppState, ServiceIdentity};
use crate::logging::{RequestSink, TracingRequestSink};
use crate::transport::{self, BindError, ListeningEndpoint};

/// Lifecycle phase of a [`Daemon`]. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerPhase {
    Unstarted,
    Bound,
    Serving,
    ShuttingDown,
    Stopped,
}

/// What ended the serve loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// SIGINT (Ctrl-C).
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// [`ShutdownHandle::request_stop`].
    Requested,
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownTrigger::Interrupt => "SIGINT",
            ShutdownTrigger::Terminate => "SIGTERM",
            ShutdownTrigger::Requested => "stop request",
        };
        f.write_str(name)
    }
}

/// Requests a graceful stop of a running [`Daemon`].
///
/// A request made before serving starts is remembered and honoured as soon
/// as the serve loop begins.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn request_stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("server loop failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// One server process: configuration, identity, and lifecycle state.
pub struct Daemon {
    config: ServerConfig,
    identity: ServiceIdentity,
    requests: Arc<dyn RequestSink>,
    stop_tx: Arc<watch::Sender<bool>>,
    phase_tx: watch::Sender<ServerPhase>,
}

impl Daemon {
    /// Create a daemon that logs requests through `tracing`.
    pub fn new(config: ServerConfig, identity: ServiceIdentity) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (phase_tx, _) = watch::channel(ServerPhase::Unstarted);
        Self {
            config,
            identity,
            requests: Arc::new(TracingRequestSink),
            stop_tx: Arc::new(stop_tx),
            phase_tx,
        }
    }

    /// Replace the request log sink.
    pub fn with_request_sink(mut self, requests: Arc<dyn RequestSink>) -> Self {
        self.requests = requests;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn identity(&self) -> ServiceIdentity {
        self.identity
    }

    /// Handle for requesting a graceful stop from elsewhere.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Request a graceful stop.
    pub fn shutdown(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Subscribe to lifecycle phase changes.
    pub fn phase(&self) -> watch::Receiver<ServerPhase> {
        self.phase_tx.subscribe()
    }

    /// Bind, then serve until SIGINT, SIGTERM, or a stop request.
    ///
    /// Signal handlers are installed before binding so that a signal arriving
    /// right after the socket appears still goes through cleanup.
    pub async fn run(&self) -> Result<ShutdownTrigger, DaemonError> {
        let interrupt = os_signals()?;
        let endpoint = self.bind().await?;
        self.serve(endpoint, interrupt).await
    }

    /// Bind the configured transport.
    pub async fn bind(&self) -> Result<ListeningEndpoint, DaemonError> {
        info!(
            service = self.identity.name,
            transport = %self.config.transport,
            "binding listener"
        );
        let endpoint = transport::bind(&self.config.transport)
            .await
            .inspect_err(|e| error!(service = self.identity.name, error = %e, "bind failed"))?;
        self.advance(ServerPhase::Bound);
        Ok(endpoint)
    }

    /// Serve `endpoint` until `interrupt` resolves or a stop is requested.
    ///
    /// The endpoint is consumed; it is closed, and its socket file removed,
    /// before this returns.
    pub async fn serve<I>(
        &self,
        endpoint: ListeningEndpoint,
        interrupt: I,
    ) -> Result<ShutdownTrigger, DaemonError>
    where
        I: Future<Output = ShutdownTrigger> + Send + 'static,
    {
        let state = Arc::new(AppState::new(
            self.identity,
            &self.config,
            Arc::clone(&self.requests),
        ));
        let app = api::router(state);

        let (trigger_tx, trigger_rx) = oneshot::channel();
        let mut stop_rx = self.stop_tx.subscribe();
        let phase_tx = self.phase_tx.clone();
        let service = self.identity.name;

        let shutdown = async move {
            let trigger = tokio::select! {
                trigger = interrupt => trigger,
                _ = stop_rx.wait_for(|stop| *stop) => ShutdownTrigger::Requested,
            };
            info!(service, %trigger, "shutting down");
            advance(&phase_tx, ServerPhase::ShuttingDown);
            let _ = trigger_tx.send(trigger);
        };

        self.advance(ServerPhase::Bound);
        self.advance(ServerPhase::Serving);
        let result = api::serve(endpoint, app, shutdown).await;

        self.advance(ServerPhase::ShuttingDown);
        self.advance(ServerPhase::Stopped);
        info!(service, "server stopped");

        result.map_err(DaemonError::Serve)?;
        Ok(trigger_rx.await.unwrap_or(ShutdownTrigger::Requested))
    }

    fn advance(&self, next: ServerPhase) {
        advance(&self.phase_tx, next);
    }
}

fn advance(phase_tx: &watch::Sender<ServerPhase>, next: ServerPhase) {
    phase_tx.send_if_modified(|phase| {
        if next > *phase {
            debug!(from = ?*phase, to = ?next, "phase change");
            *phase = next;
            true
        } else {
            false
        }
    });
}

/// Resolves on the first SIGINT or SIGTERM delivered to the process.
pub fn os_signals() -> Result<impl Future<Output = ShutdownTrigger> + Send + 'static, DaemonError>
{
    let mut sigint = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;
    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => ShutdownTrigger::Interrupt,
            _ = sigterm.recv() => ShutdownTrigger::Terminate,
        }
    })
}
