#![deny(unsafe_code)]

//! sockserve core runtime.
//!
//! Binds one listening transport (TCP on loopback or a Unix domain socket),
//! serves a small static JSON API on it, and tears everything down again on
//! SIGINT, SIGTERM, or an explicit stop request. The binaries in
//! `sockserve-apps` are thin wrappers around [`Daemon`].

/// HTTP router, response types, and endpoint client.
pub mod api;
/// Process lifecycle: bind, serve, shut down, clean up.
pub mod daemon;
/// Request log sinks.
pub mod logging;
/// Transport selection and listening endpoints.
pub mod transport;

pub use api::{EndpointClient, ServiceIdentity};
pub use daemon::{Daemon, DaemonError, ServerPhase, ShutdownHandle, ShutdownTrigger};
pub use logging::{MemoryRequestSink, RequestRecord, RequestSink, TracingRequestSink};
pub use transport::{BindError, EndpointAddr, ListeningEndpoint};
