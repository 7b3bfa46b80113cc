//! HTTP surface — the static router, its response types, and a client.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐  TCP 127.0.0.1:<port>  ┌────────────────┐
//! │ EndpointClient │────────── or ─────────▶│ Request server │
//! │  curl, probes  │  Unix socket (0777)    │  (axum router) │
//! └────────────────┘  HTTP/1.1 + JSON       └────────────────┘
//! ```

pub mod client;
pub mod server;
pub mod types;

pub use client::{ClientError, ClientResponse, EndpointClient};
pub use server::{AppState, ServiceIdentity, router, serve};
pub use types::*;
