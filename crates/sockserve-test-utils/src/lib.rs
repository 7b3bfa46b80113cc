#![deny(unsafe_code)]

//! Shared test utilities for the sockserve workspace.
//!
//! Provides config builders, a running-server fixture, and tracing helpers
//! so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! sockserve-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod server;
pub mod tracing_setup;

pub use config::TestConfigBuilder;
pub use server::TestServer;
