//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create [`ServerConfig`] values without going
//! through the process environment.

use std::path::PathBuf;

use sockserve_config::{ServerConfig, TransportKind};

/// Fluent builder for [`ServerConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .unix_socket("/tmp/test.sock")
///     .environment("staging")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: ServerConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    pub fn tcp(mut self, port: u16) -> Self {
        self.config.transport = TransportKind::Tcp { port };
        self
    }

    /// TCP on a port picked by the OS at bind time.
    pub fn ephemeral_tcp(self) -> Self {
        self.tcp(0)
    }

    pub fn unix_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.transport = TransportKind::UnixSocket { path: path.into() };
        self
    }

    pub fn environment(mut self, label: &str) -> Self {
        self.config.environment_label = label.to_string();
        self
    }

    pub fn version(mut self, label: &str) -> Self {
        self.config.version_label = label.to_string();
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
