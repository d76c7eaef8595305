//! Configuration for the client runtime
//!
//! Controls where the client connects, how chatty it is, and how long
//! `update()` may wait for network activity.

use std::time::Duration;

use psmove_transport::{TransportConfig, DEFAULT_EVENT_CAPACITY};

use crate::error::{ClientError, Result};
use crate::logging::LogSeverity;

/// Longest `update()` is allowed to wait for the first arrival of a cycle
const MAX_UPDATE_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for [`ClientApi`](crate::ClientApi)
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Service host name or address
    /// Default: "localhost"
    pub host: String,

    /// Service TCP port
    /// Default: 9512
    pub port: u16,

    /// Minimum severity of log output
    /// Default: Info
    pub log_level: LogSeverity,

    /// Upper bound on establishing the connection
    /// Default: 2 seconds
    pub connect_timeout: Duration,

    /// How long `update()` may block waiting for the first arrival of a cycle
    /// Default: zero (never blocks)
    pub update_timeout: Duration,

    /// Arrivals buffered between the network thread and `update()`, and the
    /// most a single `update()` processes
    /// Default: 1024
    pub arrival_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            host: transport.host,
            port: transport.port,
            log_level: LogSeverity::Info,
            connect_timeout: transport.connect_timeout,
            update_timeout: Duration::ZERO,
            arrival_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Read overrides from `PSMOVE_HOST`, `PSMOVE_PORT` and `PSMOVE_LOG_LEVEL`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("PSMOVE_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("PSMOVE_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ClientError::Configuration(format!("Invalid PSMOVE_PORT: {}", port)))?;
        }

        if let Ok(level) = std::env::var("PSMOVE_LOG_LEVEL") {
            config.log_level = level.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        self.transport_config()
            .validate()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        if self.update_timeout > MAX_UPDATE_TIMEOUT {
            return Err(ClientError::Configuration(format!(
                "Update timeout must not exceed {:?}",
                MAX_UPDATE_TIMEOUT
            )));
        }

        if self.arrival_capacity == 0 {
            return Err(ClientError::Configuration(
                "Arrival capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Connection settings handed to the TCP transport
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(self.host.clone(), self.port)
            .with_connect_timeout(self.connect_timeout)
    }

    pub fn with_log_level(mut self, level: LogSeverity) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_update_timeout(mut self, timeout: Duration) -> Self {
        self.update_timeout = timeout;
        self
    }

    pub fn with_arrival_capacity(mut self, capacity: usize) -> Self {
        self.arrival_capacity = capacity;
        self
    }
}
