//! Connection settings.

use std::time::Duration;

use crate::error::{Result, TransportError};

/// Where and how to connect to the tracking service
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Service host name or address
    /// Default: "localhost"
    pub host: String,

    /// Service TCP port
    /// Default: 9512
    pub port: u16,

    /// Upper bound on establishing the connection
    /// Default: 2 seconds
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9512,
            connect_timeout: Duration::from_secs(2),
        }
    }
}

impl TransportConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port` string suitable for `TcpStream::connect`
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TransportError::InvalidConfiguration(
                "Host must not be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(TransportError::InvalidConfiguration(
                "Port must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout == Duration::ZERO {
            return Err(TransportError::InvalidConfiguration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
