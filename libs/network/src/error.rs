//! Transport Error Types
//!
//! Errors from controllers, connections and the offline tools. Transport
//! faults stay local to one connection or one reconnect attempt; data and
//! format faults are passed through from the lower crates.

use agent_config::ConfigError;
use codec::ProtocolError;
use std::net::SocketAddr;
use thiserror::Error;
use types::DataError;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Generic I/O errors (files, sockets)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },

    /// Connection management errors
    #[error("Connection error: {message} (remote: {remote_addr:?})")]
    Connection {
        message: String,
        remote_addr: Option<SocketAddr>,
        source: Option<std::io::Error>,
    },

    /// Malformed or unexpected records on a stream
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        source: Option<ProtocolError>,
    },

    /// Structurally incompatible execution data
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Transport timeout errors
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Operation on a controller that has not been started
    #[error("Controller '{controller}' is not running")]
    NotRunning { controller: &'static str },

    /// Management registry conflicts
    #[error("Registration error: {name}: {message}")]
    Registration { name: String, message: String },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>, remote_addr: Option<SocketAddr>) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        source: std::io::Error,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: Some(source),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            source: None,
        }
    }

    /// Create a protocol error with source
    pub fn protocol_with_source(message: impl Into<String>, source: ProtocolError) -> Self {
        Self::Protocol {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a registration error
    pub fn registration(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Registration {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Check if a later attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Io { .. } => true,
            TransportError::Connection { .. } => true,
            TransportError::Timeout { .. } => true,
            TransportError::Protocol { .. } => false,
            TransportError::Data(_) => false,
            TransportError::Configuration { .. } => false,
            TransportError::NotRunning { .. } => false,
            TransportError::Registration { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Io { .. } => "io",
            TransportError::Connection { .. } => "connection",
            TransportError::Protocol { .. } => "protocol",
            TransportError::Data(_) => "data",
            TransportError::Configuration { .. } => "configuration",
            TransportError::Timeout { .. } => "timeout",
            TransportError::NotRunning { .. } => "not_running",
            TransportError::Registration { .. } => "registration",
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        TransportError::Io {
            message: error.to_string(),
            source: error,
        }
    }
}

/// Incompatible data inside a stream surfaces as a data error
impl From<ProtocolError> for TransportError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::IncompatibleData(data) => TransportError::Data(data),
            other => TransportError::protocol_with_source(other.to_string(), other),
        }
    }
}

impl From<ConfigError> for TransportError {
    fn from(error: ConfigError) -> Self {
        let field = match &error {
            ConfigError::UnknownOption { key } | ConfigError::InvalidValue { key, .. } => {
                Some(key.clone())
            }
            _ => None,
        };
        TransportError::Configuration {
            message: error.to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use types::ClassId;

    #[test]
    fn test_error_construction() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 6300);
        let err = TransportError::connection("refused", Some(addr));
        assert_eq!(err.category(), "connection");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("127.0.0.1:6300"));

        let err = TransportError::NotRunning { controller: "tcpclient" };
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Controller 'tcpclient' is not running");
    }

    #[test]
    fn test_protocol_conversion() {
        let err: TransportError = ProtocolError::missing_header(0x11).into();
        assert_eq!(err.category(), "protocol");

        let mismatch = DataError::structural_mismatch(ClassId::new(1), "A", 2, 3);
        let err: TransportError = ProtocolError::IncompatibleData(mismatch.clone()).into();
        assert!(matches!(err, TransportError::Data(ref d) if *d == mismatch));
    }

    #[test]
    fn test_config_conversion() {
        let err: TransportError = ConfigError::UnknownOption {
            key: "bogus".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            TransportError::Configuration { field: Some(ref f), .. } if f == "bogus"
        ));
    }
}
