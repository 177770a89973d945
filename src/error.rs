//! Error handling for the rectifier monitoring service
//!
//! One service-wide error enum with string payloads and helper constructors,
//! so call sites stay terse and errors render uniformly in logs and API
//! responses.

use thiserror::Error;

/// Service error type
#[derive(Error, Debug, Clone)]
pub enum RectSrvError {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input/Output operation errors (register reads, file writes)
    #[error("IO error: {0}")]
    IoError(String),

    /// Protocol-level errors (Modbus exceptions, malformed replies)
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Connection establishment and lifecycle errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Data handling errors (validation, serialization)
    #[error("Data error: {0}")]
    DataError(String),

    /// Journal storage errors
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Operation timeout errors
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the service
pub type Result<T> = std::result::Result<T, RectSrvError>;

impl RectSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        RectSrvError::ConfigError(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        RectSrvError::IoError(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        RectSrvError::ProtocolError(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        RectSrvError::ConnectionError(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        RectSrvError::DataError(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        RectSrvError::StorageError(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        RectSrvError::TimeoutError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        RectSrvError::InternalError(msg.into())
    }

    /// Lifecycle violation: the register layer was used while disconnected
    pub fn not_connected() -> Self {
        RectSrvError::ConnectionError("Modbus client not connected".to_string())
    }
}

impl From<std::io::Error> for RectSrvError {
    fn from(err: std::io::Error) -> Self {
        RectSrvError::IoError(err.to_string())
    }
}

impl From<csv::Error> for RectSrvError {
    fn from(err: csv::Error) -> Self {
        RectSrvError::storage(format!("CSV: {err}"))
    }
}

impl From<serde_json::Error> for RectSrvError {
    fn from(err: serde_json::Error) -> Self {
        RectSrvError::DataError(format!("JSON: {err}"))
    }
}

impl From<figment::Error> for RectSrvError {
    fn from(err: figment::Error) -> Self {
        RectSrvError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RectSrvError::connection("session rejected");
        assert!(error.to_string().contains("Connection error"));
        assert!(error.to_string().contains("session rejected"));
    }

    #[test]
    fn test_csv_errors_map_to_storage() {
        // A ragged row trips the csv crate's record length check
        let mut reader = csv::Reader::from_reader("a,b\n1\n".as_bytes());
        let csv_err = reader
            .records()
            .next()
            .unwrap()
            .expect_err("ragged row should fail");
        match RectSrvError::from(csv_err) {
            RectSrvError::StorageError(msg) => assert!(msg.starts_with("CSV:")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_not_connected_is_connection_error() {
        match RectSrvError::not_connected() {
            RectSrvError::ConnectionError(msg) => assert!(msg.contains("not connected")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
