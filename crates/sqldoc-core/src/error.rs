//! Error types for sqldoc

use thiserror::Error;

/// Core error type shared by connections and drivers
#[derive(Error, Debug)]
pub enum SqldocError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SqldocError {
    /// Whether the error means the server could not be reached or refused the login
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, SqldocError::Connection(_))
    }
}

/// Result type alias for sqldoc operations
pub type Result<T> = std::result::Result<T, SqldocError>;
