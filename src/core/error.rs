/// dbquery Error Module
///
/// This module defines the error types surfaced by the query executor.
/// Nothing in the library terminates the process: every failure comes
/// back to the caller as a `DbQueryError`.
use thiserror::Error;

/// Error type for all dbquery operations.
///
/// - Establishing a connection (bad credentials, unreachable host, unknown database)
/// - Preparing, binding, executing or fetching a statement
/// - Loading and validating connection settings
#[derive(Error, Debug)]
pub enum DbQueryError {
    /// The connection could not be established or is not open
    #[error("Connection error: {0}")]
    Connection(String),

    /// Prepare, bind, execute or fetch failed (syntax, constraints, type mismatch, lost connection)
    #[error("Statement error: {0}")]
    Statement(String),

    /// Invalid or missing connection settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbQueryError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a statement error with the given message.
    pub fn statement(msg: impl Into<String>) -> Self {
        Self::Statement(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Statement(_) => "Statement Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
            Self::Json(_) => "JSON Error",
        }
    }
}

/// Type alias for Result to use DbQueryError as the error type.
pub type Result<T> = std::result::Result<T, DbQueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let conn_err = DbQueryError::connection("Access denied for user 'app'");
        assert!(conn_err.to_string().contains("Connection error"));
        assert!(conn_err.to_string().contains("Access denied"));

        let stmt_err = DbQueryError::statement("near \"SELEC\": syntax error");
        assert!(stmt_err.to_string().contains("Statement error"));

        let config_err = DbQueryError::config("host must not be empty");
        assert!(config_err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_category() {
        assert_eq!(DbQueryError::connection("x").category(), "Connection Error");
        assert_eq!(DbQueryError::statement("x").category(), "Statement Error");
        assert_eq!(DbQueryError::config("x").category(), "Configuration Error");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DbQueryError = io_err.into();
        match err {
            DbQueryError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: DbQueryError = json_err.into();
        match err {
            DbQueryError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }
    }
}
