//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use axum::http::StatusCode;
use stories_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Maps a port failure to the HTTP status a client should react to.
///
/// Transient remote failures become 503 so the client can offer a retry.
pub fn port_error_status(error: &PortError) -> StatusCode {
    match error {
        PortError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Persistence(_) | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert_eq!(
            port_error_status(&PortError::Transient("timeout".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            port_error_status(&PortError::NotFound("story 9".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            port_error_status(&PortError::Persistence("disk".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
