//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use axum::http::StatusCode;
use research_assistant_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the HTTP client used for the table store.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status a handler answers with when this error reaches it.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Http(_) | Self::Port(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_http_statuses() {
        let missing = ApiError::from(PortError::NotFound("result_1".to_string()));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let down = ApiError::from(PortError::Unexpected("connection refused".to_string()));
        assert_eq!(down.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            down.to_string(),
            "Service Port Error: An unexpected error occurred: connection refused"
        );

        let internal = ApiError::Internal("boom".to_string());
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
