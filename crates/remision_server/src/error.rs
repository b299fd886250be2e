//! Error types for the API server.

use remision_core::CoreError;
use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned to API clients.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed body or invalid input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The referenced document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No route for this path.
    #[error("no such endpoint: {0}")]
    UnknownEndpoint(String),

    /// The endpoint exists but not for this method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Method used.
        method: String,
        /// Path requested.
        path: String,
    },

    /// Request body exceeds the configured limit.
    #[error("request body of {size} bytes exceeds {limit}")]
    PayloadTooLarge {
        /// Body size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Concurrent writers kept winning, or the ledger needs reconciling.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An external workflow did not finish in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::NotFound(_) | ApiError::UnknownEndpoint(_) => 404,
            ApiError::MethodNotAllowed { .. } => 405,
            ApiError::Conflict(_) => 409,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::Timeout(_) => 504,
            ApiError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    /// The JSON body sent with the status, `{"error": "..."}`.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => ApiError::InvalidRequest(message),
            CoreError::NotFound { number } => {
                ApiError::NotFound(format!("remision {number} not found"))
            }
            err @ (CoreError::Conflict { .. }
            | CoreError::ConcurrencyExhausted { .. }
            | CoreError::Inconsistent { .. }
            | CoreError::OrphanedNumber { .. }) => ApiError::Conflict(err.to_string()),
            err @ CoreError::Timeout { .. } => ApiError::Timeout(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remision_core::SequenceNumber;

    #[test]
    fn core_errors_map_to_status() {
        let cases = [
            (CoreError::validation("bad"), 400),
            (
                CoreError::NotFound {
                    number: SequenceNumber::new(3).unwrap(),
                },
                404,
            ),
            (CoreError::ConcurrencyExhausted { attempts: 5 }, 409),
            (CoreError::conflict("historial.json"), 409),
            (
                CoreError::Timeout {
                    last_seen: SequenceNumber::ZERO,
                    attempts: 3,
                },
                504,
            ),
            (CoreError::Cancelled, 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn error_classification() {
        assert!(ApiError::InvalidRequest("bad".into()).is_client_error());
        assert!(ApiError::Internal("oops".into()).is_server_error());
        assert!(!ApiError::InvalidRequest("bad".into()).is_server_error());
    }

    #[test]
    fn body_shape() {
        let body = ApiError::NotFound("remision 00000003 not found".into()).to_body();
        assert_eq!(body["error"], "not found: remision 00000003 not found");
    }
}
