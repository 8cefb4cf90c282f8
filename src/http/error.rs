//! Centralized classification of API failures by status code.

use reqwest::StatusCode;

/// Failure of an API request, keyed on what callers and the user-facing
/// logger need to distinguish.
#[derive(Debug, PartialEq)]
pub enum ApiError {
    /// HTTP 401: the bearer token is missing, expired or revoked.
    SessionExpired,
    /// HTTP 403: authenticated but not allowed.
    AccessDenied,
    /// HTTP 5xx.
    ServerError(u16),
    /// The request hit the configured timeout.
    Timeout,
    /// Any other unexpected status.
    UnexpectedStatus(u16),
    /// Connection-level failure before any status was received.
    Transport(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::SessionExpired => {
                write!(f, "Your session timed out. Please sign in again.")
            }
            ApiError::AccessDenied => write!(f, "Access denied"),
            ApiError::ServerError(code) => {
                write!(f, "Internal server error (HTTP {})", code)
            }
            ApiError::Timeout => write!(f, "Request timed out"),
            ApiError::UnexpectedStatus(code) => {
                write!(f, "Unexpected HTTP {} response", code)
            }
            ApiError::Transport(msg) => write!(f, "Request failed: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Maps a non-success status code to the error the dispatcher reports for it.
pub fn classify_status(status: StatusCode) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::SessionExpired,
        StatusCode::FORBIDDEN => ApiError::AccessDenied,
        s if s.is_server_error() => ApiError::ServerError(s.as_u16()),
        s => ApiError::UnexpectedStatus(s.as_u16()),
    }
}

/// Maps a send failure to an [`ApiError`].
pub fn classify(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        return ApiError::Timeout;
    }
    match error.status() {
        Some(status) => classify_status(status),
        None => ApiError::Transport(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_unauthorized() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            ApiError::SessionExpired
        );
    }

    #[test]
    fn test_classify_status_forbidden() {
        assert_eq!(classify_status(StatusCode::FORBIDDEN), ApiError::AccessDenied);
    }

    #[test]
    fn test_classify_status_server_errors() {
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::ServerError(500)
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            ApiError::ServerError(502)
        );
    }

    #[test]
    fn test_classify_status_other() {
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST),
            ApiError::UnexpectedStatus(400)
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            ApiError::UnexpectedStatus(404)
        );
    }

    #[test]
    fn test_display_messages() {
        assert!(ApiError::SessionExpired.to_string().contains("session timed out"));
        assert!(ApiError::AccessDenied.to_string().contains("Access denied"));
        assert!(ApiError::ServerError(500).to_string().contains("500"));
        assert!(ApiError::Timeout.to_string().contains("timed out"));
        assert!(ApiError::UnexpectedStatus(418).to_string().contains("418"));
    }

    #[tokio::test]
    async fn test_classify_transport_error() {
        // Nothing listens on this port
        let client = reqwest::Client::new();
        let err = client
            .get("http://127.0.0.1:1/never")
            .send()
            .await
            .unwrap_err();

        match classify(err) {
            ApiError::Transport(msg) => assert!(!msg.is_empty()),
            other => panic!("expected Transport, got {:?}", other),
        }
    }
}
