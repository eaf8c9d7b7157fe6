//! Error types for the HTTP adapter

use sitechat_application::GatewayError;
use thiserror::Error;

/// Result type alias for HTTP adapter operations
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Errors that can occur when talking to the sitechat backend over HTTP
#[derive(Error, Debug)]
pub enum HttpClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<HttpClientError> for GatewayError {
    fn from(err: HttpClientError) -> Self {
        match err {
            HttpClientError::Request(e) if e.is_connect() || e.is_timeout() => {
                GatewayError::ConnectionError(e.to_string())
            }
            HttpClientError::Request(e) => GatewayError::RequestFailed(e.to_string()),
            HttpClientError::Status { status, message } => {
                GatewayError::HttpStatus { status, message }
            }
            HttpClientError::Parse(e) => GatewayError::InvalidResponse(e.to_string()),
            other => GatewayError::RequestFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_http_status() {
        let err: GatewayError = HttpClientError::Status {
            status: 401,
            message: "Unauthorized".to_string(),
        }
        .into();
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_parse_error_maps_to_invalid_response() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: GatewayError = HttpClientError::Parse(parse).into();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }
}
