//! Provider error types.

use thiserror::Error;

/// Errors from collaborator backends. Converted into `anyhow::Error` at the
/// trait boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model or route was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The backend answered 2xx with a body we could not use.
    #[error("invalid response from {source_name}: {reason}")]
    InvalidResponse { source_name: String, reason: String },
}

impl ProviderError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout_secs)
        } else {
            ProviderError::NetworkError(err.to_string())
        }
    }

    /// Map a non-success HTTP response to an error. `what` names the model
    /// or route for 404s.
    pub(crate) async fn from_response(response: reqwest::Response, what: &str) -> Self {
        let status = response.status().as_u16();
        match status {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(5)
                    * 1000;
                ProviderError::RateLimited {
                    retry_after_ms: retry_after,
                }
            }
            401 => ProviderError::AuthenticationFailed(response.text().await.unwrap_or_default()),
            404 => ProviderError::ModelNotFound(what.to_string()),
            _ => ProviderError::ApiError {
                status,
                message: response.text().await.unwrap_or_default(),
            },
        }
    }
}
