//! Token Provider Port (Driven Port)
//!
//! Interface for obtaining bearer credentials from the identity provider.

use async_trait::async_trait;

/// Token provider error.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Endpoint URL is unusable.
    #[error("invalid UAA endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// Configured endpoint.
        endpoint: String,
        /// Parser error.
        reason: String,
    },

    /// Transport failure.
    #[error("UAA request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Identity provider refused the credentials.
    #[error("UAA rejected token request with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Response body was not a token.
    #[error("invalid UAA token response: {0}")]
    InvalidResponse(String),
}

/// Port for obtaining an `Authorization` header value.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a bearer credential, e.g. `"bearer eyJ..."`.
    async fn provide_token(&self) -> Result<String, TokenError>;

    /// Discard any cached credential after the gateway rejected it.
    async fn invalidate(&self) {}
}
