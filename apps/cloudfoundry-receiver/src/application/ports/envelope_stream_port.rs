//! Envelope Stream Port (Driven Port)
//!
//! Interface for opening a pull-style envelope stream against the gateway.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::TokenError;
use crate::domain::envelope::EnvelopeBatch;

/// Stream creation error.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Endpoint URL is unusable.
    #[error("invalid RLP gateway endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// Configured endpoint.
        endpoint: String,
        /// Parser error.
        reason: String,
    },

    /// No credential available for the connection.
    #[error("token unavailable: {0}")]
    Token(#[from] TokenError),

    /// Transport failure.
    #[error("RLP gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway refused the stream.
    #[error("RLP gateway rejected stream with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Gateway closed the connection.
    #[error("RLP gateway connection closed")]
    ConnectionClosed,

    /// Gateway announced it is going away.
    #[error("RLP gateway sent closing event")]
    GatewayClosing,
}

/// Pull handle over an open envelope stream.
#[async_trait]
pub trait EnvelopeStream: Send {
    /// Pull the next batch.
    ///
    /// Returns an empty batch when nothing arrived (keep polling) and `None`
    /// once the stream has terminated. Implementations must return promptly
    /// once the cancellation token they were created with fires.
    async fn next_batch(&mut self) -> Option<EnvelopeBatch>;
}

/// Port for creating envelope streams.
#[async_trait]
pub trait StreamFactory: Send + Sync {
    /// Open a stream for `shard_id`, bound to `cancel`.
    async fn create_stream(
        &self,
        cancel: CancellationToken,
        shard_id: &str,
    ) -> Result<Box<dyn EnvelopeStream>, StreamError>;
}
