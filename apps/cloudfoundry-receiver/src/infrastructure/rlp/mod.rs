//! RLP Gateway Adapter
//!
//! Streams loggregator v2 envelopes from the Cloud Foundry Reverse Log Proxy
//! gateway over server-sent events.

/// Reconnection policy with exponential backoff.
pub mod reconnect;

/// Incremental `text/event-stream` decoder.
pub mod sse;

/// Stream factory and envelope stream.
pub mod stream;

pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use sse::{SseDecoder, SseEvent};
pub use stream::{BATCH_BUFFER, RlpEnvelopeStream, RlpGatewayStreamFactory};
