//! Application Ports (Driven)
//!
//! Ports define the receiver's boundary with the systems around it:
//! - **Upstream**: token provider and envelope stream factory
//! - **Downstream**: metrics consumer
//! - **Ambient**: host escalation, observability hook, envelope conversion

mod collaborator_factory_port;
mod converter_port;
mod envelope_stream_port;
mod host_port;
mod metrics_consumer_port;
mod observer_port;
mod token_provider_port;

pub use collaborator_factory_port::CollaboratorFactory;
pub use converter_port::EnvelopeConverter;
pub use envelope_stream_port::{EnvelopeStream, StreamError, StreamFactory};
pub use host_port::Host;
pub use metrics_consumer_port::{ConsumerError, MetricsConsumer};
pub use observer_port::{MetricsOp, NoOpObserver, ReceiverObserver};
pub use token_provider_port::{TokenError, TokenProvider};
