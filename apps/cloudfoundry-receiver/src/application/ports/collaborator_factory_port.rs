//! Collaborator Factory Port
//!
//! Builds the token provider and stream factory from configuration when the
//! receiver starts.

use std::sync::Arc;

use super::{StreamError, StreamFactory, TokenError, TokenProvider};
use crate::infrastructure::config::{RlpGatewaySettings, UaaSettings};

/// Port for constructing upstream collaborators.
pub trait CollaboratorFactory: Send + Sync {
    /// Build the token provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the UAA settings cannot produce a client.
    fn token_provider(&self, settings: &UaaSettings) -> Result<Arc<dyn TokenProvider>, TokenError>;

    /// Build the stream factory.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway settings cannot produce a client.
    fn stream_factory(
        &self,
        settings: &RlpGatewaySettings,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Arc<dyn StreamFactory>, StreamError>;
}
