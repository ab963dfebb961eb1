//! Collaborator Wiring
//!
//! Builds the HTTP-backed token provider and stream factory the receiver
//! uses at start.

use std::sync::Arc;

use crate::application::ports::{
    CollaboratorFactory, StreamError, StreamFactory, TokenError, TokenProvider,
};
use crate::infrastructure::config::{RlpGatewaySettings, UaaSettings};
use crate::infrastructure::rlp::RlpGatewayStreamFactory;
use crate::infrastructure::uaa::UaaTokenProvider;

/// Production collaborators: a UAA client-credentials token provider and an
/// RLP gateway stream factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpCollaborators;

impl CollaboratorFactory for HttpCollaborators {
    fn token_provider(&self, settings: &UaaSettings) -> Result<Arc<dyn TokenProvider>, TokenError> {
        Ok(Arc::new(UaaTokenProvider::new(settings)?))
    }

    fn stream_factory(
        &self,
        settings: &RlpGatewaySettings,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Arc<dyn StreamFactory>, StreamError> {
        Ok(Arc::new(RlpGatewayStreamFactory::new(
            settings,
            token_provider,
        )?))
    }
}
