//! UAA Adapter
//!
//! OAuth2 client-credentials token provider backed by the Cloud Foundry
//! User Account and Authentication server.

mod token_provider;

pub use token_provider::{TOKEN_REFRESH_MARGIN, UaaTokenProvider};
