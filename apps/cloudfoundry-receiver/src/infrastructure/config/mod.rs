//! Configuration Module
//!
//! Configuration loading and collaborator wiring for the receiver service.

mod container;
mod settings;

pub use container::HttpCollaborators;
pub use settings::{
    ConfigError, DEFAULT_SHARD_ID, ExporterSettings, HttpClientSettings, ReceiverConfig,
    ReconnectSettings, RlpGatewaySettings, ServerSettings, ServiceConfig, UaaSettings,
};
