//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the receiver service and the port interfaces
//! that define how it interacts with external systems.

/// Port interfaces for upstream, downstream and ambient collaborators.
pub mod ports;

/// Application services for the receiver lifecycle.
pub mod services;
