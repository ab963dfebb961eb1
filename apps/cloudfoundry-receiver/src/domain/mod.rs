//! Domain Layer - Core receiver types and batch assembly.
//!
//! This layer contains the envelope model, the per-cycle metrics document
//! and the receiver lifecycle state. Nothing here performs I/O.

/// Loggregator envelope types.
pub mod envelope;

/// Per-cycle metrics document assembly.
pub mod metrics;

/// Receiver lifecycle state machine.
pub mod lifecycle;
