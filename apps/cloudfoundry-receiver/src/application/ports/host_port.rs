//! Host Port (Driven Port)
//!
//! Escalation path for errors the receiver cannot recover from.

use crate::application::services::ReceiverError;

/// Port for reporting fatal receiver errors.
pub trait Host: Send + Sync {
    /// Report a fatal error. Fire-and-forget.
    fn report_fatal_error(&self, error: ReceiverError);
}
