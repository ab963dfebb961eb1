//! Receiver Lifecycle State
//!
//! Explicit state machine for a receiver instance:
//!
//! ```text
//! Created ──start──► Starting ──poll loop entered──► Running
//!    ▲                  │                               │
//!    └──build failure───┘                          shutdown
//!                                                       ▼
//!              Stopped ◄────task exit──────────── Stopping
//! ```
//!
//! A task that exits on its own (fatal error, graceful cancellation from the
//! parent scope) moves straight to `Stopped`.

use serde::Serialize;

/// Lifecycle state of a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverState {
    /// Constructed; collaborators not built yet.
    #[default]
    Created,
    /// Background task launched; token and stream not yet acquired.
    Starting,
    /// Poll loop running.
    Running,
    /// Shutdown requested; background task still draining.
    Stopping,
    /// Background task exited.
    Stopped,
}

impl ReceiverState {
    /// Whether `start` may be called in this state.
    #[must_use]
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Created | Self::Stopped)
    }

    /// Whether a background task may currently be alive.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }

    /// Get the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_allowed_only_when_idle() {
        assert!(ReceiverState::Created.can_start());
        assert!(ReceiverState::Stopped.can_start());
        assert!(!ReceiverState::Starting.can_start());
        assert!(!ReceiverState::Running.can_start());
        assert!(!ReceiverState::Stopping.can_start());
    }

    #[test]
    fn active_states() {
        assert!(!ReceiverState::Created.is_active());
        assert!(ReceiverState::Starting.is_active());
        assert!(ReceiverState::Running.is_active());
        assert!(ReceiverState::Stopping.is_active());
        assert!(!ReceiverState::Stopped.is_active());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ReceiverState::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(ReceiverState::Stopping.to_string(), "stopping");
    }
}
