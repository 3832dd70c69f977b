//! Error types for the room controller and its runtime.
//!
//! [`ViewError`] is returned when an intent cannot be honoured in the current
//! state. Late completions are not errors: they are classified with a
//! [`DiscardReason`], logged, and dropped.

use roomframe_core::SessionError;
use thiserror::Error;

/// Errors returned by [`crate::RoomView`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// The intent is not valid in the current access state.
    #[error("invalid state transition: cannot {operation} from {state}")]
    InvalidState {
        /// Access state when the intent arrived.
        state: &'static str,
        /// Intent that was attempted.
        operation: &'static str,
    },

    /// The intent needs a materialized room and there is none.
    #[error("cannot {operation}: room is not loaded")]
    NoRoom {
        /// Intent that was attempted.
        operation: &'static str,
    },

    /// The view has been unmounted.
    #[error("room view has been torn down")]
    TornDown,

    /// Previewing the room failed for a reason other than access policy.
    #[error("failed to peek room: {0}")]
    PeekFailed(SessionError),
}

impl ViewError {
    /// Returns true if the runtime must stop driving this view.
    ///
    /// Rejected intents leave the view usable; a failed peek does not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PeekFailed(_))
    }
}

/// Why a completion or notification was dropped without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Superseded by a newer request (e.g. a newer search).
    Stale,
    /// Arrived after the view was unmounted.
    TornDown,
}

/// Errors that stop a [`crate::Runtime`].
#[derive(Error, Debug)]
pub enum RuntimeError<E: std::error::Error + 'static> {
    /// The driver failed.
    #[error("driver error: {0}")]
    Driver(#[source] E),

    /// The view hit an unrecoverable error.
    #[error(transparent)]
    View(#[from] ViewError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_peek_failure_is_fatal() {
        assert!(ViewError::PeekFailed(SessionError::Transport("reset".into())).is_fatal());
        assert!(!ViewError::TornDown.is_fatal());
        assert!(!ViewError::NoRoom { operation: "forget" }.is_fatal());
    }

    #[test]
    fn invalid_state_names_operation() {
        let err = ViewError::InvalidState { state: "Joined", operation: "join" };
        assert_eq!(err.to_string(), "invalid state transition: cannot join from Joined");
    }
}
