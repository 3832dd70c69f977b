//! Error types reported by the session store.
//!
//! The store's failures are strongly typed so the controller can translate
//! them into distinct user prompts (register-required versus
//! cannot-rejoin-empty-room) instead of echoing raw server messages.

use thiserror::Error;

/// Server error code for guests refused by the room's guest-access policy.
pub const ERRCODE_GUEST_ACCESS_FORBIDDEN: &str = "M_GUEST_ACCESS_FORBIDDEN";

/// Server error code for a generic permission failure.
pub const ERRCODE_FORBIDDEN: &str = "M_FORBIDDEN";

/// Errors returned by [`crate::SessionStore`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The room does not allow guest access.
    #[error("guest access forbidden")]
    GuestAccessForbidden,

    /// The server refused the request.
    #[error("{message}")]
    Forbidden {
        /// Server-provided description.
        message: String,
    },

    /// No server participating in the room could be reached.
    ///
    /// Reported when re-joining a room every other member has left.
    #[error("No known servers")]
    NoKnownServers,

    /// Any other server-side failure.
    #[error("{message}")]
    Server {
        /// Server error code, if the response carried one.
        errcode: Option<String>,
        /// Server-provided description.
        message: String,
    },

    /// Network failure before a server response was received.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Coarse classification used to pick a user-facing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Guest or permission refusal on join/peek.
    AccessDenied,
    /// The room exists but cannot be joined (e.g. empty room rejoin).
    Unjoinable,
    /// Generic network or server failure.
    Transient,
}

impl SessionError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::GuestAccessForbidden | Self::Forbidden { .. } => ErrorClass::AccessDenied,
            Self::NoKnownServers => ErrorClass::Unjoinable,
            Self::Server { .. } | Self::Transport(_) => ErrorClass::Transient,
        }
    }

    /// Server error code, if known.
    pub fn errcode(&self) -> Option<&str> {
        match self {
            Self::GuestAccessForbidden => Some(ERRCODE_GUEST_ACCESS_FORBIDDEN),
            Self::Forbidden { .. } => Some(ERRCODE_FORBIDDEN),
            Self::Server { errcode, .. } => errcode.as_deref(),
            Self::NoKnownServers | Self::Transport(_) => None,
        }
    }
}
