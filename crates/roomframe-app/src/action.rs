//! Side effects requested by the room controller.
//!
//! [`RoomViewAction`] values are produced by [`crate::RoomView`] and executed
//! by the runtime: store-bound ones through the [`crate::Bridge`], the rest by
//! the driver or the dispatch bus.

use roomframe_core::{Dispatch, JoinOptions, RoomId, SearchRequest, SettingsChanges};

use crate::{CompletionCandidate, SearchId};

/// Actions produced by the room controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomViewAction {
    /// Observable state changed; redraw.
    Render,

    /// Preview the room without joining.
    Peek {
        /// Room ID or alias from the mount options.
        address: RoomId,
    },

    /// Stop any running preview.
    StopPeeking,

    /// Find out whether the user must choose a display name before joining.
    CheckDisplayName,

    /// Ask the user to choose a display name. Answered with
    /// [`crate::Intent::ChooseDisplayName`].
    PromptDisplayName,

    /// Save the user's display name.
    SetDisplayName {
        /// Chosen name.
        name: String,
    },

    /// Join the room.
    Join {
        /// Room ID or alias to join.
        address: RoomId,
        /// Third-party invite parameters.
        options: JoinOptions,
    },

    /// Leave the room. Used to reject invites.
    Leave {
        /// Room to leave.
        room_id: RoomId,
    },

    /// Forget a left room.
    Forget {
        /// Room to forget.
        room_id: RoomId,
    },

    /// Issue the first page of a search.
    Search {
        /// Session the response belongs to.
        search_id: SearchId,
        /// Query and scope filter.
        request: SearchRequest,
    },

    /// Fetch older results for a search.
    PaginateSearch {
        /// Session the response belongs to.
        search_id: SearchId,
        /// Query and scope filter.
        request: SearchRequest,
        /// Cursor returned by the previous page.
        next_batch: String,
    },

    /// Save edited room settings.
    SaveSettings {
        /// Room to update.
        room_id: RoomId,
        /// Items to change.
        changes: SettingsChanges,
    },

    /// Re-queue every unsent event.
    ResendUnsent {
        /// Room with unsent events.
        room_id: RoomId,
    },

    /// Drop every unsent event.
    CancelUnsent {
        /// Room with unsent events.
        room_id: RoomId,
    },

    /// Publish on the dispatch bus.
    Dispatch(Dispatch),

    /// Show a dismissible notification.
    Notify(Notification),

    /// Replace the composer's completion candidates.
    SetCompletions(Vec<CompletionCandidate>),

    /// Tint the UI with the room's colour scheme.
    ApplyTint {
        /// Primary colour (CSS colour string).
        primary: Option<String>,
        /// Secondary colour (CSS colour string).
        secondary: Option<String>,
    },

    /// Scroll the timeline to the newest event.
    JumpToLiveTimeline,

    /// Scroll the timeline to the read marker.
    JumpToReadMarker,

    /// Move the read marker to the newest event.
    ForgetReadMarker,

    /// Reset the search results panel scroll position.
    ResetSearchScroll,
}

impl RoomViewAction {
    /// Whether the action needs the session store.
    pub fn is_store_bound(&self) -> bool {
        matches!(
            self,
            Self::Peek { .. }
                | Self::StopPeeking
                | Self::CheckDisplayName
                | Self::SetDisplayName { .. }
                | Self::Join { .. }
                | Self::Leave { .. }
                | Self::Forget { .. }
                | Self::Search { .. }
                | Self::PaginateSearch { .. }
                | Self::SaveSettings { .. }
                | Self::ResendUnsent { .. }
                | Self::CancelUnsent { .. }
        )
    }
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A plain error dialog.
    Error,
    /// The operation needs a registered account; offer to register.
    RegisterRequired,
}

/// A dismissible notification with a title and description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub kind: NotificationKind,
    /// Dialog title.
    pub title: String,
    /// Dialog body.
    pub description: String,
}

impl Notification {
    /// A plain error notification.
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Error, title: title.into(), description: description.into() }
    }

    /// A register-required prompt.
    pub fn register_required(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::RegisterRequired,
            title: title.into(),
            description: description.into(),
        }
    }
}
