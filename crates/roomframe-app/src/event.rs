//! Inputs to the room controller.
//!
//! Events originate from four sources:
//! - User intents forwarded by the driver.
//! - Session-store change notifications.
//! - Completions of store operations started by earlier actions.
//! - Actions published on the dispatch bus, plus timer ticks.

use roomframe_core::{
    DispatchAction, EventId, RoomHandle, RoomId, SearchResponse, SessionError,
    SessionNotification, SettingsChanges, SettingsResult,
};

use crate::{SearchId, SearchScope};

/// A join call's result, with the room object if the store already has it.
#[derive(Debug, Clone)]
pub struct JoinedRoom {
    /// Room ID the join resolved with.
    pub room_id: RoomId,
    /// Materialized room, looked up right after the call resolved.
    pub room: Option<RoomHandle>,
}

/// Events processed by the room controller.
#[derive(Debug, Clone)]
pub enum RoomViewEvent {
    /// Timer tick. Runs due debounced work.
    Tick,

    /// Something the user did.
    Intent(Intent),

    /// Session store change notification.
    Session(SessionNotification),

    /// Action received from the dispatch bus.
    Dispatched(DispatchAction),

    /// Peek call settled.
    PeekCompleted {
        /// Room object, or why previewing failed.
        result: Result<RoomHandle, SessionError>,
    },

    /// Display name lookup settled.
    DisplayNameChecked {
        /// Whether the user must choose a display name before joining, or
        /// why the profile lookup failed.
        result: Result<bool, SessionError>,
    },

    /// Display name save settled.
    DisplayNameSet {
        /// Outcome.
        result: Result<(), SessionError>,
    },

    /// Join call settled.
    JoinCompleted {
        /// Joined room, or why joining failed.
        result: Result<JoinedRoom, SessionError>,
    },

    /// Leave call for an invite rejection settled.
    RejectCompleted {
        /// Outcome.
        result: Result<(), SessionError>,
    },

    /// Forget call settled.
    ForgetCompleted {
        /// Outcome.
        result: Result<(), SessionError>,
    },

    /// Search or search pagination settled.
    SearchCompleted {
        /// Session the request was issued for.
        search_id: SearchId,
        /// Page of results, or why the search failed.
        result: Result<SearchResponse, SessionError>,
    },

    /// Settings save settled.
    SettingsSaved {
        /// One result per saved item.
        results: Vec<SettingsResult>,
    },

    /// The focused (highlighted) event changed.
    FocusedEventChanged {
        /// New focused event.
        event_id: Option<EventId>,
    },
}

/// User intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Join the room.
    Join,
    /// Answer the display name prompt: the chosen name, or `None` to back out
    /// of the join.
    ChooseDisplayName(Option<String>),
    /// Reject the invite.
    Reject,
    /// Reject a third-party invite (open the room directory instead).
    RejectThirdPartyInvite,
    /// Leave the room.
    Leave,
    /// Forget the room.
    Forget,
    /// Show the search bar.
    OpenSearch,
    /// Run a search.
    Search {
        /// Search term.
        term: String,
        /// Search scope.
        scope: SearchScope,
    },
    /// Hide the search bar.
    CancelSearch,
    /// Load more search results.
    LoadMoreResults {
        /// Load older results.
        backwards: bool,
    },
    /// The search results panel changed size.
    SearchResultsResized,
    /// The timeline scrolled.
    Scrolled {
        /// Viewport shows the newest events.
        at_live_edge: bool,
        /// Read marker offset from the viewport top, if visible to the panel.
        read_marker_offset: Option<i64>,
    },
    /// Jump to the newest event.
    JumpToLiveTimeline,
    /// Jump to the read marker.
    JumpToReadMarker,
    /// Mark everything read.
    ForgetReadMarker,
    /// Open room settings.
    ShowSettings,
    /// Close room settings without saving.
    CancelSettings,
    /// Save room settings.
    SaveSettings(SettingsChanges),
    /// Resend every unsent message.
    ResendUnsent,
    /// Cancel every unsent message.
    CancelUnsent,
    /// Open video fullscreen.
    Fullscreen,
    /// Pointer moved.
    PointerMoved,
    /// Key pressed.
    KeyPressed,
}
