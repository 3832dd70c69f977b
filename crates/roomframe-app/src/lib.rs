//! Room session state controller for roomframe.
//!
//! Pure state machines and a generic runtime for one room screen, so the
//! same controller code runs against a real session store in production and
//! against a scripted store in deterministic simulation.
//!
//! # Components
//!
//! - [`RoomView`]: room session controller (access, unread, search, settings)
//! - [`RoomAccess`]: peek/invite/join/reject state machine
//! - [`UnreadTracker`]: unread counter and read-marker bar
//! - [`SearchPanel`]: cancellable, paginated search with a stale-response guard
//! - [`CompletionList`]: debounced completion candidates
//! - [`UserActivity`]: throttled activity pulse
//! - [`Bridge`]: executes store-bound actions against a session store
//! - [`Driver`]: trait for platform-specific input and presentation
//! - [`Runtime`]: generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod access;
mod action;
mod bridge;
mod completion;
mod config;
mod debounce;
mod driver;
mod error;
mod event;
mod presence;
mod room_view;
mod runtime;
mod search;
mod timeline;

#[cfg(test)]
mod test_room;

pub use access::{
    AccessError, AccessOperation, Capabilities, JoinPreflight, PeekStatus, PendingJoinRequest,
    RoomAccess, RoomAccessState, RoomPolicy,
};
pub use action::{Notification, NotificationKind, RoomViewAction};
pub use bridge::Bridge;
pub use completion::{CompletionCandidate, CompletionList, DEFAULT_COMPLETION_DEBOUNCE};
pub use config::{
    DEFAULT_COMMANDS, Identity, OutOfBandData, RoomViewConfig, RoomViewOptions, ThirdPartyInvite,
};
pub use debounce::Debouncer;
pub use driver::Driver;
pub use error::{DiscardReason, RuntimeError, ViewError};
pub use event::{Intent, JoinedRoom, RoomViewEvent};
pub use presence::{DEFAULT_ACTIVITY_INTERVAL, UserActivity};
pub use room_view::RoomView;
pub use runtime::Runtime;
pub use search::{SearchId, SearchItem, SearchOutcome, SearchPanel, SearchScope, SearchSession, TopMarker};
pub use timeline::{PanelScrollState, SavedScrollState, UnreadTracker};
