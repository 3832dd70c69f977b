//! Core types for the roomframe room session controller.
//!
//! Everything the controller consumes from the outside world lives here: the
//! session-store contract (room lookup, peek/join/leave/forget, search), the
//! read-only [`Room`](room::Room) view of a materialized room, the process-wide
//! [`DispatchBus`](dispatch::DispatchBus), the clock abstraction, and the error
//! taxonomy surfaced to users.
//!
//! No controller logic lives in this crate. See `roomframe-app` for the state
//! machines built on top of these contracts.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod env;
pub mod error;
pub mod ids;
pub mod room;
pub mod session;

pub use dispatch::{Dispatch, DispatchAction, DispatchBus, DispatcherRef};
pub use env::{Environment, SystemEnv};
pub use error::{ErrorClass, SessionError};
pub use ids::{EventId, RoomId, UserId};
pub use room::{AccountDataEvent, Member, Membership, Room, RoomHandle, TimelineEvent};
pub use session::{
    JoinOptions, SearchFilter, SearchHit, SearchRequest, SearchResponse, SessionNotification,
    SessionStore, SettingsChanges, SettingsItem, SettingsResult,
};
