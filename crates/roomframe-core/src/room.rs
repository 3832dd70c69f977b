//! Read-only view of a materialized room.
//!
//! Room objects are owned by the session store and shared with every view
//! that displays them. Controllers hold a [`RoomHandle`] and only ever query
//! it; membership, state events and account data may change underneath as the
//! store syncs.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{EventId, RoomId, UserId};

/// State event type carrying the room's guest-access policy.
pub const GUEST_ACCESS_EVENT: &str = "m.room.guest_access";

/// State event type carrying the room's history-visibility policy.
pub const HISTORY_VISIBILITY_EVENT: &str = "m.room.history_visibility";

/// Room account-data type carrying the user's colour scheme for the room.
pub const COLOR_SCHEME_EVENT: &str = "org.matrix.room.color_scheme";

/// Membership of a user in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// Invited but not yet joined.
    Invite,
    /// Joined.
    Join,
    /// Left, or never joined.
    Leave,
    /// Banned.
    Ban,
    /// Requested to join.
    Knock,
}

/// A room member as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Member's user ID.
    pub user_id: UserId,
    /// Display name, if set.
    pub display_name: Option<String>,
    /// Current membership.
    pub membership: Membership,
}

impl Member {
    /// Create a member with no display name.
    pub fn new(user_id: impl Into<UserId>, membership: Membership) -> Self {
        Self { user_id: user_id.into(), display_name: None, membership }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A timeline event, reduced to what the controller inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    /// Event ID.
    pub event_id: EventId,
    /// Sender of the event.
    pub sender: UserId,
}

/// A room account-data event.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDataEvent {
    /// Event type, e.g. [`COLOR_SCHEME_EVENT`].
    pub event_type: String,
    /// Event content.
    pub content: serde_json::Value,
}

/// Queries a controller may make against a materialized room.
pub trait Room: fmt::Debug + Send + Sync {
    /// The room's canonical ID.
    fn room_id(&self) -> &RoomId;

    /// Human-readable room name, if known.
    fn name(&self) -> Option<String>;

    /// Membership of `user_id`. `None` if the user has no member event.
    fn membership(&self, user_id: &UserId) -> Option<Membership>;

    /// Members whose membership is [`Membership::Join`].
    fn joined_members(&self) -> Vec<Member>;

    /// Content of the current state event with the given type and state key.
    fn state_event(&self, event_type: &str, state_key: &str) -> Option<serde_json::Value>;

    /// Content of the room account-data event with the given type.
    fn account_data(&self, event_type: &str) -> Option<serde_json::Value>;

    /// Number of locally queued events that failed to send.
    fn unsent_event_count(&self) -> usize;
}

/// Shared, read-only reference to a room owned by the session store.
pub type RoomHandle = Arc<dyn Room>;
