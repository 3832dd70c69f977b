//! Session store contract.
//!
//! The session store owns the authenticated identity and every room object.
//! Controllers never call it directly: they emit actions, and a bridge
//! executes those actions against a [`SessionStore`] and feeds completions
//! back as events. Change notifications arrive on a separate channel as
//! [`SessionNotification`] values, in the order the store emits them.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
    AccountDataEvent, EventId, Member, RoomHandle, RoomId, SessionError, TimelineEvent, UserId,
};

/// Options for a join call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOptions {
    /// Signing URL from a third-party (e.g. email) invite.
    pub invite_sign_url: Option<String>,
}

/// Restricts a search to a set of rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Rooms to search in.
    pub rooms: Vec<RoomId>,
}

/// A full-text search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Scope filter. `None` searches every room of the account.
    pub filter: Option<SearchFilter>,
    /// Search term as typed by the user.
    pub term: String,
}

/// One matching event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Matching event.
    pub event_id: EventId,
    /// Room the event belongs to.
    pub room_id: RoomId,
    /// Sender of the event.
    pub sender: UserId,
    /// Message body.
    pub body: String,
}

/// One page of search results, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matches in this page, newest first.
    pub results: Vec<SearchHit>,
    /// Strings the server actually matched, for highlighting.
    pub highlights: Vec<String>,
    /// Cursor for the next (older) page. `None` if there are no more results.
    pub next_batch: Option<String>,
    /// Server's estimate of the total number of matches, if it reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// Room settings edited in one save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsChanges {
    /// New room name.
    pub name: Option<String>,
    /// New room topic.
    pub topic: Option<String>,
}

impl SettingsChanges {
    /// Items this save will touch.
    pub fn items(&self) -> Vec<SettingsItem> {
        let mut items = Vec::new();
        if self.name.is_some() {
            items.push(SettingsItem::Name);
        }
        if self.topic.is_some() {
            items.push(SettingsItem::Topic);
        }
        items
    }
}

/// A single independently-saved room setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsItem {
    /// Room name.
    Name,
    /// Room topic.
    Topic,
}

/// Outcome of saving one settings item.
pub type SettingsResult = (SettingsItem, Result<(), SessionError>);

/// Change notifications emitted by the store.
#[derive(Debug, Clone)]
pub enum SessionNotification {
    /// A room object became available (e.g. after a join came down sync).
    RoomMaterialized {
        /// The new room.
        room: RoomHandle,
    },

    /// An event was added to a room timeline.
    TimelineAppended {
        /// Room the event belongs to.
        room_id: RoomId,
        /// The event.
        event: TimelineEvent,
        /// Added at the start of the timeline (back-pagination).
        to_start: bool,
        /// Arrived live rather than from history.
        is_live: bool,
    },

    /// Room account data changed.
    AccountDataChanged {
        /// Room whose account data changed.
        room_id: RoomId,
        /// The new event.
        event: AccountDataEvent,
    },

    /// A member's state changed.
    MembershipChanged {
        /// Room the member belongs to, after the change.
        room: RoomHandle,
        /// The member, after the change.
        member: Member,
    },

    /// A room state event changed.
    RoomStateChanged {
        /// Room whose state changed.
        room_id: RoomId,
        /// Type of the changed state event.
        event_type: String,
    },
}

/// Operations the controller needs from the session store.
///
/// Implementations are cheap handles (`Clone`) so each in-flight operation can
/// own one. Futures must not borrow controller state: completions are
/// delivered back to the controller as events.
pub trait SessionStore: Clone + Send + Sync + 'static {
    /// The authenticated user.
    fn user_id(&self) -> UserId;

    /// Whether the authenticated user is a guest account.
    fn is_guest(&self) -> bool;

    /// Look up an already-materialized room.
    fn lookup_room(&self, room_id: &RoomId) -> Option<RoomHandle>;

    /// Whether the authenticated user is joined to any room.
    fn has_joined_rooms(&self) -> bool;

    /// Fetch the authenticated user's profile display name.
    fn display_name(&self) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;

    /// Set the authenticated user's profile display name.
    fn set_display_name(
        &self,
        name: String,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Preview a room without joining.
    ///
    /// Fails with [`SessionError::GuestAccessForbidden`] if the room cannot be
    /// previewed.
    fn peek(&self, address: &RoomId)
    -> impl Future<Output = Result<RoomHandle, SessionError>> + Send;

    /// Stop any running room preview.
    fn stop_peeking(&self);

    /// Join a room by ID or alias. Resolves with the joined room's ID, which
    /// may not be materialized yet.
    fn join(
        &self,
        address: &RoomId,
        options: JoinOptions,
    ) -> impl Future<Output = Result<RoomId, SessionError>> + Send;

    /// Leave a room (also used to reject invites).
    fn leave(&self, room_id: &RoomId) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Forget a room that has been left.
    fn forget(&self, room_id: &RoomId) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Run a search and return the first (newest) page.
    fn search_events(
        &self,
        request: SearchRequest,
    ) -> impl Future<Output = Result<SearchResponse, SessionError>> + Send;

    /// Fetch the next (older) page of a previous search.
    fn paginate_search(
        &self,
        request: SearchRequest,
        next_batch: String,
    ) -> impl Future<Output = Result<SearchResponse, SessionError>> + Send;

    /// Save room settings. Each item succeeds or fails independently.
    fn save_settings(
        &self,
        room_id: &RoomId,
        changes: SettingsChanges,
    ) -> impl Future<Output = Vec<SettingsResult>> + Send;

    /// Re-queue every unsent event in the room.
    fn resend_unsent(&self, room_id: &RoomId);

    /// Drop every unsent event in the room.
    fn cancel_unsent(&self, room_id: &RoomId);
}
