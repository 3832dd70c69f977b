//! Scripted session store.
//!
//! `SimSessionStore` implements [`SessionStore`] over in-memory [`SimRoom`]s.
//! Tests script how each operation resolves (join immediately, join without
//! materializing, fail with a given error) and drive room changes through
//! helpers that emit the matching [`SessionNotification`], in order, on the
//! channel handed to the runtime.
//!
//! Joins and searches can be held open with a gate so a test decides exactly
//! when they settle relative to other inputs.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use roomframe_core::{
    AccountDataEvent, EventId, JoinOptions, Membership, Room, RoomHandle, RoomId, SearchRequest,
    SearchResponse, SessionError, SessionNotification, SessionStore, SettingsChanges, SettingsItem,
    SettingsResult, TimelineEvent, UserId,
};
use tokio::sync::{mpsc, oneshot};

use crate::SimRoom;

/// State event type the store writes room topics to.
pub const TOPIC_EVENT: &str = "m.room.topic";

/// How the next join calls resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JoinBehavior {
    /// Materialize the room and report the local join before resolving.
    #[default]
    Immediate,
    /// Resolve with the room ID but leave the room unmaterialized until
    /// [`SimSessionStore::materialize_deferred_joins`].
    Deferred,
    /// Fail with the given error.
    Fail(SessionError),
}

/// A call the controller made against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `peek`
    Peek(RoomId),
    /// `stop_peeking`
    StopPeeking,
    /// `display_name`
    DisplayName,
    /// `set_display_name`
    SetDisplayName(String),
    /// `join`
    Join {
        /// Address passed in.
        address: RoomId,
        /// Options passed in.
        options: JoinOptions,
    },
    /// `leave`
    Leave(RoomId),
    /// `forget`
    Forget(RoomId),
    /// `search_events`
    Search(SearchRequest),
    /// `paginate_search`
    PaginateSearch {
        /// Original request.
        request: SearchRequest,
        /// Cursor passed in.
        next_batch: String,
    },
    /// `save_settings`
    SaveSettings {
        /// Room saved.
        room_id: RoomId,
        /// Changes saved.
        changes: SettingsChanges,
    },
    /// `resend_unsent`
    ResendUnsent(RoomId),
    /// `cancel_unsent`
    CancelUnsent(RoomId),
}

#[derive(Debug)]
struct StoreState {
    user_id: UserId,
    is_guest: bool,
    display_name: Option<String>,
    profile_error: Option<SessionError>,
    rooms: BTreeMap<RoomId, Arc<SimRoom>>,
    aliases: BTreeMap<RoomId, RoomId>,
    peekable: BTreeSet<RoomId>,
    peek_error: Option<SessionError>,
    join: JoinBehavior,
    deferred_joins: Vec<RoomId>,
    leave_error: Option<SessionError>,
    forget_error: Option<SessionError>,
    setting_errors: HashMap<SettingsItem, SessionError>,
    searches: HashMap<String, Result<SearchResponse, SessionError>>,
    pages: HashMap<String, Result<SearchResponse, SessionError>>,
    join_gates: VecDeque<oneshot::Receiver<()>>,
    search_gates: VecDeque<oneshot::Receiver<()>>,
    calls: Vec<StoreCall>,
    notifications: mpsc::UnboundedSender<SessionNotification>,
}

impl StoreState {
    fn resolve(&self, address: &RoomId) -> RoomId {
        self.aliases.get(address).cloned().unwrap_or_else(|| address.clone())
    }

    fn notify(&self, notification: SessionNotification) {
        if self.notifications.send(notification).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }

    fn room_or_create(&mut self, room_id: &RoomId) -> Arc<SimRoom> {
        Arc::clone(self.rooms.entry(room_id.clone()).or_insert_with(|| SimRoom::new(room_id.clone())))
    }

    fn notify_membership(&self, room: &Arc<SimRoom>, member: roomframe_core::Member) {
        self.notify(SessionNotification::MembershipChanged { room: room.handle(), member });
    }
}

/// In-memory session store with scripted outcomes.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct SimSessionStore {
    state: Arc<Mutex<StoreState>>,
}

impl SimSessionStore {
    /// Create a store for `user_id`, returning the notification stream the
    /// runtime should consume.
    pub fn new(
        user_id: impl Into<UserId>,
        is_guest: bool,
    ) -> (Self, mpsc::UnboundedReceiver<SessionNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let user_id: UserId = user_id.into();
        // Accounts start named after their localpart
        let localpart =
            user_id.as_str().trim_start_matches('@').split(':').next().unwrap_or_default();
        let state = StoreState {
            display_name: Some(localpart.to_owned()),
            profile_error: None,
            user_id,
            is_guest,
            rooms: BTreeMap::new(),
            aliases: BTreeMap::new(),
            peekable: BTreeSet::new(),
            peek_error: None,
            join: JoinBehavior::default(),
            deferred_joins: Vec::new(),
            leave_error: None,
            forget_error: None,
            setting_errors: HashMap::new(),
            searches: HashMap::new(),
            pages: HashMap::new(),
            join_gates: VecDeque::new(),
            search_gates: VecDeque::new(),
            calls: Vec::new(),
            notifications: tx,
        };
        (Self { state: Arc::new(Mutex::new(state)) }, rx)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a room the store already knows, without notifying.
    pub fn add_room(&self, room_id: impl Into<RoomId>) -> Arc<SimRoom> {
        self.lock().room_or_create(&room_id.into())
    }

    /// Map an alias to a room ID.
    pub fn add_alias(&self, alias: impl Into<RoomId>, room_id: impl Into<RoomId>) {
        self.lock().aliases.insert(alias.into(), room_id.into());
    }

    /// Allow previewing a room. The room is created if needed.
    pub fn allow_peek(&self, room_id: impl Into<RoomId>) -> Arc<SimRoom> {
        let room_id = room_id.into();
        let mut state = self.lock();
        state.peekable.insert(room_id.clone());
        state.room_or_create(&room_id)
    }

    /// Make every peek fail with `error`.
    pub fn fail_peek(&self, error: SessionError) {
        self.lock().peek_error = Some(error);
    }

    /// Set the profile display name. `None` makes a first join prompt for one.
    pub fn set_profile_name(&self, name: Option<String>) {
        self.lock().display_name = name;
    }

    /// Make profile lookups and updates fail with `error`.
    pub fn fail_profile(&self, error: SessionError) {
        self.lock().profile_error = Some(error);
    }

    /// Current profile display name.
    pub fn profile_name(&self) -> Option<String> {
        self.lock().display_name.clone()
    }

    /// Script how joins resolve.
    pub fn set_join_behavior(&self, behavior: JoinBehavior) {
        self.lock().join = behavior;
    }

    /// Make leave calls fail with `error`.
    pub fn fail_leave(&self, error: SessionError) {
        self.lock().leave_error = Some(error);
    }

    /// Make forget calls fail with `error`.
    pub fn fail_forget(&self, error: SessionError) {
        self.lock().forget_error = Some(error);
    }

    /// Make saving `item` fail with `error`.
    pub fn fail_setting(&self, item: SettingsItem, error: SessionError) {
        self.lock().setting_errors.insert(item, error);
    }

    /// Script the first page returned for `term`.
    pub fn set_search_result(
        &self,
        term: impl Into<String>,
        result: Result<SearchResponse, SessionError>,
    ) {
        self.lock().searches.insert(term.into(), result);
    }

    /// Script the page returned for the `next_batch` cursor.
    pub fn set_search_page(
        &self,
        next_batch: impl Into<String>,
        result: Result<SearchResponse, SessionError>,
    ) {
        self.lock().pages.insert(next_batch.into(), result);
    }

    /// Hold the next join call open until the returned sender fires or drops.
    pub fn gate_next_join(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().join_gates.push_back(rx);
        tx
    }

    /// Hold the next search or pagination call open until the returned sender
    /// fires or drops.
    pub fn gate_next_search(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().search_gates.push_back(rx);
        tx
    }

    /// Materialize every room a deferred join resolved with, emitting
    /// `RoomMaterialized` followed by the local user's membership change.
    pub fn materialize_deferred_joins(&self) -> Vec<RoomId> {
        let mut state = self.lock();
        let joined = std::mem::take(&mut state.deferred_joins);
        let user_id = state.user_id.clone();
        for room_id in &joined {
            let room = state.room_or_create(room_id);
            let member = room.set_membership(&user_id, Membership::Join);
            state.notify(SessionNotification::RoomMaterialized { room: room.handle() });
            state.notify_membership(&room, member);
        }
        joined
    }

    /// Emit `RoomMaterialized` for a known room.
    pub fn materialize(&self, room_id: &RoomId) {
        let state = self.lock();
        if let Some(room) = state.rooms.get(room_id) {
            state.notify(SessionNotification::RoomMaterialized { room: room.handle() });
        }
    }

    /// Change a member's membership and emit the notification.
    pub fn set_membership(&self, room_id: &RoomId, user_id: &UserId, membership: Membership) {
        let mut state = self.lock();
        let room = state.room_or_create(room_id);
        let member = room.set_membership(user_id, membership);
        state.notify_membership(&room, member);
    }

    /// Append an event to a room timeline and emit the notification.
    pub fn append_timeline(
        &self,
        room_id: &RoomId,
        event_id: impl Into<EventId>,
        sender: &UserId,
        is_live: bool,
    ) {
        let event = TimelineEvent { event_id: event_id.into(), sender: sender.clone() };
        self.lock().notify(SessionNotification::TimelineAppended {
            room_id: room_id.clone(),
            event,
            to_start: false,
            is_live,
        });
    }

    /// Set a room state event and emit the notification.
    pub fn set_room_state(&self, room_id: &RoomId, event_type: &str, content: serde_json::Value) {
        let mut state = self.lock();
        state.room_or_create(room_id).set_state(event_type, content);
        state.notify(SessionNotification::RoomStateChanged {
            room_id: room_id.clone(),
            event_type: event_type.to_owned(),
        });
    }

    /// Set room account data and emit the notification.
    pub fn set_account_data(&self, room_id: &RoomId, event_type: &str, content: serde_json::Value) {
        let mut state = self.lock();
        state.room_or_create(room_id).set_account_data(event_type, content.clone());
        state.notify(SessionNotification::AccountDataChanged {
            room_id: room_id.clone(),
            event: AccountDataEvent { event_type: event_type.to_owned(), content },
        });
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    fn record(&self, call: StoreCall) {
        self.lock().calls.push(call);
    }

    fn apply_join(&self, address: &RoomId) -> Result<RoomId, SessionError> {
        let mut state = self.lock();
        let room_id = state.resolve(address);
        match state.join.clone() {
            JoinBehavior::Fail(error) => Err(error),
            JoinBehavior::Deferred => {
                state.deferred_joins.push(room_id.clone());
                Ok(room_id)
            },
            JoinBehavior::Immediate => {
                let room = state.room_or_create(&room_id);
                let user_id = state.user_id.clone();
                let member = room.set_membership(&user_id, Membership::Join);
                state.notify_membership(&room, member);
                Ok(room_id)
            },
        }
    }

    fn apply_search(
        &self,
        lookup: impl FnOnce(&StoreState) -> Option<Result<SearchResponse, SessionError>>,
    ) -> Result<SearchResponse, SessionError> {
        lookup(&*self.lock()).unwrap_or_else(|| Ok(SearchResponse::default()))
    }
}

async fn wait(gate: Option<oneshot::Receiver<()>>) {
    if let Some(gate) = gate {
        // A dropped sender releases the gate too.
        let _ = gate.await;
    }
}

impl SessionStore for SimSessionStore {
    fn user_id(&self) -> UserId {
        self.lock().user_id.clone()
    }

    fn is_guest(&self) -> bool {
        self.lock().is_guest
    }

    fn lookup_room(&self, room_id: &RoomId) -> Option<RoomHandle> {
        let state = self.lock();
        state.rooms.get(&state.resolve(room_id)).map(SimRoom::handle)
    }

    fn has_joined_rooms(&self) -> bool {
        let state = self.lock();
        state.rooms.values().any(|room| room.membership(&state.user_id) == Some(Membership::Join))
    }

    fn display_name(&self) -> impl Future<Output = Result<Option<String>, SessionError>> + Send {
        self.record(StoreCall::DisplayName);
        let state = self.lock();
        let result = match &state.profile_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.display_name.clone()),
        };
        std::future::ready(result)
    }

    fn set_display_name(
        &self,
        name: String,
    ) -> impl Future<Output = Result<(), SessionError>> + Send {
        self.record(StoreCall::SetDisplayName(name.clone()));
        let mut state = self.lock();
        let result = match state.profile_error.clone() {
            Some(error) => Err(error),
            None => {
                state.display_name = Some(name);
                Ok(())
            },
        };
        std::future::ready(result)
    }

    fn peek(
        &self,
        address: &RoomId,
    ) -> impl Future<Output = Result<RoomHandle, SessionError>> + Send {
        self.record(StoreCall::Peek(address.clone()));
        let state = self.lock();
        let room_id = state.resolve(address);
        let result = match &state.peek_error {
            Some(error) => Err(error.clone()),
            None if state.peekable.contains(&room_id) => state
                .rooms
                .get(&room_id)
                .map(SimRoom::handle)
                .ok_or(SessionError::GuestAccessForbidden),
            None => Err(SessionError::GuestAccessForbidden),
        };
        std::future::ready(result)
    }

    fn stop_peeking(&self) {
        self.record(StoreCall::StopPeeking);
    }

    fn join(
        &self,
        address: &RoomId,
        options: JoinOptions,
    ) -> impl Future<Output = Result<RoomId, SessionError>> + Send {
        self.record(StoreCall::Join { address: address.clone(), options });
        let gate = self.lock().join_gates.pop_front();
        let store = self.clone();
        let address = address.clone();
        async move {
            wait(gate).await;
            store.apply_join(&address)
        }
    }

    fn leave(&self, room_id: &RoomId) -> impl Future<Output = Result<(), SessionError>> + Send {
        self.record(StoreCall::Leave(room_id.clone()));
        let mut state = self.lock();
        let result = match state.leave_error.clone() {
            Some(error) => Err(error),
            None => {
                let room = state.room_or_create(room_id);
                let user_id = state.user_id.clone();
                let member = room.set_membership(&user_id, Membership::Leave);
                state.notify_membership(&room, member);
                Ok(())
            },
        };
        std::future::ready(result)
    }

    fn forget(&self, room_id: &RoomId) -> impl Future<Output = Result<(), SessionError>> + Send {
        self.record(StoreCall::Forget(room_id.clone()));
        let mut state = self.lock();
        let result = match state.forget_error.clone() {
            Some(error) => Err(error),
            None => {
                state.rooms.remove(room_id);
                Ok(())
            },
        };
        std::future::ready(result)
    }

    fn search_events(
        &self,
        request: SearchRequest,
    ) -> impl Future<Output = Result<SearchResponse, SessionError>> + Send {
        self.record(StoreCall::Search(request.clone()));
        let gate = self.lock().search_gates.pop_front();
        let store = self.clone();
        async move {
            wait(gate).await;
            store.apply_search(|state| state.searches.get(&request.term).cloned())
        }
    }

    fn paginate_search(
        &self,
        request: SearchRequest,
        next_batch: String,
    ) -> impl Future<Output = Result<SearchResponse, SessionError>> + Send {
        self.record(StoreCall::PaginateSearch { request, next_batch: next_batch.clone() });
        let gate = self.lock().search_gates.pop_front();
        let store = self.clone();
        async move {
            wait(gate).await;
            store.apply_search(|state| state.pages.get(&next_batch).cloned())
        }
    }

    fn save_settings(
        &self,
        room_id: &RoomId,
        changes: SettingsChanges,
    ) -> impl Future<Output = Vec<SettingsResult>> + Send {
        self.record(StoreCall::SaveSettings { room_id: room_id.clone(), changes: changes.clone() });
        let mut state = self.lock();
        let room = state.room_or_create(room_id);
        let results = changes
            .items()
            .into_iter()
            .map(|item| {
                if let Some(error) = state.setting_errors.get(&item) {
                    return (item, Err(error.clone()));
                }
                match item {
                    SettingsItem::Name => {
                        room.set_name(changes.name.clone().unwrap_or_default());
                    },
                    SettingsItem::Topic => room.set_state(
                        TOPIC_EVENT,
                        serde_json::json!({ "topic": changes.topic.clone().unwrap_or_default() }),
                    ),
                }
                (item, Ok(()))
            })
            .collect();
        std::future::ready(results)
    }

    fn resend_unsent(&self, room_id: &RoomId) {
        self.record(StoreCall::ResendUnsent(room_id.clone()));
        if let Some(room) = self.lock().rooms.get(room_id) {
            room.set_unsent(0);
        }
    }

    fn cancel_unsent(&self, room_id: &RoomId) {
        self.record(StoreCall::CancelUnsent(room_id.clone()));
        if let Some(room) = self.lock().rooms.get(room_id) {
            room.set_unsent(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (SimSessionStore, mpsc::UnboundedReceiver<SessionNotification>) {
        SimSessionStore::new("@me:hs", false)
    }

    #[tokio::test]
    async fn aliases_resolve_for_lookup_and_join() {
        let (store, mut rx) = store();
        store.add_alias("#room:hs", "!r:hs");

        let joined = store.join(&RoomId::from("#room:hs"), JoinOptions::default()).await;
        assert_eq!(joined, Ok(RoomId::from("!r:hs")));
        assert!(store.lookup_room(&RoomId::from("#room:hs")).is_some());
        assert!(matches!(
            rx.try_recv(),
            Ok(SessionNotification::MembershipChanged { member, .. })
                if member.membership == Membership::Join
        ));
    }

    #[tokio::test]
    async fn profile_starts_named_and_first_join_is_tracked() {
        let (store, _rx) = store();
        assert_eq!(store.display_name().await, Ok(Some("me".to_owned())));
        assert!(!store.has_joined_rooms());

        store.set_profile_name(None);
        assert_eq!(store.display_name().await, Ok(None));
        store.set_display_name("Me".into()).await.unwrap();
        assert_eq!(store.profile_name().as_deref(), Some("Me"));

        store.join(&RoomId::from("!r:hs"), JoinOptions::default()).await.unwrap();
        assert!(store.has_joined_rooms());

        store.fail_profile(SessionError::Transport("reset".into()));
        assert!(store.display_name().await.is_err());
        assert_eq!(
            store.calls().iter().filter(|call| **call == StoreCall::DisplayName).count(),
            3
        );
    }

    #[tokio::test]
    async fn deferred_join_materializes_on_request() {
        let (store, mut rx) = store();
        store.set_join_behavior(JoinBehavior::Deferred);

        let joined = store.join(&RoomId::from("!r:hs"), JoinOptions::default()).await;
        assert_eq!(joined, Ok(RoomId::from("!r:hs")));
        assert!(store.lookup_room(&RoomId::from("!r:hs")).is_none());
        assert!(rx.try_recv().is_err());

        assert_eq!(store.materialize_deferred_joins(), vec![RoomId::from("!r:hs")]);
        assert!(matches!(rx.try_recv(), Ok(SessionNotification::RoomMaterialized { .. })));
        assert!(matches!(rx.try_recv(), Ok(SessionNotification::MembershipChanged { .. })));
    }

    #[tokio::test]
    async fn unpeekable_rooms_refuse_preview() {
        let (store, _rx) = store();
        store.add_room("!hidden:hs");
        store.allow_peek("!open:hs");

        let hidden = store.peek(&RoomId::from("!hidden:hs")).await;
        assert_eq!(hidden.err(), Some(SessionError::GuestAccessForbidden));
        assert!(store.peek(&RoomId::from("!open:hs")).await.is_ok());
    }

    #[tokio::test]
    async fn settings_fail_per_item() {
        let (store, _rx) = store();
        let room = store.add_room("!r:hs");
        store.fail_setting(SettingsItem::Topic, SessionError::Transport("reset".into()));

        let changes = SettingsChanges { name: Some("New".into()), topic: Some("t".into()) };
        let results = store.save_settings(&RoomId::from("!r:hs"), changes).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results.first(), Some(&(SettingsItem::Name, Ok(()))));
        assert!(results.get(1).is_some_and(|(_, result)| result.is_err()));
        assert_eq!(room.name().as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn gated_search_waits_for_release() {
        let (store, _rx) = store();
        let gate = store.gate_next_search();
        let request = SearchRequest { filter: None, term: "x".into() };

        let search = store.search_events(request);
        tokio::pin!(search);
        assert!(futures::poll!(&mut search).is_pending());

        let _ = gate.send(());
        assert_eq!(search.await, Ok(SearchResponse::default()));
    }
}
