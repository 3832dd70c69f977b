//! Integration tests for RoomView and Bridge behavior.
//!
//! # Oracle Pattern
//!
//! Tests end with oracle checks that verify:
//! - View state reflects the expected access state
//! - The store saw the expected calls
//! - The user saw the expected notifications and navigation

use std::time::Duration;

use futures::{executor::block_on, future::BoxFuture};
use roomframe_app::{
    Bridge, CompletionCandidate, Identity, Intent, NotificationKind, PeekStatus,
    RoomAccessState, RoomView, RoomViewAction, RoomViewConfig, RoomViewEvent, RoomViewOptions,
    SearchScope, ThirdPartyInvite, ViewError,
};
use roomframe_core::{
    DispatchAction, Environment, JoinOptions, Membership, RoomId, SearchHit, SearchResponse,
    SessionError, SessionNotification, SessionStore, SettingsChanges, SettingsItem, UserId,
    room::GUEST_ACCESS_EVENT,
};
use roomframe_harness::{JoinBehavior, SimEnv, SimInstant, SimSessionStore, StoreCall};
use serde_json::json;
use tokio::sync::mpsc;

const ME: &str = "@me:hs";
const PEER: &str = "@peer:hs";
const ROOM: &str = "!room:hs";

/// A view wired to a simulated store, with actions executed synchronously.
struct Client {
    view: RoomView<SimInstant>,
    bridge: Bridge<SimSessionStore>,
    store: SimSessionStore,
    notifications: mpsc::UnboundedReceiver<SessionNotification>,
    env: SimEnv,
    renders: usize,
    presented: Vec<RoomViewAction>,
    dispatched: Vec<DispatchAction>,
    /// Store operations issued but not yet completed.
    held: Vec<BoxFuture<'static, RoomViewEvent>>,
    hold: bool,
}

impl Client {
    fn new(store: SimSessionStore, notifications: mpsc::UnboundedReceiver<SessionNotification>) -> Self {
        Self::with_options(store, notifications, RoomViewOptions::new(ROOM))
    }

    fn with_options(
        store: SimSessionStore,
        notifications: mpsc::UnboundedReceiver<SessionNotification>,
        options: RoomViewOptions,
    ) -> Self {
        let identity = Identity { user_id: store.user_id(), is_guest: store.is_guest() };
        let room = store.lookup_room(&options.address);
        let view = RoomView::new(identity, options, RoomViewConfig::default(), room);
        Self {
            view,
            bridge: Bridge::new(store.clone()),
            store,
            notifications,
            env: SimEnv::new(),
            renders: 0,
            presented: Vec::new(),
            dispatched: Vec::new(),
            held: Vec::new(),
            hold: false,
        }
    }

    fn mount(&mut self) {
        let actions = self.view.mount(self.env.now());
        self.process(actions);
    }

    /// Execute actions, feeding completions straight back unless holding.
    fn process(&mut self, actions: Vec<RoomViewAction>) {
        for action in actions {
            match action {
                RoomViewAction::Render => self.renders += 1,
                RoomViewAction::Dispatch(dispatch) => self.dispatched.push(dispatch.action),
                action if action.is_store_bound() => {
                    if let Some(operation) = self.bridge.execute(action) {
                        if self.hold {
                            self.held.push(operation);
                        } else {
                            let event = block_on(operation);
                            self.event(event);
                        }
                    }
                },
                action => self.presented.push(action),
            }
        }
    }

    fn event(&mut self, event: RoomViewEvent) {
        let actions = self.view.handle(event, self.env.now()).unwrap();
        self.process(actions);
    }

    fn intent(&mut self, intent: Intent) -> Result<(), ViewError> {
        let actions = self.view.handle(RoomViewEvent::Intent(intent), self.env.now())?;
        self.process(actions);
        Ok(())
    }

    /// Deliver every notification the store has emitted so far.
    fn sync(&mut self) {
        while let Ok(notification) = self.notifications.try_recv() {
            self.event(RoomViewEvent::Session(notification));
        }
    }

    /// Resolve a held operation without delivering it.
    fn resolve_held(&mut self, index: usize) -> RoomViewEvent {
        block_on(self.held.remove(index))
    }

    fn tick_after(&mut self, elapsed: Duration) {
        self.env.advance(elapsed);
        self.event(RoomViewEvent::Tick);
    }

    fn notifications_shown(&self) -> Vec<&roomframe_app::Notification> {
        self.presented
            .iter()
            .filter_map(|action| match action {
                RoomViewAction::Notify(notification) => Some(notification),
                _ => None,
            })
            .collect()
    }
}

fn hit(n: u32) -> SearchHit {
    SearchHit {
        event_id: format!("$e{n}").into(),
        room_id: ROOM.into(),
        sender: PEER.into(),
        body: format!("message {n}"),
    }
}

fn response(hits: Vec<SearchHit>, highlights: &[&str], next_batch: Option<&str>) -> SearchResponse {
    SearchResponse {
        results: hits,
        highlights: highlights.iter().map(ToString::to_string).collect(),
        next_batch: next_batch.map(str::to_owned),
        count: None,
    }
}

#[test]
fn previewed_room_joins() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM).set_membership(&PEER.into(), Membership::Join);
    store.add_alias("#room:hs", ROOM);

    let mut client = Client::with_options(store, rx, RoomViewOptions::new("#room:hs"));
    client.mount();
    assert_eq!(client.view.access_state(), &RoomAccessState::Peeking);

    client.intent(Intent::Join).unwrap();
    client.sync();

    // Oracle: joined, composer enabled, one join call with the alias
    assert_eq!(client.view.access_state(), &RoomAccessState::Joined);
    assert!(client.view.capabilities().can_speak);
    assert!(client.renders > 0);
    let joins: Vec<_> =
        client.store.calls().into_iter().filter(|c| matches!(c, StoreCall::Join { .. })).collect();
    assert_eq!(
        joins,
        vec![StoreCall::Join { address: "#room:hs".into(), options: JoinOptions::default() }]
    );
}

#[test]
fn known_room_skips_preview() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM).set_name("Lobby");

    let mut client = Client::new(store, rx);
    client.mount();

    // Oracle: room known at mount, so no peek; name comes from the room
    assert!(!client.store.calls().contains(&StoreCall::Peek(ROOM.into())));
    assert!(client.store.calls().contains(&StoreCall::StopPeeking));
    assert_eq!(client.view.room_name(), "Lobby");
}

#[test]
fn unpeekable_room_reports_unavailable() {
    let (store, rx) = SimSessionStore::new(ME, true);
    let mut client = Client::new(store, rx);
    client.mount();

    assert_eq!(
        client.view.access_state(),
        &RoomAccessState::Unresolved { peek: PeekStatus::Unavailable }
    );
    assert!(!client.view.room_loading());
    assert!(client.view.room().is_none());
}

#[test]
fn failed_peek_is_fatal() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.fail_peek(SessionError::Transport("reset".into()));
    let mut client = Client::new(store, rx);

    let actions = client.view.mount(client.env.now());
    assert!(actions.contains(&RoomViewAction::Peek { address: ROOM.into() }));

    let result = block_on(client.bridge.execute(actions[0].clone()).unwrap());
    let error = client.view.handle(result, client.env.now()).unwrap_err();
    assert!(error.is_fatal());
}

#[test]
fn deferred_join_completes_when_room_materializes() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_alias("#room:hs", ROOM);
    store.set_join_behavior(JoinBehavior::Deferred);

    let mut client = Client::with_options(store, rx, RoomViewOptions::new("#room:hs"));
    client.mount();
    client.intent(Intent::Join).unwrap();

    assert_eq!(client.view.access_state(), &RoomAccessState::Joining);
    assert_eq!(client.view.pending_join().map(|p| p.room_id.clone()), Some(ROOM.into()));

    client.store.materialize_deferred_joins();
    client.sync();

    // Oracle: pending cleared, room adopted under its canonical ID
    assert_eq!(client.view.access_state(), &RoomAccessState::Joined);
    assert!(client.view.pending_join().is_none());
    assert_eq!(client.view.room_id(), Some(&RoomId::from(ROOM)));
}

#[test]
fn membership_before_join_completion_still_joins() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM);
    let mut client = Client::new(store, rx);
    client.mount();

    client.hold = true;
    client.intent(Intent::Join).unwrap();
    let checked = client.resolve_held(0);
    client.event(checked);
    let completion = client.resolve_held(0);

    // The store's membership notification overtakes the join completion
    client.sync();
    assert_eq!(client.view.access_state(), &RoomAccessState::Joined);

    client.hold = false;
    client.event(completion);
    assert_eq!(client.view.access_state(), &RoomAccessState::Joined);
}

#[test]
fn first_join_asks_for_display_name() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM);
    store.set_profile_name(None);
    let mut client = Client::new(store, rx);
    client.mount();

    client.intent(Intent::Join).unwrap();
    assert!(client.presented.contains(&RoomViewAction::PromptDisplayName));
    assert!(!client.store.calls().iter().any(|call| matches!(call, StoreCall::Join { .. })));

    client.intent(Intent::ChooseDisplayName(Some("Me".into()))).unwrap();
    client.sync();

    // Oracle: name saved before the one join call, then joined
    let calls = client.store.calls();
    let set_name = calls.iter().position(|call| *call == StoreCall::SetDisplayName("Me".into()));
    let join = calls.iter().position(|call| matches!(call, StoreCall::Join { .. }));
    assert!(set_name.is_some() && set_name < join);
    assert_eq!(client.store.profile_name().as_deref(), Some("Me"));
    assert_eq!(client.view.access_state(), &RoomAccessState::Joined);
}

#[test]
fn display_name_prompt_skipped_once_joined_elsewhere() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM);
    store.add_room("!other:hs").set_membership(&ME.into(), Membership::Join);
    store.set_profile_name(None);
    let mut client = Client::new(store, rx);
    client.mount();

    client.intent(Intent::Join).unwrap();
    client.sync();

    assert!(!client.presented.contains(&RoomViewAction::PromptDisplayName));
    assert!(!client.store.calls().contains(&StoreCall::DisplayName));
    assert_eq!(client.view.access_state(), &RoomAccessState::Joined);
}

#[test]
fn dismissed_display_name_prompt_leaves_room_unjoined() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM);
    store.set_profile_name(None);
    let mut client = Client::new(store, rx);
    client.mount();

    client.intent(Intent::Join).unwrap();
    client.intent(Intent::ChooseDisplayName(None)).unwrap();

    assert_eq!(client.view.access_state(), &RoomAccessState::Peeking);
    assert!(client.notifications_shown().is_empty());
    assert!(!client.store.calls().iter().any(|call| matches!(call, StoreCall::Join { .. })));
}

#[test]
fn profile_lookup_failure_fails_the_join() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM);
    store.fail_profile(SessionError::Transport("connection reset".into()));
    let mut client = Client::new(store, rx);
    client.mount();

    client.intent(Intent::Join).unwrap();

    let shown = client.notifications_shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Failed to join room");
    assert!(matches!(client.view.access_state(), RoomAccessState::Errored(_)));
    // Nothing to reject: the user was never invited
    assert!(!client.view.capabilities().can_reject);
    assert!(client.intent(Intent::Reject).is_err());
}

#[test]
fn third_party_invite_joins_with_sign_url() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM);
    let mut options = RoomViewOptions::new(ROOM);
    options.third_party_invite = Some(ThirdPartyInvite {
        invite_sign_url: Some("https://id.example/sign".into()),
        invited_email: Some("me@example.com".into()),
    });

    let mut client = Client::with_options(store, rx, options);
    client.mount();
    client.intent(Intent::Join).unwrap();

    assert!(client.store.calls().iter().any(|call| matches!(
        call,
        StoreCall::Join { options, .. }
            if options.invite_sign_url.as_deref() == Some("https://id.example/sign")
    )));
}

#[test]
fn guest_refused_join_prompts_registration() {
    let (store, rx) = SimSessionStore::new(ME, true);
    store.set_join_behavior(JoinBehavior::Fail(SessionError::Forbidden {
        message: "Guest access is not allowed".into(),
    }));
    let mut client = Client::new(store, rx);
    client.mount();
    client.intent(Intent::Join).unwrap();

    let shown = client.notifications_shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].kind, NotificationKind::RegisterRequired);
    assert_eq!(shown[0].title, "Failed to join the room");
    assert!(matches!(client.view.access_state(), RoomAccessState::Errored(_)));

    // Errored allows a retry
    assert!(client.view.capabilities().can_join);
}

#[test]
fn rejoining_empty_room_explains_why() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM);
    store.set_join_behavior(JoinBehavior::Fail(SessionError::NoKnownServers));
    let mut client = Client::new(store, rx);
    client.mount();
    client.intent(Intent::Join).unwrap();

    let shown = client.notifications_shown();
    assert_eq!(shown[0].title, "Failed to join room");
    assert_eq!(shown[0].description, "It is not currently possible to re-join an empty room.");
}

#[test]
fn rejected_invite_moves_to_next_room() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Invite);
    let mut client = Client::new(store, rx);
    client.mount();
    assert_eq!(client.view.access_state(), &RoomAccessState::Invited);

    client.intent(Intent::Reject).unwrap();
    client.sync();

    assert!(client.dispatched.contains(&DispatchAction::ViewNextRoom));
    assert!(client.store.calls().contains(&StoreCall::Leave(ROOM.into())));
    assert!(!client.view.capabilities().can_speak);
}

#[test]
fn failed_reject_keeps_invite_actionable() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Invite);
    store.fail_leave(SessionError::Transport("offline".into()));
    let mut client = Client::new(store, rx);
    client.mount();
    client.intent(Intent::Reject).unwrap();

    let shown = client.notifications_shown();
    assert_eq!(shown[0].title, "Failed to reject invite");
    assert_eq!(shown[0].description, "transport error: offline");
    assert!(client.view.capabilities().can_reject);
    assert!(!client.dispatched.contains(&DispatchAction::ViewNextRoom));
}

#[test]
fn leaving_goes_through_the_dispatch_bus() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Join);
    let mut client = Client::new(store, rx);
    client.mount();

    client.intent(Intent::Leave).unwrap();
    assert_eq!(client.dispatched, vec![DispatchAction::LeaveRoom { room_id: ROOM.into() }]);

    // The leave handler's membership change drops the view back to a preview
    client.store.set_membership(&ROOM.into(), &ME.into(), Membership::Leave);
    client.sync();
    assert_eq!(client.view.access_state(), &RoomAccessState::Peeking);
    assert!(client.intent(Intent::Join).is_err());
}

#[test]
fn forget_failure_shows_error_code() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM);
    store.fail_forget(SessionError::Server {
        errcode: Some("M_UNKNOWN".into()),
        message: "nope".into(),
    });
    let mut client = Client::new(store, rx);
    client.mount();
    client.intent(Intent::Forget).unwrap();

    let shown = client.notifications_shown();
    assert_eq!(shown[0].title, "Error");
    assert_eq!(shown[0].description, "Failed to forget room (M_UNKNOWN)");
}

#[test]
fn stale_search_responses_are_discarded() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Join);
    store.set_search_result("first", Ok(response(vec![hit(1)], &["first"], None)));
    store.set_search_result("second", Ok(response(vec![hit(2), hit(3)], &["second"], None)));
    let mut client = Client::new(store, rx);
    client.mount();

    client.hold = true;
    client.intent(Intent::Search { term: "first".into(), scope: SearchScope::Room }).unwrap();
    client.intent(Intent::Search { term: "second".into(), scope: SearchScope::Room }).unwrap();
    client.hold = false;

    // Newest response lands first, then the superseded one
    let second = client.resolve_held(1);
    client.event(second);
    let first = client.resolve_held(0);
    client.event(first);

    // Oracle: only the second search's results survive
    let session = client.view.search().session().unwrap();
    assert_eq!(session.term(), "second");
    assert_eq!(session.results().len(), 2);
    assert!(!session.in_progress());
}

#[test]
fn cancelled_search_ignores_late_response() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Join);
    store.set_search_result("term", Ok(response(vec![hit(1)], &["term"], None)));
    let mut client = Client::new(store, rx);
    client.mount();

    client.hold = true;
    client.intent(Intent::Search { term: "term".into(), scope: SearchScope::Room }).unwrap();
    client.intent(Intent::CancelSearch).unwrap();
    client.hold = false;

    let late = client.resolve_held(0);
    client.event(late);

    assert!(client.view.search().session().is_none());
    assert!(!client.view.search().is_open());
}

#[test]
fn search_pages_accumulate_with_longest_highlights_first() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Join);
    let first = response(vec![hit(3), hit(2)], &["cat"], Some("b2"));
    store.set_search_result("cat", Ok(SearchResponse { count: Some(3), ..first }));
    store.set_search_page("b2", Ok(response(vec![hit(1)], &["cats", "catalogue"], None)));
    let mut client = Client::new(store, rx);
    client.mount();

    client.intent(Intent::Search { term: "cat".into(), scope: SearchScope::Room }).unwrap();
    client.intent(Intent::LoadMoreResults { backwards: true }).unwrap();

    let session = client.view.search().session().unwrap();
    assert_eq!(session.results().len(), 3);
    assert_eq!(session.next_batch(), None);
    assert_eq!(session.highlights(), ["catalogue", "cats", "cat"]);
    assert_eq!(session.count(), Some(3));

    // Nothing older remains, so another request is a no-op
    let calls = client.store.calls().len();
    client.intent(Intent::LoadMoreResults { backwards: true }).unwrap();
    assert_eq!(client.store.calls().len(), calls);
}

#[test]
fn failed_search_keeps_previous_results() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Join);
    store.set_search_result("ok", Ok(response(vec![hit(2)], &["ok"], Some("next"))));
    store.set_search_page("next", Err(SessionError::Transport("timeout".into())));
    let mut client = Client::new(store, rx);
    client.mount();

    client.intent(Intent::Search { term: "ok".into(), scope: SearchScope::Room }).unwrap();
    client.intent(Intent::LoadMoreResults { backwards: true }).unwrap();

    let session = client.view.search().session().unwrap();
    assert_eq!(session.results().len(), 1);
    assert!(!session.in_progress());
    assert_eq!(client.notifications_shown()[0].title, "Search failed");
}

#[test]
fn unread_counts_live_messages_from_others_away_from_live_edge() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Join);
    let mut client = Client::new(store, rx);
    client.mount();

    let room: RoomId = ROOM.into();
    client.intent(Intent::Scrolled { at_live_edge: false, read_marker_offset: Some(-40) }).unwrap();
    client.store.append_timeline(&room, "$1", &PEER.into(), true);
    client.store.append_timeline(&room, "$2", &ME.into(), true);
    client.store.append_timeline(&room, "$3", &PEER.into(), false);
    client.store.append_timeline(&room, "$4", &PEER.into(), true);
    client.sync();

    assert_eq!(client.view.unread().unread_count(), 2);
    assert!(client.view.unread().read_marker_above_viewport());

    client.intent(Intent::Scrolled { at_live_edge: true, read_marker_offset: Some(10) }).unwrap();
    assert_eq!(client.view.unread().unread_count(), 0);
    assert!(!client.view.unread().read_marker_above_viewport());
}

#[test]
fn guest_access_change_updates_policy() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM);
    let mut client = Client::new(store, rx);
    client.mount();
    assert!(!client.view.capabilities().guests_can_join);

    let room: RoomId = ROOM.into();
    client.store.set_room_state(&room, GUEST_ACCESS_EVENT, json!({ "guest_access": "can_join" }));
    client.sync();

    assert!(client.view.capabilities().guests_can_join);
}

#[test]
fn settings_save_reports_each_failure() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Join);
    store.fail_setting(SettingsItem::Topic, SessionError::Forbidden { message: "no power".into() });
    let mut client = Client::new(store, rx);
    client.mount();

    client.intent(Intent::ShowSettings).unwrap();
    let changes = SettingsChanges { name: Some("Renamed".into()), topic: Some("t".into()) };
    client.intent(Intent::SaveSettings(changes)).unwrap();

    // Oracle: the name saved, the topic failure surfaced, editing closed
    assert_eq!(client.view.room_name(), "Renamed");
    assert_eq!(client.notifications_shown()[0].description, "no power");
    assert!(!client.view.editing_settings());
    assert!(!client.view.uploading_settings());
}

#[test]
fn unsent_messages_clear_after_resend() {
    let (store, rx) = SimSessionStore::new(ME, false);
    let room = store.add_room(ROOM);
    room.set_membership(&ME.into(), Membership::Join);
    room.set_unsent(2);
    let mut client = Client::new(store, rx);
    client.mount();
    assert!(client.view.has_unsent_messages());

    client.intent(Intent::ResendUnsent).unwrap();
    client.event(RoomViewEvent::Dispatched(DispatchAction::MessageSent));

    assert!(client.store.calls().contains(&StoreCall::ResendUnsent(ROOM.into())));
    assert!(!client.view.has_unsent_messages());
}

#[test]
fn completions_recompute_once_per_burst() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.add_room(ROOM).set_membership(&ME.into(), Membership::Join);
    let mut client = Client::new(store, rx);
    client.mount();
    client.tick_after(Duration::from_millis(500));
    let baseline = client.view.completion_recomputations();

    let room: RoomId = ROOM.into();
    for n in 0..5 {
        let peer = UserId::new(format!("@peer{n}:hs"));
        client.store.set_membership(&room, &peer, Membership::Join);
        client.sync();
        client.env.advance(Duration::from_millis(100));
    }
    client.tick_after(Duration::from_millis(500));

    assert_eq!(client.view.completion_recomputations(), baseline + 1);
    let members = client
        .view
        .completions()
        .iter()
        .filter(|candidate| matches!(candidate, CompletionCandidate::Member { .. }))
        .count();
    assert_eq!(members, 5);
}

#[test]
fn teardown_discards_late_completions() {
    let (store, rx) = SimSessionStore::new(ME, false);
    store.allow_peek(ROOM);
    let mut client = Client::new(store, rx);
    client.mount();

    client.hold = true;
    client.intent(Intent::Join).unwrap();
    client.view.unmount();

    let late = client.resolve_held(0);
    let actions = client.view.handle(late, client.env.now()).unwrap();
    assert!(actions.is_empty());
    assert_eq!(
        client.view.handle(RoomViewEvent::Intent(Intent::Join), client.env.now()).unwrap_err(),
        ViewError::TornDown
    );
}
