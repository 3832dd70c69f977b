//! Room session state controller.
//!
//! [`RoomView`] is a pure state machine binding one room's live state to the
//! rendered screen. It consumes [`RoomViewEvent`] inputs and produces
//! [`RoomViewAction`] instructions for the runtime to execute. It never reads
//! the clock and never calls the session store; the room handle it holds is
//! only queried.
//!
//! # Responsibilities
//!
//! - Room access state (preview, invite, join, reject) via [`RoomAccess`].
//! - Unread count and read-marker bar via [`UnreadTracker`].
//! - Search sessions and their stale-response guard via [`SearchPanel`].
//! - Debounced completion candidates and the user-activity pulse.
//! - Room settings, unsent messages, tint, and navigation dispatches.

use std::{ops::Sub, time::Duration};

use roomframe_core::{
    Dispatch, DispatchAction, EventId, Membership, Room, RoomHandle, RoomId, SessionError,
    SessionNotification, SettingsResult,
    room::{COLOR_SCHEME_EVENT, GUEST_ACCESS_EVENT, HISTORY_VISIBILITY_EVENT},
};

use crate::{
    Capabilities, CompletionCandidate, CompletionList, DiscardReason, Identity, Intent, JoinPreflight,
    JoinedRoom, Notification, PanelScrollState, PendingJoinRequest, RoomAccess, RoomAccessState, RoomViewAction,
    RoomViewConfig, RoomViewEvent, RoomViewOptions, SavedScrollState, SearchId, SearchItem,
    SearchOutcome, SearchPanel, SearchScope, UnreadTracker, UserActivity, ViewError,
    access::{forget_failure_notification, join_failure_notification, reject_failure_notification},
};

/// Room session state controller.
#[derive(Debug)]
pub struct RoomView<I> {
    identity: Identity,
    options: RoomViewOptions,
    config: RoomViewConfig,
    /// Room object, once previewed, known at mount, or materialized.
    room: Option<RoomHandle>,
    access: RoomAccess,
    unread: UnreadTracker,
    search: SearchPanel,
    completions: CompletionList<I>,
    activity: UserActivity<I>,
    focused_event: Option<EventId>,
    editing_settings: bool,
    uploading_settings: bool,
    has_unsent_messages: bool,
    forgetting: bool,
    mounted: bool,
    torn_down: bool,
}

impl<I> RoomView<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a view. `room` is the store's room object if it already exists.
    pub fn new(
        identity: Identity,
        options: RoomViewOptions,
        config: RoomViewConfig,
        room: Option<RoomHandle>,
    ) -> Self {
        let access = RoomAccess::new(options.address.clone());
        let focused_event = options.focused_event.clone();
        Self {
            identity,
            completions: CompletionList::new(config.completion_debounce),
            activity: UserActivity::new(config.activity_interval),
            options,
            config,
            room,
            access,
            unread: UnreadTracker::new(),
            search: SearchPanel::new(),
            focused_event,
            editing_settings: false,
            uploading_settings: false,
            has_unsent_messages: false,
            forgetting: false,
            mounted: false,
            torn_down: false,
        }
    }

    /// Start the view: preview an unknown room, or load a known one.
    pub fn mount(&mut self, now: I) -> Vec<RoomViewAction> {
        if self.mounted {
            return vec![];
        }
        self.mounted = true;

        if self.room.is_none() {
            self.access.begin_peek();
            return vec![
                RoomViewAction::Peek { address: self.options.address.clone() },
                RoomViewAction::Render,
            ];
        }

        let mut actions = vec![RoomViewAction::StopPeeking];
        actions.extend(self.room_loaded(now));
        actions.push(RoomViewAction::Render);
        actions
    }

    /// Stop the view. Every later input is discarded.
    pub fn unmount(&mut self) {
        if !self.torn_down {
            tracing::debug!(room = %self.options.address, "room view unmounted");
        }
        self.torn_down = true;
        self.completions.cancel();
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: RoomViewEvent, now: I) -> Result<Vec<RoomViewAction>, ViewError> {
        if self.torn_down {
            tracing::debug!(reason = ?DiscardReason::TornDown, ?event, "discarding input");
            return match event {
                RoomViewEvent::Intent(_) => Err(ViewError::TornDown),
                _ => Ok(vec![]),
            };
        }

        match event {
            RoomViewEvent::Tick => Ok(self.tick(now)),
            RoomViewEvent::Intent(intent) => self.intent(intent, now),
            RoomViewEvent::Session(notification) => Ok(self.on_notification(notification, now)),
            RoomViewEvent::Dispatched(action) => Ok(self.on_dispatch(&action)),
            RoomViewEvent::PeekCompleted { result } => self.on_peek_completed(result, now),
            RoomViewEvent::DisplayNameChecked { result } => Ok(self.on_display_name_checked(result)),
            RoomViewEvent::DisplayNameSet { result } => Ok(self.on_display_name_set(result)),
            RoomViewEvent::JoinCompleted { result } => Ok(self.on_join_completed(result, now)),
            RoomViewEvent::RejectCompleted { result } => Ok(self.on_reject_completed(result)),
            RoomViewEvent::ForgetCompleted { result } => Ok(self.on_forget_completed(result)),
            RoomViewEvent::SearchCompleted { search_id, result } => {
                Ok(self.on_search_completed(search_id, result))
            },
            RoomViewEvent::SettingsSaved { results } => Ok(self.on_settings_saved(results)),
            RoomViewEvent::FocusedEventChanged { event_id } => Ok(self.on_focus_changed(event_id)),
        }
    }

    /// Time until the next timer-driven work is due.
    pub fn next_deadline(&self, now: I) -> Option<Duration> {
        if self.torn_down {
            return None;
        }
        self.completions.remaining(now)
    }

    fn tick(&mut self, now: I) -> Vec<RoomViewAction> {
        let room = self.room.as_deref();
        match self.completions.poll(now, room, &self.identity.user_id, &self.config.commands) {
            Some(candidates) => vec![RoomViewAction::SetCompletions(candidates.to_vec())],
            None => vec![],
        }
    }

    fn intent(&mut self, intent: Intent, now: I) -> Result<Vec<RoomViewAction>, ViewError> {
        match intent {
            Intent::Join => self.join(),
            Intent::ChooseDisplayName(name) => self.choose_display_name(name),
            Intent::Reject => self.reject(),
            Intent::RejectThirdPartyInvite => Ok(self.reject_third_party_invite()),
            Intent::Leave => self.leave(),
            Intent::Forget => self.forget(),
            Intent::OpenSearch => Ok(self.open_search()),
            Intent::Search { term, scope } => self.start_search(term, scope),
            Intent::CancelSearch => Ok(self.cancel_search()),
            Intent::LoadMoreResults { backwards } => Ok(self.request_more_results(backwards)),
            Intent::SearchResultsResized => Ok(self.search_results_resized()),
            Intent::Scrolled { at_live_edge, read_marker_offset } => {
                Ok(self.scrolled(at_live_edge, read_marker_offset))
            },
            Intent::JumpToLiveTimeline => Ok(vec![RoomViewAction::JumpToLiveTimeline]),
            Intent::JumpToReadMarker => Ok(vec![RoomViewAction::JumpToReadMarker]),
            Intent::ForgetReadMarker => Ok(vec![RoomViewAction::ForgetReadMarker]),
            Intent::ShowSettings => self.show_settings(),
            Intent::CancelSettings => Ok(self.cancel_settings()),
            Intent::SaveSettings(changes) => self.save_settings(changes),
            Intent::ResendUnsent => self.resend_all_unsent(),
            Intent::CancelUnsent => self.cancel_all_unsent(),
            Intent::Fullscreen => Ok(self.toggle_fullscreen()),
            Intent::PointerMoved | Intent::KeyPressed => Ok(self.user_activity(now)),
        }
    }

    /// Adopt the room object and read everything derived from it.
    fn room_loaded(&mut self, now: I) -> Vec<RoomViewAction> {
        let Some(room) = self.room.clone() else {
            return vec![];
        };
        self.access.peek_settled();
        self.access.policy_mut().refresh(room.as_ref());
        self.has_unsent_messages = room.unsent_event_count() > 0;
        self.access.on_local_membership(room.membership(&self.identity.user_id));
        self.completions.schedule(now);
        vec![self.tint(room.as_ref())]
    }

    fn tint(&self, room: &dyn Room) -> RoomViewAction {
        let scheme = room.account_data(COLOR_SCHEME_EVENT);
        let color = |key: &str| {
            scheme.as_ref().and_then(|s| s.get(key)).and_then(|v| v.as_str()).map(str::to_string)
        };
        RoomViewAction::ApplyTint { primary: color("primary_color"), secondary: color("secondary_color") }
    }

    fn is_viewed_room(&self, room_id: &RoomId) -> bool {
        self.access.matches(room_id, self.room.as_ref().map(|r| r.room_id()))
    }

    fn require_room(&self, operation: &'static str) -> Result<RoomId, ViewError> {
        self.room_id().cloned().ok_or(ViewError::NoRoom { operation })
    }

    fn on_peek_completed(
        &mut self,
        result: Result<RoomHandle, SessionError>,
        now: I,
    ) -> Result<Vec<RoomViewAction>, ViewError> {
        match result {
            Ok(room) => {
                if self.room.is_some() {
                    tracing::debug!(room = %room.room_id(), "peek completed after room was loaded");
                    self.access.peek_settled();
                    return Ok(vec![RoomViewAction::Render]);
                }
                self.room = Some(room);
                let mut actions = self.room_loaded(now);
                actions.push(RoomViewAction::Render);
                Ok(actions)
            },
            Err(SessionError::GuestAccessForbidden) => {
                tracing::info!(room = %self.options.address, "room cannot be previewed");
                self.access.peek_unavailable();
                Ok(vec![RoomViewAction::Render])
            },
            Err(error) => {
                tracing::error!(room = %self.options.address, %error, "peek failed");
                self.access.peek_settled();
                Err(ViewError::PeekFailed(error))
            },
        }
    }

    /// Join the room.
    ///
    /// With [`RoomViewConfig::prompt_for_display_name`] set, the join call
    /// waits until the account has a display name.
    pub fn join(&mut self) -> Result<Vec<RoomViewAction>, ViewError> {
        self.access.begin_join().inspect_err(|error| tracing::warn!(%error, "join rejected"))?;
        if self.config.prompt_for_display_name {
            self.access.advance_preflight(JoinPreflight::Idle, JoinPreflight::CheckingProfile);
            return Ok(vec![RoomViewAction::CheckDisplayName, RoomViewAction::Render]);
        }
        Ok(self.issue_join())
    }

    fn issue_join(&self) -> Vec<RoomViewAction> {
        vec![
            RoomViewAction::Join {
                address: self.options.address.clone(),
                options: self.options.join_options(),
            },
            RoomViewAction::Render,
        ]
    }

    fn on_display_name_checked(&mut self, result: Result<bool, SessionError>) -> Vec<RoomViewAction> {
        match result {
            Ok(needs_name) => {
                let next = if needs_name {
                    JoinPreflight::AwaitingDisplayName
                } else {
                    JoinPreflight::Idle
                };
                if !self.access.advance_preflight(JoinPreflight::CheckingProfile, next) {
                    tracing::debug!("discarding display name check, no longer joining");
                    return vec![];
                }
                if needs_name {
                    vec![RoomViewAction::PromptDisplayName, RoomViewAction::Render]
                } else {
                    self.issue_join()
                }
            },
            Err(error) => self.preflight_failed(JoinPreflight::CheckingProfile, error),
        }
    }

    /// Answer the display name prompt.
    pub fn choose_display_name(
        &mut self,
        name: Option<String>,
    ) -> Result<Vec<RoomViewAction>, ViewError> {
        let operation = "choose display name";
        let Some(name) = name else {
            if !self.access.join_cancelled() {
                return Err(ViewError::InvalidState { state: self.access.state().name(), operation });
            }
            return Ok(vec![RoomViewAction::Render]);
        };
        if !self
            .access
            .advance_preflight(JoinPreflight::AwaitingDisplayName, JoinPreflight::SavingDisplayName)
        {
            return Err(ViewError::InvalidState { state: self.access.state().name(), operation });
        }
        Ok(vec![RoomViewAction::SetDisplayName { name }, RoomViewAction::Render])
    }

    fn on_display_name_set(&mut self, result: Result<(), SessionError>) -> Vec<RoomViewAction> {
        match result {
            Ok(()) => {
                if !self
                    .access
                    .advance_preflight(JoinPreflight::SavingDisplayName, JoinPreflight::Idle)
                {
                    tracing::debug!("discarding display name save, no longer joining");
                    return vec![];
                }
                self.issue_join()
            },
            Err(error) => self.preflight_failed(JoinPreflight::SavingDisplayName, error),
        }
    }

    /// A step before the join call failed. The join fails with it.
    fn preflight_failed(&mut self, step: JoinPreflight, error: SessionError) -> Vec<RoomViewAction> {
        if self.access.preflight() != step || !self.access.join_failed(error.clone()) {
            tracing::debug!(%error, ?step, "discarding preflight failure, no longer joining");
            return vec![];
        }
        tracing::warn!(room = %self.options.address, %error, ?step, "join preflight failed");
        vec![
            RoomViewAction::Notify(join_failure_notification(&error, self.identity.is_guest)),
            RoomViewAction::Render,
        ]
    }

    fn on_join_completed(
        &mut self,
        result: Result<JoinedRoom, SessionError>,
        now: I,
    ) -> Vec<RoomViewAction> {
        let mut actions = Vec::new();
        match result {
            Ok(JoinedRoom { room_id, room }) => {
                let membership = match room {
                    Some(room) => {
                        let membership = room.membership(&self.identity.user_id);
                        if self.room.is_none() {
                            self.room = Some(room);
                            actions.extend(self.room_loaded(now));
                        }
                        Some(membership)
                    },
                    None => None,
                };
                self.access.join_resolved(room_id, membership);
            },
            Err(error) => {
                if !self.access.join_failed(error.clone()) {
                    tracing::debug!(%error, "discarding join failure, no longer joining");
                    return vec![];
                }
                tracing::warn!(room = %self.options.address, %error, "join failed");
                actions.push(RoomViewAction::Notify(join_failure_notification(
                    &error,
                    self.identity.is_guest,
                )));
            },
        }
        actions.push(RoomViewAction::Render);
        actions
    }

    /// Reject the invite.
    pub fn reject(&mut self) -> Result<Vec<RoomViewAction>, ViewError> {
        let room_id = self.require_room("reject")?;
        self.access.begin_reject().inspect_err(|error| tracing::warn!(%error, "reject rejected"))?;
        Ok(vec![RoomViewAction::Leave { room_id }, RoomViewAction::Render])
    }

    fn on_reject_completed(&mut self, result: Result<(), SessionError>) -> Vec<RoomViewAction> {
        let notification = result.as_ref().err().map(reject_failure_notification);
        if !self.access.reject_finished(result) {
            tracing::debug!("discarding reject completion, no longer rejecting");
            return vec![];
        }
        match notification {
            None => vec![
                RoomViewAction::Dispatch(Dispatch::new(DispatchAction::ViewNextRoom)),
                RoomViewAction::Render,
            ],
            Some(notification) => {
                tracing::warn!(description = %notification.description, "reject failed");
                vec![RoomViewAction::Notify(notification), RoomViewAction::Render]
            },
        }
    }

    /// Decline a third-party invite by browsing the room directory instead.
    pub fn reject_third_party_invite(&self) -> Vec<RoomViewAction> {
        vec![RoomViewAction::Dispatch(Dispatch::new(DispatchAction::ViewRoomDirectory))]
    }

    /// Ask the leave handler to leave the room.
    pub fn leave(&self) -> Result<Vec<RoomViewAction>, ViewError> {
        self.access.check_leave()?;
        let room_id = self.require_room("leave")?;
        Ok(vec![RoomViewAction::Dispatch(Dispatch::new(DispatchAction::LeaveRoom { room_id }))])
    }

    /// Forget the room.
    pub fn forget(&mut self) -> Result<Vec<RoomViewAction>, ViewError> {
        let room_id = self.require_room("forget")?;
        if self.forgetting {
            return Err(ViewError::InvalidState { state: "Forgetting", operation: "forget" });
        }
        self.forgetting = true;
        Ok(vec![RoomViewAction::Forget { room_id }])
    }

    fn on_forget_completed(&mut self, result: Result<(), SessionError>) -> Vec<RoomViewAction> {
        self.forgetting = false;
        match result {
            Ok(()) => vec![RoomViewAction::Dispatch(Dispatch::new(DispatchAction::ViewNextRoom))],
            Err(error) => {
                tracing::warn!(%error, "forget failed");
                vec![RoomViewAction::Notify(forget_failure_notification(&error))]
            },
        }
    }

    /// Show the search bar.
    pub fn open_search(&mut self) -> Vec<RoomViewAction> {
        self.search.open();
        vec![RoomViewAction::Render]
    }

    /// Start a search, superseding any previous one.
    pub fn start_search(
        &mut self,
        term: String,
        scope: SearchScope,
    ) -> Result<Vec<RoomViewAction>, ViewError> {
        let room_id = match scope {
            SearchScope::Room => Some(self.require_room("search")?),
            SearchScope::All => None,
        };
        let (search_id, request) = self.search.start(term, scope, room_id.as_ref());
        tracing::debug!(search_id = search_id.value(), ?scope, "starting search");
        Ok(vec![
            RoomViewAction::ResetSearchScroll,
            RoomViewAction::Search { search_id, request },
            RoomViewAction::Render,
        ])
    }

    /// Hide the search bar. In-flight responses become stale.
    pub fn cancel_search(&mut self) -> Vec<RoomViewAction> {
        self.search.cancel();
        vec![RoomViewAction::Render]
    }

    /// Load older search results, if there are any and none are loading.
    pub fn request_more_results(&mut self, backwards: bool) -> Vec<RoomViewAction> {
        match self.search.request_more(backwards) {
            Some((search_id, request, next_batch)) => vec![
                RoomViewAction::PaginateSearch { search_id, request, next_batch },
                RoomViewAction::Render,
            ],
            None => {
                tracing::debug!(backwards, "no more search results to load");
                vec![]
            },
        }
    }

    /// The results panel changed size; the timeline must re-measure now.
    pub fn search_results_resized(&self) -> Vec<RoomViewAction> {
        vec![RoomViewAction::Dispatch(Dispatch::sync(DispatchAction::TimelineResize))]
    }

    fn on_search_completed(
        &mut self,
        search_id: SearchId,
        result: Result<roomframe_core::SearchResponse, SessionError>,
    ) -> Vec<RoomViewAction> {
        match self.search.complete(search_id, result) {
            SearchOutcome::Applied => vec![RoomViewAction::Render],
            SearchOutcome::Failed(error) => {
                tracing::warn!(search_id = search_id.value(), %error, "search failed");
                vec![
                    RoomViewAction::Notify(Notification::error("Search failed", error.to_string())),
                    RoomViewAction::Render,
                ]
            },
            SearchOutcome::Discarded(reason) => {
                tracing::debug!(search_id = search_id.value(), ?reason, "discarding search results");
                vec![]
            },
        }
    }

    fn on_focus_changed(&mut self, event_id: Option<EventId>) -> Vec<RoomViewAction> {
        if event_id == self.focused_event {
            return vec![];
        }
        self.focused_event = event_id;
        self.search.hide_results();
        vec![RoomViewAction::Render]
    }

    fn scrolled(&mut self, at_live_edge: bool, read_marker_offset: Option<i64>) -> Vec<RoomViewAction> {
        let mut changed = self.unread.set_at_live_edge(at_live_edge);
        if let Some(offset) = read_marker_offset {
            changed |= self.unread.update_read_marker(offset);
        }
        if changed { vec![RoomViewAction::Render] } else { vec![] }
    }

    /// Open room settings.
    pub fn show_settings(&mut self) -> Result<Vec<RoomViewAction>, ViewError> {
        self.require_room("edit settings")?;
        self.editing_settings = true;
        Ok(vec![RoomViewAction::Render])
    }

    /// Close room settings and restore the saved tint.
    pub fn cancel_settings(&mut self) -> Vec<RoomViewAction> {
        self.editing_settings = false;
        let mut actions: Vec<_> = self.room.as_deref().map(|room| self.tint(room)).into_iter().collect();
        actions.push(RoomViewAction::Render);
        actions
    }

    /// Save edited settings. Each item is saved independently.
    pub fn save_settings(
        &mut self,
        changes: roomframe_core::SettingsChanges,
    ) -> Result<Vec<RoomViewAction>, ViewError> {
        let room_id = self.require_room("save settings")?;
        if self.uploading_settings {
            return Err(ViewError::InvalidState { state: "Saving", operation: "save settings" });
        }
        if changes.items().is_empty() {
            self.editing_settings = false;
            return Ok(vec![RoomViewAction::Render]);
        }
        self.uploading_settings = true;
        Ok(vec![RoomViewAction::SaveSettings { room_id, changes }, RoomViewAction::Render])
    }

    fn on_settings_saved(&mut self, results: Vec<SettingsResult>) -> Vec<RoomViewAction> {
        self.uploading_settings = false;
        self.editing_settings = false;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|(item, result)| {
                let error = result.err()?;
                tracing::warn!(?item, %error, "failed to save setting");
                Some(error.to_string())
            })
            .collect();

        let mut actions = Vec::new();
        if !failures.is_empty() {
            actions.push(RoomViewAction::Notify(Notification::error(
                "Failed to save settings",
                failures.join("\n"),
            )));
        }
        actions.push(RoomViewAction::Render);
        actions
    }

    /// Resend every unsent message.
    pub fn resend_all_unsent(&self) -> Result<Vec<RoomViewAction>, ViewError> {
        let room_id = self.require_room("resend unsent messages")?;
        Ok(vec![RoomViewAction::ResendUnsent { room_id }])
    }

    /// Cancel every unsent message.
    pub fn cancel_all_unsent(&self) -> Result<Vec<RoomViewAction>, ViewError> {
        let room_id = self.require_room("cancel unsent messages")?;
        Ok(vec![RoomViewAction::CancelUnsent { room_id }])
    }

    /// Enter fullscreen video.
    pub fn toggle_fullscreen(&self) -> Vec<RoomViewAction> {
        vec![RoomViewAction::Dispatch(Dispatch::sync(DispatchAction::VideoFullscreen {
            fullscreen: true,
        }))]
    }

    fn user_activity(&mut self, now: I) -> Vec<RoomViewAction> {
        self.activity
            .on_activity(now)
            .map(|action| RoomViewAction::Dispatch(Dispatch::new(action)))
            .into_iter()
            .collect()
    }

    fn on_notification(&mut self, notification: SessionNotification, now: I) -> Vec<RoomViewAction> {
        match notification {
            SessionNotification::RoomMaterialized { room } => self.on_room_materialized(room, now),
            SessionNotification::TimelineAppended { room_id, event, to_start, is_live } => {
                if !self.is_current_room(&room_id) || to_start || !is_live {
                    return vec![];
                }
                if self.access.state() == &RoomAccessState::Joining {
                    tracing::debug!(event = %event.event_id, "ignoring arrival while joining");
                    return vec![];
                }
                let from_me = event.sender == self.identity.user_id;
                if self.unread.on_live_arrival(from_me) { vec![RoomViewAction::Render] } else { vec![] }
            },
            SessionNotification::AccountDataChanged { room_id, event } => {
                if !self.is_current_room(&room_id) || event.event_type != COLOR_SCHEME_EVENT {
                    return vec![];
                }
                self.room.as_deref().map(|room| self.tint(room)).into_iter().collect()
            },
            SessionNotification::MembershipChanged { room, member } => {
                self.on_membership_changed(room, member.user_id, member.membership, now)
            },
            SessionNotification::RoomStateChanged { room_id, event_type } => {
                let relevant = event_type == GUEST_ACCESS_EVENT || event_type == HISTORY_VISIBILITY_EVENT;
                if !relevant || !self.is_current_room(&room_id) {
                    return vec![];
                }
                let Some(room) = self.room.clone() else {
                    return vec![];
                };
                if self.access.policy_mut().refresh(room.as_ref()) {
                    vec![RoomViewAction::Render]
                } else {
                    vec![]
                }
            },
        }
    }

    /// Whether `room_id` is the loaded room (not merely a pending one).
    fn is_current_room(&self, room_id: &RoomId) -> bool {
        self.room.as_ref().is_some_and(|room| room.room_id() == room_id)
    }

    fn on_room_materialized(&mut self, room: RoomHandle, now: I) -> Vec<RoomViewAction> {
        let room_id = room.room_id().clone();
        let completes_join = self.access.room_materialized(&room_id);
        let is_address = self.room.is_none() && room_id == self.options.address;
        if !completes_join && !is_address {
            return vec![];
        }
        tracing::debug!(room = %room_id, completes_join, "room materialized");
        self.room = Some(room);
        let mut actions = self.room_loaded(now);
        actions.push(RoomViewAction::Render);
        actions
    }

    fn on_membership_changed(
        &mut self,
        room: RoomHandle,
        user_id: roomframe_core::UserId,
        membership: Membership,
        now: I,
    ) -> Vec<RoomViewAction> {
        if !self.is_viewed_room(room.room_id()) {
            return vec![];
        }

        let mut actions = Vec::new();
        if user_id == self.identity.user_id {
            if self.room.is_none() {
                self.room = Some(room);
                actions.extend(self.room_loaded(now));
            }
            self.access.on_local_membership(Some(membership));
        }
        self.completions.schedule(now);
        actions.push(RoomViewAction::Render);
        actions
    }

    fn on_dispatch(&mut self, action: &DispatchAction) -> Vec<RoomViewAction> {
        match action {
            DispatchAction::MessageSent
            | DispatchAction::MessageSendFailed
            | DispatchAction::MessageSendCancelled => {
                let has_unsent = self.room.as_ref().is_some_and(|room| room.unsent_event_count() > 0);
                if has_unsent == self.has_unsent_messages {
                    return vec![];
                }
                self.has_unsent_messages = has_unsent;
                vec![RoomViewAction::Render]
            },
            DispatchAction::UserActivity
            | DispatchAction::LeaveRoom { .. }
            | DispatchAction::ViewNextRoom
            | DispatchAction::ViewRoomDirectory
            | DispatchAction::TimelineResize
            | DispatchAction::VideoFullscreen { .. } => vec![],
        }
    }

    /// The local user.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Mount options.
    pub fn options(&self) -> &RoomViewOptions {
        &self.options
    }

    /// The room object, if loaded.
    pub fn room(&self) -> Option<&RoomHandle> {
        self.room.as_ref()
    }

    /// Loaded room's ID. `None` while no room object is held.
    pub fn room_id(&self) -> Option<&RoomId> {
        self.room.as_ref().map(|room| room.room_id())
    }

    /// Room name for the header: the room's name, the invite's, or the address.
    pub fn room_name(&self) -> String {
        self.room
            .as_ref()
            .and_then(|room| room.name())
            .or_else(|| self.options.oob_data.as_ref().and_then(|oob| oob.name.clone()))
            .unwrap_or_else(|| self.options.address.to_string())
    }

    /// Access state.
    pub fn access_state(&self) -> &RoomAccessState {
        self.access.state()
    }

    /// Access machine, including pending join and policy flags.
    pub fn access(&self) -> &RoomAccess {
        &self.access
    }

    /// Outstanding join awaiting its room object.
    pub fn pending_join(&self) -> Option<&PendingJoinRequest> {
        self.access.pending_join()
    }

    /// Whether the room preview is still loading.
    pub fn room_loading(&self) -> bool {
        self.access.state().room_loading()
    }

    /// Derived capabilities.
    pub fn capabilities(&self) -> Capabilities {
        self.access.capabilities(self.room.is_some())
    }

    /// Unread tracker.
    pub fn unread(&self) -> &UnreadTracker {
        &self.unread
    }

    /// Search bar state.
    pub fn search(&self) -> &SearchPanel {
        &self.search
    }

    /// Search results panel rows, top to bottom.
    ///
    /// `room_name` resolves other rooms' names when searching every room.
    pub fn search_items<F>(&self, room_name: F) -> Vec<SearchItem>
    where
        F: Fn(&RoomId) -> Option<String>,
    {
        self.search.items(room_name)
    }

    /// Current completion candidates.
    pub fn completions(&self) -> &[CompletionCandidate] {
        self.completions.candidates()
    }

    /// How many completion recomputations have run.
    pub fn completion_recomputations(&self) -> u64 {
        self.completions.recomputations()
    }

    /// Event the view is focused on.
    pub fn focused_event(&self) -> Option<&EventId> {
        self.focused_event.as_ref()
    }

    /// Whether room settings are open.
    pub fn editing_settings(&self) -> bool {
        self.editing_settings
    }

    /// Whether a settings save is in flight.
    pub fn uploading_settings(&self) -> bool {
        self.uploading_settings
    }

    /// Whether the room has messages that failed to send.
    pub fn has_unsent_messages(&self) -> bool {
        self.has_unsent_messages
    }

    /// Whether the view has been unmounted.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Scroll position to restore when the room is shown again.
    pub fn scroll_state(&self, panel: &PanelScrollState) -> Option<SavedScrollState> {
        self.unread.scroll_state(panel)
    }
}
