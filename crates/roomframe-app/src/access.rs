//! Room access state machine.
//!
//! Decides whether the local user is previewing, invited to, joining, or a
//! member of the viewed room, and reconciles join calls with membership
//! notifications that may race them.
//!
//! # State Machine
//!
//! ```text
//!               peek ok                 membership=invite
//! ┌────────────┐───────>┌─────────┐<──────────────────────>┌─────────┐
//! │ Unresolved │        │ Peeking │                        │ Invited │
//! └────────────┘        └─────────┘                        └─────────┘
//!       │ join               │ join          join │            │ reject
//!       └────────────────────┴──────┬─────────────┘            ↓
//!                                   ↓                    ┌───────────┐
//!                              ┌─────────┐               │ Rejecting │
//!                              │ Joining │               └───────────┘
//!                              └─────────┘                 │ ok    │ err
//!               membership=join │     │ err                ↓       ↓
//!                               ↓     ↓              Unresolved  Errored
//!                         ┌────────┐ ┌─────────┐
//!                         │ Joined │ │ Errored │──> Joining / Rejecting (retry)
//!                         └────────┘ └─────────┘
//! ```
//!
//! A membership notification reporting local "join" while joining always
//! wins, whichever of the join call and the notification arrives first.

use std::fmt;

use roomframe_core::{
    ErrorClass, Membership, Room, RoomId, SessionError,
    room::{GUEST_ACCESS_EVENT, HISTORY_VISIBILITY_EVENT},
};

use crate::{Notification, ViewError};

/// Outcome of the initial room preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeekStatus {
    /// No preview attempted (or the view was reset).
    #[default]
    Idle,
    /// Preview request in flight.
    Pending,
    /// The room cannot be previewed (guest access forbidden).
    Unavailable,
}

/// Operation whose failure put the machine in [`RoomAccessState::Errored`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOperation {
    /// Joining the room.
    Join,
    /// Rejecting an invite.
    Reject,
}

/// A failed join or reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessError {
    /// What failed.
    pub operation: AccessOperation,
    /// Why.
    pub error: SessionError,
}

/// Access state of the viewed room. Exactly one value at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAccessState {
    /// No room object yet.
    Unresolved {
        /// Preview progress.
        peek: PeekStatus,
    },
    /// Room object present, local user is not a member.
    Peeking,
    /// Local user is invited.
    Invited,
    /// Join call issued, membership not yet confirmed.
    Joining,
    /// Local user is a member.
    Joined,
    /// Leave call issued to reject an invite.
    Rejecting,
    /// The last join or reject failed. Retrying is allowed.
    Errored(AccessError),
}

impl RoomAccessState {
    /// Short state name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unresolved { .. } => "Unresolved",
            Self::Peeking => "Peeking",
            Self::Invited => "Invited",
            Self::Joining => "Joining",
            Self::Joined => "Joined",
            Self::Rejecting => "Rejecting",
            Self::Errored(_) => "Errored",
        }
    }

    /// Whether a preview or the room object is still loading.
    pub fn room_loading(&self) -> bool {
        matches!(self, Self::Unresolved { peek: PeekStatus::Pending })
    }
}

impl fmt::Display for RoomAccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Join issued, room object not materialized yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJoinRequest {
    /// Room ID the join call resolved with.
    pub room_id: RoomId,
}

/// Room policy flags read from state events.
///
/// Each flag only changes when its state event is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomPolicy {
    /// Guest access policy is `can_join`.
    pub guests_can_join: bool,
    /// History visibility is `world_readable`.
    pub can_peek: bool,
}

impl RoomPolicy {
    /// Re-read the policy events. Returns `true` if a flag changed.
    pub fn refresh(&mut self, room: &dyn Room) -> bool {
        let before = *self;
        if let Some(content) = room.state_event(GUEST_ACCESS_EVENT, "") {
            self.guests_can_join = content.get("guest_access").and_then(|v| v.as_str()) == Some("can_join");
        }
        if let Some(content) = room.state_event(HISTORY_VISIBILITY_EVENT, "") {
            self.can_peek =
                content.get("history_visibility").and_then(|v| v.as_str()) == Some("world_readable");
        }
        before != *self
    }
}

/// Actions available to the user in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// The composer is enabled.
    pub can_speak: bool,
    /// The search bar may be used.
    pub can_search: bool,
    /// A join button is shown.
    pub can_join: bool,
    /// A reject button is shown.
    pub can_reject: bool,
    /// The timeline can be previewed.
    pub can_peek: bool,
    /// Guests may join.
    pub guests_can_join: bool,
}

/// Steps a join takes before the join call is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinPreflight {
    /// Nothing to do before joining.
    #[default]
    Idle,
    /// Looking up whether the user still needs a display name.
    CheckingProfile,
    /// Waiting for the user to choose a display name.
    AwaitingDisplayName,
    /// Saving the chosen display name.
    SavingDisplayName,
}

/// Access state plus the pending-join record and policy flags.
#[derive(Debug, Clone)]
pub struct RoomAccess {
    address: RoomId,
    state: RoomAccessState,
    pending_join: Option<PendingJoinRequest>,
    ever_joined: bool,
    /// The local user holds an invite, so rejecting is meaningful.
    invited: bool,
    preflight: JoinPreflight,
    /// State to return to if the user backs out of a join.
    joining_from: Option<RoomAccessState>,
    policy: RoomPolicy,
}

impl RoomAccess {
    /// Fresh machine for a room address.
    pub fn new(address: RoomId) -> Self {
        Self {
            address,
            state: RoomAccessState::Unresolved { peek: PeekStatus::Idle },
            pending_join: None,
            ever_joined: false,
            invited: false,
            preflight: JoinPreflight::Idle,
            joining_from: None,
            policy: RoomPolicy::default(),
        }
    }

    /// Room ID or alias the view was mounted with.
    pub fn address(&self) -> &RoomId {
        &self.address
    }

    /// Current state.
    pub fn state(&self) -> &RoomAccessState {
        &self.state
    }

    /// Outstanding join awaiting its room object.
    pub fn pending_join(&self) -> Option<&PendingJoinRequest> {
        self.pending_join.as_ref()
    }

    /// Whether [`RoomAccessState::Joined`] has ever been reached.
    pub fn ever_joined(&self) -> bool {
        self.ever_joined
    }

    /// Policy flags.
    pub fn policy(&self) -> RoomPolicy {
        self.policy
    }

    /// Mutable policy flags, for refreshing from room state.
    pub fn policy_mut(&mut self) -> &mut RoomPolicy {
        &mut self.policy
    }

    /// Whether `room_id` names the room this machine tracks.
    pub fn matches(&self, room_id: &RoomId, handle_id: Option<&RoomId>) -> bool {
        room_id == &self.address
            || handle_id == Some(room_id)
            || self.pending_join.as_ref().is_some_and(|p| &p.room_id == room_id)
    }

    /// Derived capabilities for the rendering collaborator.
    pub fn capabilities(&self, has_room: bool) -> Capabilities {
        let joined = self.state == RoomAccessState::Joined;
        Capabilities {
            can_speak: joined,
            can_search: has_room && matches!(self.state, RoomAccessState::Joined | RoomAccessState::Peeking),
            can_join: self.check_join().is_ok(),
            can_reject: self.check_reject().is_ok(),
            can_peek: self.policy.can_peek,
            guests_can_join: self.policy.guests_can_join,
        }
    }

    fn transition(&mut self, next: RoomAccessState) {
        if self.state == next {
            return;
        }
        tracing::info!(room = %self.address, from = ?self.state, to = ?next, "room access transition");
        if next == RoomAccessState::Joined {
            self.ever_joined = true;
        }
        if self.state == RoomAccessState::Joining {
            self.preflight = JoinPreflight::Idle;
            self.joining_from = None;
        }
        self.state = next;
    }

    /// A preview request was issued.
    pub fn begin_peek(&mut self) {
        self.transition(RoomAccessState::Unresolved { peek: PeekStatus::Pending });
    }

    /// The preview could not be started because the room is inaccessible.
    pub fn peek_unavailable(&mut self) {
        if let RoomAccessState::Unresolved { .. } = self.state {
            self.transition(RoomAccessState::Unresolved { peek: PeekStatus::Unavailable });
        }
    }

    /// The preview is no longer pending (room loaded or peek abandoned).
    pub fn peek_settled(&mut self) {
        if self.state.room_loading() {
            self.transition(RoomAccessState::Unresolved { peek: PeekStatus::Idle });
        }
    }

    /// Apply the local user's membership as read from the room object.
    ///
    /// Called when a room handle becomes available and on every membership
    /// notification concerning the local user.
    pub fn on_local_membership(&mut self, membership: Option<Membership>) {
        let joined = membership == Some(Membership::Join);
        if self.state != RoomAccessState::Rejecting {
            self.invited = membership == Some(Membership::Invite);
        }
        match &self.state {
            RoomAccessState::Joining => {
                if joined {
                    self.pending_join = None;
                    self.transition(RoomAccessState::Joined);
                }
            },
            RoomAccessState::Rejecting => {},
            RoomAccessState::Errored(AccessError { operation: AccessOperation::Reject, .. }) => {
                if joined {
                    self.transition(RoomAccessState::Joined);
                }
            },
            RoomAccessState::Errored(AccessError { operation: AccessOperation::Join, .. }) => {
                // A reload that knows no membership leaves the failure visible
                if membership.is_some() {
                    self.transition(neutral_state(membership));
                }
            },
            RoomAccessState::Joined => {
                if matches!(membership, Some(Membership::Leave | Membership::Ban)) {
                    self.transition(RoomAccessState::Peeking);
                }
            },
            RoomAccessState::Unresolved { .. }
            | RoomAccessState::Peeking
            | RoomAccessState::Invited => self.transition(neutral_state(membership)),
        }
    }

    fn check_join(&self) -> Result<(), ViewError> {
        if self.ever_joined {
            return Err(ViewError::InvalidState { state: self.state.name(), operation: "join" });
        }
        match self.state {
            RoomAccessState::Unresolved { .. }
            | RoomAccessState::Peeking
            | RoomAccessState::Invited
            | RoomAccessState::Errored(_) => Ok(()),
            RoomAccessState::Joining | RoomAccessState::Joined | RoomAccessState::Rejecting => {
                Err(ViewError::InvalidState { state: self.state.name(), operation: "join" })
            },
        }
    }

    fn check_reject(&self) -> Result<(), ViewError> {
        match self.state {
            RoomAccessState::Invited => Ok(()),
            // A failed operation only leaves something to reject while the invite stands
            RoomAccessState::Errored(_) if self.invited => Ok(()),
            _ => Err(ViewError::InvalidState { state: self.state.name(), operation: "reject" }),
        }
    }

    /// Whether the local user currently holds an invite.
    pub fn is_invited(&self) -> bool {
        self.invited
    }

    /// The user asked to join.
    pub fn begin_join(&mut self) -> Result<(), ViewError> {
        self.check_join()?;
        self.pending_join = None;
        let from = self.state.clone();
        self.transition(RoomAccessState::Joining);
        self.joining_from = Some(from);
        Ok(())
    }

    /// Where the join stands before its call goes out.
    pub fn preflight(&self) -> JoinPreflight {
        self.preflight
    }

    /// Move the join preflight from `from` to `to`.
    ///
    /// Returns `false`, changing nothing, if the view is not joining or the
    /// preflight has moved on.
    pub fn advance_preflight(&mut self, from: JoinPreflight, to: JoinPreflight) -> bool {
        if self.state != RoomAccessState::Joining || self.preflight != from {
            return false;
        }
        self.preflight = to;
        true
    }

    /// The user dismissed the display name prompt. Returns `true` if that
    /// abandoned the join.
    pub fn join_cancelled(&mut self) -> bool {
        if self.state != RoomAccessState::Joining
            || self.preflight != JoinPreflight::AwaitingDisplayName
        {
            return false;
        }
        // Membership may have changed while the prompt was up
        let previous = match self.joining_from.take() {
            _ if self.invited => RoomAccessState::Invited,
            Some(RoomAccessState::Invited) | None => RoomAccessState::Peeking,
            Some(previous) => previous,
        };
        tracing::debug!(room = %self.address, "join abandoned at display name prompt");
        self.transition(previous);
        true
    }

    /// The join call resolved.
    ///
    /// `local_membership` is `None` when the store has not materialized the
    /// room yet, in which case a [`PendingJoinRequest`] is recorded.
    pub fn join_resolved(&mut self, room_id: RoomId, local_membership: Option<Option<Membership>>) {
        if self.state != RoomAccessState::Joining {
            tracing::debug!(room = %room_id, state = %self.state, "join resolved after state moved on");
            return;
        }
        match local_membership {
            Some(membership) => self.on_local_membership(membership),
            None => {
                tracing::debug!(room = %room_id, "joined room not materialized yet");
                self.pending_join = Some(PendingJoinRequest { room_id });
            },
        }
    }

    /// The join call failed. Returns `true` if the failure was applied.
    pub fn join_failed(&mut self, error: SessionError) -> bool {
        if self.state != RoomAccessState::Joining {
            return false;
        }
        self.pending_join = None;
        self.transition(RoomAccessState::Errored(AccessError { operation: AccessOperation::Join, error }));
        true
    }

    /// A room object appeared. Returns `true` if it completes a pending join.
    pub fn room_materialized(&mut self, room_id: &RoomId) -> bool {
        let completes = self.pending_join.as_ref().is_some_and(|p| &p.room_id == room_id);
        if completes {
            self.pending_join = None;
        }
        completes
    }

    /// The user asked to reject the invite.
    pub fn begin_reject(&mut self) -> Result<(), ViewError> {
        self.check_reject()?;
        self.transition(RoomAccessState::Rejecting);
        Ok(())
    }

    /// The leave call for a reject resolved.
    pub fn reject_finished(&mut self, result: Result<(), SessionError>) -> bool {
        if self.state != RoomAccessState::Rejecting {
            return false;
        }
        let next = match result {
            Ok(()) => {
                self.invited = false;
                RoomAccessState::Unresolved { peek: PeekStatus::Idle }
            },
            Err(error) => {
                RoomAccessState::Errored(AccessError { operation: AccessOperation::Reject, error })
            },
        };
        self.transition(next);
        true
    }

    /// Check that the user may leave.
    pub fn check_leave(&self) -> Result<(), ViewError> {
        match self.state {
            RoomAccessState::Joined => Ok(()),
            _ => Err(ViewError::InvalidState { state: self.state.name(), operation: "leave" }),
        }
    }
}

/// State implied by local membership outside of an operation in flight.
fn neutral_state(membership: Option<Membership>) -> RoomAccessState {
    match membership {
        Some(Membership::Join) => RoomAccessState::Joined,
        Some(Membership::Invite) => RoomAccessState::Invited,
        _ => RoomAccessState::Peeking,
    }
}

const GUEST_JOIN_DESCRIPTION: &str =
    "This room is private or inaccessible to guests. You may be able to join if you register.";

/// User-facing notification for a failed join.
pub fn join_failure_notification(error: &SessionError, is_guest: bool) -> Notification {
    let guest_refused = match error {
        SessionError::GuestAccessForbidden => true,
        SessionError::Forbidden { .. } => is_guest,
        _ => false,
    };
    if guest_refused {
        return Notification::register_required("Failed to join the room", GUEST_JOIN_DESCRIPTION);
    }

    let description = match error.class() {
        ErrorClass::Unjoinable => "It is not currently possible to re-join an empty room.".to_string(),
        ErrorClass::AccessDenied | ErrorClass::Transient => error.to_string(),
    };
    Notification::error("Failed to join room", description)
}

/// User-facing notification for a failed invite rejection.
pub fn reject_failure_notification(error: &SessionError) -> Notification {
    Notification::error("Failed to reject invite", error.to_string())
}

/// User-facing notification for a failed forget.
pub fn forget_failure_notification(error: &SessionError) -> Notification {
    let code = error.errcode().unwrap_or("unknown error code");
    Notification::error("Error", format!("Failed to forget room ({code})"))
}
