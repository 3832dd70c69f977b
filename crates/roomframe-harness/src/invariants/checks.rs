//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use roomframe_app::RoomAccessState;

use super::{Invariant, InvariantKind, InvariantResult, SystemSnapshot, Violation};

/// The unread counter is zero whenever the viewport is at the live edge.
pub struct UnreadClearedAtLiveEdge;

impl Invariant for UnreadClearedAtLiveEdge {
    fn kind(&self) -> InvariantKind {
        InvariantKind::UnreadClearedAtLiveEdge
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(view) = &state.view else { return Ok(()) };
        if view.at_live_edge && view.unread_count != 0 {
            return Err(Violation {
                invariant: self.kind(),
                message: format!("{} unread events while at the live edge", view.unread_count),
            });
        }
        Ok(())
    }
}

/// Search highlights are unique and ordered longest first.
///
/// Longer strings must be highlighted before their substrings or the shorter
/// match would split them.
pub struct HighlightsLongestFirst;

impl Invariant for HighlightsLongestFirst {
    fn kind(&self) -> InvariantKind {
        InvariantKind::HighlightsLongestFirst
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(search) = state.view.as_ref().and_then(|view| view.search.as_ref()) else {
            return Ok(());
        };

        let mut seen = HashSet::new();
        if let Some(duplicate) = search.highlights.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(Violation {
                invariant: self.kind(),
                message: format!("search {}: duplicate highlight {duplicate:?}", search.id),
            });
        }

        for pair in search.highlights.windows(2) {
            if let [longer, shorter] = pair {
                if longer.chars().count() < shorter.chars().count() {
                    return Err(Violation {
                        invariant: self.kind(),
                        message: format!(
                            "search {}: {longer:?} ordered before longer {shorter:?}",
                            search.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A pending join only exists while the view is joining.
pub struct PendingJoinOnlyWhileJoining;

impl Invariant for PendingJoinOnlyWhileJoining {
    fn kind(&self) -> InvariantKind {
        InvariantKind::PendingJoinOnlyWhileJoining
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(view) = &state.view else { return Ok(()) };
        match &view.pending_join {
            Some(room_id) if view.access_state != RoomAccessState::Joining => Err(Violation {
                invariant: self.kind(),
                message: format!("pending join for {room_id} in state {}", view.access_state),
            }),
            _ => Ok(()),
        }
    }
}

/// A joined view always holds its room object.
pub struct JoinedHasRoom;

impl Invariant for JoinedHasRoom {
    fn kind(&self) -> InvariantKind {
        InvariantKind::JoinedHasRoom
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(view) = &state.view else { return Ok(()) };
        if view.access_state == RoomAccessState::Joined && view.room_id.is_none() {
            return Err(Violation {
                invariant: self.kind(),
                message: "joined without a room object".to_owned(),
            });
        }
        Ok(())
    }
}

/// The composer is enabled exactly when the local user is joined.
pub struct SpeakOnlyWhenJoined;

impl Invariant for SpeakOnlyWhenJoined {
    fn kind(&self) -> InvariantKind {
        InvariantKind::SpeakOnlyWhenJoined
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(view) = &state.view else { return Ok(()) };
        let joined = view.access_state == RoomAccessState::Joined;
        if view.capabilities.can_speak != joined {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "can_speak={} in state {}",
                    view.capabilities.can_speak, view.access_state
                ),
            });
        }
        Ok(())
    }
}

/// Search generations never decrease.
///
/// A lower generation showing up after a higher one means a stale response
/// replaced the live session.
pub struct SearchGenerationMonotonicity;

impl Invariant for SearchGenerationMonotonicity {
    fn kind(&self) -> InvariantKind {
        InvariantKind::SearchGenerationMonotonicity
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for pair in state.search_history.windows(2) {
            if let [before, after] = pair {
                if after < before {
                    return Err(Violation {
                        invariant: self.kind(),
                        message: format!("search generation went {before} → {after}"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Once joined, the view never starts another join.
pub struct NoRejoinAfterJoined;

impl Invariant for NoRejoinAfterJoined {
    fn kind(&self) -> InvariantKind {
        InvariantKind::NoRejoinAfterJoined
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let first_joined = state.access_history.iter().position(|name| *name == "Joined");
        let Some(first_joined) = first_joined else { return Ok(()) };
        if state.access_history.iter().skip(first_joined).any(|name| *name == "Joining") {
            return Err(Violation {
                invariant: self.kind(),
                message: format!("joining again after joined: {:?}", state.access_history),
            });
        }
        Ok(())
    }
}

/// Rejecting is only offered while the local user holds an invite.
///
/// A failed join from a preview leaves the view errored with nothing to
/// reject.
pub struct RejectOnlyWhenInvited;

impl Invariant for RejectOnlyWhenInvited {
    fn kind(&self) -> InvariantKind {
        InvariantKind::RejectOnlyWhenInvited
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(view) = &state.view else { return Ok(()) };
        if view.capabilities.can_reject && !view.invited {
            return Err(Violation {
                invariant: self.kind(),
                message: format!("reject offered without an invite in state {}", view.access_state),
            });
        }
        Ok(())
    }
}
