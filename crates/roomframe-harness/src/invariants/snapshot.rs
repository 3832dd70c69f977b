//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture what a room view exposes at one point in time, plus the
//! history of values that invariants compare across time. Checks run against
//! snapshots rather than the live view so each check sees one consistent
//! state.

use std::{ops::Sub, time::Duration};

use roomframe_app::{Capabilities, JoinPreflight, RoomAccessState, RoomView};
use roomframe_core::RoomId;

/// Snapshot of one search session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSnapshot {
    /// Session generation.
    pub id: u64,
    /// A page is loading.
    pub in_progress: bool,
    /// Highlight strings in display order.
    pub highlights: Vec<String>,
    /// Number of results held.
    pub result_count: usize,
    /// Server-reported total, if any.
    pub total_count: Option<u64>,
    /// Cursor for older results.
    pub next_batch: Option<String>,
}

/// Snapshot of a room view's observable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    /// Access state.
    pub access_state: RoomAccessState,
    /// Room ID of an outstanding join awaiting its room object.
    pub pending_join: Option<RoomId>,
    /// Loaded room. `None` while no room object is held.
    pub room_id: Option<RoomId>,
    /// Derived capabilities.
    pub capabilities: Capabilities,
    /// Local user holds an invite.
    pub invited: bool,
    /// A join is waiting on the display name prompt.
    pub awaiting_display_name: bool,
    /// Live events since the user left the live edge.
    pub unread_count: u32,
    /// Viewport shows the newest events.
    pub at_live_edge: bool,
    /// Search bar shown.
    pub search_open: bool,
    /// Active search session.
    pub search: Option<SearchSnapshot>,
    /// View unmounted.
    pub torn_down: bool,
}

impl ViewSnapshot {
    /// Capture a view.
    pub fn from_view<I>(view: &RoomView<I>) -> Self
    where
        I: Copy + Ord + Sub<Output = Duration>,
    {
        let search = view.search().session().map(|session| SearchSnapshot {
            id: session.id().value(),
            in_progress: session.in_progress(),
            highlights: session.highlights().to_vec(),
            result_count: session.results().len(),
            total_count: session.count(),
            next_batch: session.next_batch().map(str::to_owned),
        });
        Self {
            access_state: view.access_state().clone(),
            pending_join: view.pending_join().map(|pending| pending.room_id.clone()),
            room_id: view.room_id().cloned(),
            capabilities: view.capabilities(),
            invited: view.access().is_invited(),
            awaiting_display_name: view.access().preflight() == JoinPreflight::AwaitingDisplayName,
            unread_count: view.unread().unread_count(),
            at_live_edge: view.unread().at_live_edge(),
            search_open: view.search().is_open(),
            search,
            torn_down: view.is_torn_down(),
        }
    }
}

/// Snapshot of the system: the current view plus what was observed before.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Latest view state. `None` before the first observation.
    pub view: Option<ViewSnapshot>,
    /// Access state names in the order they were observed, without repeats.
    pub access_history: Vec<&'static str>,
    /// Search generations in the order they were observed, without repeats.
    pub search_history: Vec<u64>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (nothing observed).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot of a single observation.
    pub fn from_view<I>(view: &RoomView<I>) -> Self
    where
        I: Copy + Ord + Sub<Output = Duration>,
    {
        let mut snapshot = Self::empty();
        snapshot.observe(ViewSnapshot::from_view(view));
        snapshot
    }

    /// Record a new observation, extending the histories.
    pub fn observe(&mut self, view: ViewSnapshot) {
        let state = view.access_state.name();
        if self.access_history.last() != Some(&state) {
            self.access_history.push(state);
        }
        if let Some(id) = view.search.as_ref().map(|search| search.id) {
            if self.search_history.last() != Some(&id) {
                self.search_history.push(id);
            }
        }
        self.view = Some(view);
    }
}
