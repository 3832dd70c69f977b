//! Unread tracking against a scrolling timeline.
//!
//! The rendering collaborator reports whether the viewport sits at the live
//! edge and where the read marker is relative to it. [`UnreadTracker`] turns
//! those reports plus live event arrivals into the unread counter and the
//! "unread messages above" bar.

use roomframe_core::EventId;

/// Unread counter, live-edge flag and read-marker visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadTracker {
    unread_count: u32,
    at_live_edge: bool,
    read_marker_above_viewport: bool,
}

impl Default for UnreadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UnreadTracker {
    /// A tracker following the live timeline with nothing unread.
    pub fn new() -> Self {
        Self { unread_count: 0, at_live_edge: true, read_marker_above_viewport: false }
    }

    /// Events received while scrolled away from the live edge.
    ///
    /// Only meaningful while [`Self::at_live_edge`] is `false`.
    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    /// Whether the viewport shows the newest events.
    pub fn at_live_edge(&self) -> bool {
        self.at_live_edge
    }

    /// Whether the read marker is scrolled above the viewport.
    pub fn read_marker_above_viewport(&self) -> bool {
        self.read_marker_above_viewport
    }

    /// Record a live arrival. Returns `true` if the counter changed.
    pub fn on_live_arrival(&mut self, from_local_user: bool) -> bool {
        if from_local_user || self.at_live_edge {
            return false;
        }
        self.unread_count = self.unread_count.saturating_add(1);
        true
    }

    /// Record a scroll report. Returns `true` if anything changed.
    pub fn set_at_live_edge(&mut self, at_live_edge: bool) -> bool {
        let changed = self.at_live_edge != at_live_edge || (at_live_edge && self.unread_count > 0);
        self.at_live_edge = at_live_edge;
        if at_live_edge {
            self.unread_count = 0;
        }
        changed
    }

    /// Record the read marker's signed offset from the top of the viewport.
    ///
    /// Edge-triggered: returns `true` only when the bar visibility flips.
    pub fn update_read_marker(&mut self, offset: i64) -> bool {
        let above = offset < 0;
        if above == self.read_marker_above_viewport {
            return false;
        }
        self.read_marker_above_viewport = above;
        true
    }

    /// Scroll position worth restoring when the room is shown again.
    ///
    /// Returns `None` when following the live timeline, so reopening the room
    /// jumps to the read marker instead of a stale position.
    pub fn scroll_state(&self, panel: &PanelScrollState) -> Option<SavedScrollState> {
        if self.at_live_edge || panel.stuck_at_bottom {
            return None;
        }
        let focused_event = panel.tracked_event.clone()?;
        Some(SavedScrollState { focused_event, pixel_offset: panel.pixel_offset })
    }
}

/// Scroll position as reported by the timeline panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelScrollState {
    /// Panel is pinned to the bottom without a tracked event.
    pub stuck_at_bottom: bool,
    /// Event the panel is tracking (usually the last fully visible one).
    pub tracked_event: Option<EventId>,
    /// Pixels scrolled down from the tracked event.
    pub pixel_offset: i64,
}

/// Scroll position saved for later restoration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedScrollState {
    /// Event to scroll back to.
    pub focused_event: EventId,
    /// Pixel offset from that event.
    pub pixel_offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrivals_at_live_edge_do_not_count() {
        let mut tracker = UnreadTracker::new();
        assert!(!tracker.on_live_arrival(false));
        assert_eq!(tracker.unread_count(), 0);
    }

    #[test]
    fn arrivals_while_scrolled_up_count_until_back_at_edge() {
        let mut tracker = UnreadTracker::new();
        tracker.set_at_live_edge(false);

        assert!(tracker.on_live_arrival(false));
        assert!(tracker.on_live_arrival(false));
        assert!(!tracker.on_live_arrival(true));
        assert_eq!(tracker.unread_count(), 2);

        assert!(tracker.set_at_live_edge(true));
        assert_eq!(tracker.unread_count(), 0);
    }

    #[test]
    fn read_marker_bar_is_edge_triggered() {
        let mut tracker = UnreadTracker::new();
        assert!(tracker.update_read_marker(-20));
        assert!(!tracker.update_read_marker(-5));
        assert!(tracker.read_marker_above_viewport());
        assert!(tracker.update_read_marker(0));
        assert!(!tracker.update_read_marker(300));
    }

    #[test]
    fn scroll_state_only_saved_when_scrolled_away() {
        let mut tracker = UnreadTracker::new();
        let panel = PanelScrollState {
            stuck_at_bottom: false,
            tracked_event: Some(EventId::from("$e")),
            pixel_offset: 42,
        };
        assert_eq!(tracker.scroll_state(&panel), None);

        tracker.set_at_live_edge(false);
        assert_eq!(
            tracker.scroll_state(&panel),
            Some(SavedScrollState { focused_event: EventId::from("$e"), pixel_offset: 42 })
        );

        let stuck = PanelScrollState { stuck_at_bottom: true, ..panel };
        assert_eq!(tracker.scroll_state(&stuck), None);
    }
}
