//! Trailing-edge debounce timer.
//!
//! The first trigger arms a deadline one window ahead; triggers that arrive
//! while armed reuse the pending deadline instead of pushing it back. The
//! owner polls with the current time and runs the debounced work once the
//! deadline has passed.

use std::{ops::Sub, time::Duration};

/// Coalesces bursts of triggers into a single trailing execution.
#[derive(Debug, Clone)]
pub struct Debouncer<I> {
    window: Duration,
    armed_at: Option<I>,
}

impl<I> Debouncer<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an idle debouncer.
    pub fn new(window: Duration) -> Self {
        Self { window, armed_at: None }
    }

    /// Coalescing window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a trigger. Returns `true` if this trigger armed the timer.
    pub fn trigger(&mut self, now: I) -> bool {
        if self.armed_at.is_some() {
            return false;
        }
        self.armed_at = Some(now);
        true
    }

    /// Whether an execution is pending.
    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// Fire if the window has elapsed. Returns `true` exactly once per
    /// armed window.
    pub fn poll(&mut self, now: I) -> bool {
        match self.armed_at {
            Some(armed_at) if now - armed_at >= self.window => {
                self.armed_at = None;
                true
            },
            _ => false,
        }
    }

    /// Time left until the pending execution. `None` when idle.
    pub fn remaining(&self, now: I) -> Option<Duration> {
        self.armed_at.map(|armed_at| self.window.saturating_sub(now - armed_at))
    }

    /// Drop any pending execution.
    pub fn cancel(&mut self) {
        self.armed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn burst_collapses_into_one_execution() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        assert!(debouncer.trigger(t0));
        for ms in [10, 100, 250, 499] {
            assert!(!debouncer.trigger(t0 + Duration::from_millis(ms)));
            assert!(!debouncer.poll(t0 + Duration::from_millis(ms)));
        }

        assert!(debouncer.poll(t0 + WINDOW));
        assert!(!debouncer.poll(t0 + WINDOW * 2));
    }

    #[test]
    fn deadline_is_not_pushed_back() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.trigger(t0);
        debouncer.trigger(t0 + Duration::from_millis(400));

        assert_eq!(
            debouncer.remaining(t0 + Duration::from_millis(400)),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn rearms_after_firing() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.trigger(t0);
        assert!(debouncer.poll(t0 + WINDOW));
        assert!(!debouncer.is_armed());
        assert_eq!(debouncer.remaining(t0 + WINDOW), None);

        assert!(debouncer.trigger(t0 + WINDOW));
        assert!(debouncer.is_armed());
    }

    #[test]
    fn cancel_drops_pending_execution() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.trigger(t0);
        debouncer.cancel();
        assert!(!debouncer.poll(t0 + WINDOW));
    }
}
