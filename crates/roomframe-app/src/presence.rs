//! User activity pulse.
//!
//! Watches raw input signals (pointer movement, key presses) and publishes
//! [`DispatchAction::UserActivity`] at a much lower frequency than the input
//! itself. Skipped publishes are dropped, not deferred.

use std::{ops::Sub, time::Duration};

use roomframe_core::DispatchAction;

/// Minimum interval between two `user_activity` publishes.
pub const DEFAULT_ACTIVITY_INTERVAL: Duration = Duration::from_secs(1);

/// Throttled activity detector.
#[derive(Debug, Clone)]
pub struct UserActivity<I> {
    interval: Duration,
    last_activity_at: Option<I>,
    last_dispatch_at: Option<I>,
}

impl<I> UserActivity<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a detector that publishes at most once per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_activity_at: None, last_dispatch_at: None }
    }

    /// Record an input signal. Returns the action to publish, if any.
    ///
    /// The activity timestamp is always updated; a publish happens only if
    /// strictly more than the interval has passed since the last one.
    pub fn on_activity(&mut self, now: I) -> Option<DispatchAction> {
        self.last_activity_at = Some(now);

        let due = self.last_dispatch_at.is_none_or(|last| now - last > self.interval);
        if !due {
            return None;
        }

        self.last_dispatch_at = Some(now);
        Some(DispatchAction::UserActivity)
    }

    /// Time of the most recent input signal.
    pub fn last_activity_at(&self) -> Option<I> {
        self.last_activity_at
    }

    /// Time of the most recent publish.
    pub fn last_dispatch_at(&self) -> Option<I> {
        self.last_dispatch_at
    }
}

impl<I> Default for UserActivity<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn publishes_at_most_once_per_interval() {
        let t0 = Instant::now();
        let mut activity = UserActivity::default();

        let published: Vec<u64> = [0, 200, 900, 1200]
            .into_iter()
            .filter(|ms| activity.on_activity(t0 + Duration::from_millis(*ms)).is_some())
            .collect();

        assert_eq!(published, vec![0, 1200]);
    }

    #[test]
    fn activity_timestamp_tracks_suppressed_signals() {
        let t0 = Instant::now();
        let mut activity = UserActivity::default();

        activity.on_activity(t0);
        let suppressed = activity.on_activity(t0 + Duration::from_millis(300));

        assert_eq!(suppressed, None);
        assert_eq!(activity.last_activity_at(), Some(t0 + Duration::from_millis(300)));
        assert_eq!(activity.last_dispatch_at(), Some(t0));
    }

    #[test]
    fn exactly_one_interval_is_not_enough() {
        let t0 = Instant::now();
        let mut activity = UserActivity::default();

        activity.on_activity(t0);
        assert_eq!(activity.on_activity(t0 + DEFAULT_ACTIVITY_INTERVAL), None);
    }
}
