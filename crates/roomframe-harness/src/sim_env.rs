//! Virtual-clock environment.
//!
//! `SimEnv` implements [`Environment`] with a clock that only moves when
//! something sleeps or a test advances it. Sleeping completes immediately
//! after jumping the clock forward, so debounce windows elapse without real
//! waiting and every run sees the same timeline.
//!
//! The runtime polls its sleep branch last, which means the clock only jumps
//! once every other input source is idle.

use std::{
    ops::{Add, Sub},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use roomframe_core::Environment;

/// Point on the virtual timeline, measured from the environment's creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Instant at `elapsed` after the start of the simulation.
    pub fn from_elapsed(elapsed: Duration) -> Self {
        Self(elapsed)
    }

    /// Time since the start of the simulation.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }
}

/// Deterministic environment with a shared virtual clock.
///
/// Clones share the clock.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    elapsed_micros: Arc<AtomicU64>,
}

impl SimEnv {
    /// Create an environment at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.elapsed_micros.fetch_add(micros, Ordering::SeqCst);
    }

    /// Time since the environment was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.elapsed_micros.load(Ordering::SeqCst))
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> Self::Instant {
        SimInstant(self.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let env = self.clone();
        async move { env.advance(duration) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let clone = env.clone();
        env.advance(Duration::from_millis(250));

        assert_eq!(clone.now().elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn instants_subtract_without_underflow() {
        let early = SimInstant::from_elapsed(Duration::from_millis(10));
        let late = early + Duration::from_millis(40);

        assert_eq!(late - early, Duration::from_millis(40));
        assert_eq!(early - late, Duration::ZERO);
    }

    #[tokio::test]
    async fn sleep_jumps_the_clock() {
        let env = SimEnv::new();
        let before = env.now();
        env.sleep(Duration::from_millis(500)).await;

        assert_eq!(env.now() - before, Duration::from_millis(500));
    }
}
