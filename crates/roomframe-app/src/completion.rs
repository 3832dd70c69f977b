//! Name and command completion candidates.
//!
//! Membership churn (initial sync of a large room in particular) arrives in
//! bursts. [`CompletionList`] coalesces each burst into one trailing
//! recomputation through a [`Debouncer`].

use std::{ops::Sub, time::Duration};

use roomframe_core::{Room, UserId};

use crate::Debouncer;

/// Default coalescing window for completion recomputation.
pub const DEFAULT_COMPLETION_DEBOUNCE: Duration = Duration::from_millis(500);

/// A completion entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompletionCandidate {
    /// A joined room member.
    Member {
        /// Member's user ID.
        user_id: UserId,
        /// Display name, if set.
        display_name: Option<String>,
    },
    /// A slash command.
    Command {
        /// Command including the leading slash.
        name: String,
    },
}

/// Debounced candidate list for the composer.
#[derive(Debug, Clone)]
pub struct CompletionList<I> {
    debouncer: Debouncer<I>,
    candidates: Vec<CompletionCandidate>,
    recomputations: u64,
}

impl<I> CompletionList<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an empty list with the given coalescing window.
    pub fn new(window: Duration) -> Self {
        Self { debouncer: Debouncer::new(window), candidates: Vec::new(), recomputations: 0 }
    }

    /// Current candidates: members first, then commands.
    pub fn candidates(&self) -> &[CompletionCandidate] {
        &self.candidates
    }

    /// How many recomputations have run.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Whether a recomputation is scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.debouncer.is_armed()
    }

    /// Request a recomputation. Requests within one window coalesce.
    pub fn schedule(&mut self, now: I) {
        self.debouncer.trigger(now);
    }

    /// Time left before the scheduled recomputation.
    pub fn remaining(&self, now: I) -> Option<Duration> {
        self.debouncer.remaining(now)
    }

    /// Run the scheduled recomputation if its window has elapsed.
    ///
    /// Reads the room as it is now, not as it was when the burst started.
    /// Returns the new list if one was computed.
    pub fn poll(
        &mut self,
        now: I,
        room: Option<&dyn Room>,
        me: &UserId,
        commands: &[String],
    ) -> Option<&[CompletionCandidate]> {
        if !self.debouncer.poll(now) {
            return None;
        }

        let members = room.map(|room| room.joined_members()).unwrap_or_default();
        self.candidates = members
            .into_iter()
            .filter(|member| &member.user_id != me)
            .map(|member| CompletionCandidate::Member {
                user_id: member.user_id,
                display_name: member.display_name,
            })
            .chain(commands.iter().map(|name| CompletionCandidate::Command { name: name.clone() }))
            .collect();
        self.recomputations += 1;

        tracing::debug!(count = self.candidates.len(), "recomputed completion candidates");
        Some(&self.candidates)
    }

    /// Drop any scheduled recomputation.
    pub fn cancel(&mut self) {
        self.debouncer.cancel();
    }
}
