//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold while a room view runs.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify behavioral properties across every interleaving a scenario or a
//! property test produces.
//!
//! # Architecture
//!
//! The simulation driver extracts observable state from the view into a
//! [`SystemSnapshot`] on every render, then runs registered [`Invariant`]
//! checks against it. Violations fail the run with detailed context.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SystemSnapshot::from_view(&view);
//! registry.check_all(&snapshot)?;
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    HighlightsLongestFirst, JoinedHasRoom, NoRejoinAfterJoined, PendingJoinOnlyWhileJoining,
    RejectOnlyWhenInvited, SearchGenerationMonotonicity, SpeakOnlyWhenJoined,
    UnreadClearedAtLiveEdge,
};
pub use snapshot::{SearchSnapshot, SystemSnapshot, ViewSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Identifies an invariant in violation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantKind {
    /// See [`UnreadClearedAtLiveEdge`].
    UnreadClearedAtLiveEdge,
    /// See [`HighlightsLongestFirst`].
    HighlightsLongestFirst,
    /// See [`PendingJoinOnlyWhileJoining`].
    PendingJoinOnlyWhileJoining,
    /// See [`JoinedHasRoom`].
    JoinedHasRoom,
    /// See [`SpeakOnlyWhenJoined`].
    SpeakOnlyWhenJoined,
    /// See [`SearchGenerationMonotonicity`].
    SearchGenerationMonotonicity,
    /// See [`NoRejoinAfterJoined`].
    NoRejoinAfterJoined,
    /// See [`RejectOnlyWhenInvited`].
    RejectOnlyWhenInvited,
}

impl fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// The violated invariant.
    pub invariant: InvariantKind,
    /// Description of what went wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against system state.
///
/// Invariants are behavioral properties that must always hold.
/// They capture WHAT must be true, not specific test scenarios.
pub trait Invariant: Send + Sync {
    /// Which invariant this is, for error reporting.
    fn kind(&self) -> InvariantKind;

    /// Check the invariant against the current state.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
///
/// Collects multiple invariants and runs them all against system state.
/// Use [`InvariantRegistry::standard()`] for every room-view invariant.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.invariants.iter().map(|inv| inv.kind())).finish()
    }
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every standard room-view invariant.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(UnreadClearedAtLiveEdge);
        registry.add(HighlightsLongestFirst);
        registry.add(PendingJoinOnlyWhileJoining);
        registry.add(JoinedHasRoom);
        registry.add(SpeakOnlyWhenJoined);
        registry.add(SearchGenerationMonotonicity);
        registry.add(NoRejoinAfterJoined);
        registry.add(RejectOnlyWhenInvited);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking on the first failure.
    ///
    /// Use this in tests where you want immediate failure with context.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    #[allow(clippy::panic, reason = "test assertion helper")]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert!(!registry.is_empty());
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn empty_snapshot_passes_invariants() {
        let registry = InvariantRegistry::standard();
        assert!(registry.check_all(&SystemSnapshot::empty()).is_ok());
    }

    #[test]
    fn violations_name_their_invariant() {
        let violation = Violation {
            invariant: InvariantKind::JoinedHasRoom,
            message: "joined without a room object".into(),
        };
        assert_eq!(violation.to_string(), "JoinedHasRoom: joined without a room object");
    }
}
