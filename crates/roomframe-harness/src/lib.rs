//! Deterministic simulation harness for roomframe room views.
//!
//! Simulated implementations of the session store, the presentation driver,
//! and the clock, so the production [`roomframe_app::Runtime`] can be driven
//! through scripted scenarios with reproducible timing.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] to check every
//! render a [`SimDriver`] receives.
//!
//! # Scenarios
//!
//! The `scenario` module bundles the pieces into ready-made setups used by
//! the `roomframe-sim` binary and the integration tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod scenario;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_room;
pub mod sim_store;

pub use invariants::{
    HighlightsLongestFirst, Invariant, InvariantKind, InvariantRegistry, InvariantResult,
    JoinedHasRoom, NoRejoinAfterJoined, PendingJoinOnlyWhileJoining, SearchGenerationMonotonicity,
    SearchSnapshot, SpeakOnlyWhenJoined, SystemSnapshot, UnreadClearedAtLiveEdge, ViewSnapshot,
    Violation,
};
pub use scenario::{Scenario, ScenarioKind, ScenarioReport, SimRuntime};
pub use sim_driver::{SimDriver, SimDriverError, SimDriverHandle};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_room::SimRoom;
pub use sim_store::{JoinBehavior, SimSessionStore, StoreCall};
