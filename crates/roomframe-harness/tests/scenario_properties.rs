//! Property-based tests over whole simulated runs.
//!
//! Each case runs the production runtime through a seeded scenario with every
//! standard invariant checked on every render. A violation fails the run, so
//! an `Ok` report means the invariants held at each step.

use proptest::prelude::*;
use roomframe_app::RoomAccessState;
use roomframe_harness::{Scenario, ScenarioKind, ScenarioReport, StoreCall};

const ROOM: &str = "!sim:localhost";

fn run(scenario: &Scenario) -> Result<ScenarioReport, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| e.to_string())?;
    runtime.block_on(scenario.run()).map_err(|e| e.to_string())
}

fn kind_strategy() -> impl Strategy<Value = ScenarioKind> {
    prop_oneof![
        Just(ScenarioKind::Join),
        Just(ScenarioKind::DeferredJoin),
        Just(ScenarioKind::FirstJoin),
        Just(ScenarioKind::Invite),
        Just(ScenarioKind::PeekForbidden),
        Just(ScenarioKind::Search),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_churn_holds_invariants_and_replays(seed in any::<u64>()) {
        let mut scenario = Scenario::new(ScenarioKind::Churn, ROOM);
        scenario.seed = seed;

        let first = run(&scenario);
        prop_assert!(first.is_ok(), "seed {seed}: {:?}", first.as_ref().err());
        let second = run(&scenario);
        prop_assert!(second.is_ok(), "seed {seed}: {:?}", second.as_ref().err());

        if let (Ok(first), Ok(second)) = (first, second) {
            prop_assert_eq!(first.final_state, second.final_state);
            prop_assert_eq!(first.renders, second.renders);
            prop_assert_eq!(first.dispatched, second.dispatched);
        }
    }

    #[test]
    fn prop_scripted_scenarios_never_reject_without_invite(
        kind in kind_strategy(),
        guest in any::<bool>(),
    ) {
        let mut scenario = Scenario::new(kind, ROOM);
        scenario.guest = guest;

        let report = run(&scenario);
        prop_assert!(report.is_ok(), "{kind:?} guest={guest}: {:?}", report.as_ref().err());

        if let Ok(report) = report {
            // Only the invite story may issue a leave for rejection
            let left = report.calls.iter().any(|call| matches!(call, StoreCall::Leave(_)));
            prop_assert_eq!(left, kind == ScenarioKind::Invite);

            if let Some(state) = report.final_state {
                if matches!(state.access_state, RoomAccessState::Errored(_)) {
                    prop_assert_eq!(state.capabilities.can_reject, state.invited);
                }
            }
        }
    }
}
