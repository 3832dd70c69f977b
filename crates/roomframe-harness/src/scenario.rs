//! Ready-made simulation scenarios.
//!
//! A [`Scenario`] wires a [`SimSessionStore`], a [`SimDriver`] checking every
//! standard invariant, and a [`SimEnv`] into the production runtime, then
//! drives one room view through a scripted story. Scenarios that need to
//! react to the view (e.g. materializing a deferred join once the view is
//! waiting for it) run their script alongside the runtime on the same task.

use std::future::Future;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use roomframe_app::{
    Intent, Notification, RoomAccessState, RoomViewConfig, RoomViewOptions, Runtime, RuntimeError,
    SearchScope,
};
use roomframe_core::{
    DispatchAction, DispatchBus, Membership, RoomId, SearchHit, SearchResponse, SessionError,
    UserId,
};

use crate::{
    InvariantRegistry, JoinBehavior, SimDriver, SimDriverError, SimDriverHandle, SimEnv,
    SimSessionStore, StoreCall, ViewSnapshot,
};

/// The production runtime over simulated collaborators.
pub type SimRuntime = Runtime<SimDriver, SimSessionStore, SimEnv>;

/// Number of random steps in a churn run.
const CHURN_STEPS: u32 = 64;

/// Number of other members taking part in churn.
const CHURN_PEERS: u32 = 4;

/// Story to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// Preview a public room, then join it.
    Join,
    /// Join a room whose object only shows up after the join call resolves.
    DeferredJoin,
    /// First join of an account without a display name: choose one, then join.
    FirstJoin,
    /// Reject an invite.
    Invite,
    /// Open a room that cannot be previewed, then fail to join as a guest.
    PeekForbidden,
    /// Search the room and page through older results.
    Search,
    /// Random membership changes, live messages, and scrolling.
    Churn,
}

/// A configured scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Story to run.
    pub kind: ScenarioKind,
    /// Room to open.
    pub room: RoomId,
    /// Local user.
    pub user: UserId,
    /// Whether the local user is a guest.
    pub guest: bool,
    /// Seed for randomized scenarios.
    pub seed: u64,
}

/// What a scenario run produced.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// View state at the last render.
    pub final_state: Option<ViewSnapshot>,
    /// Number of renders.
    pub renders: usize,
    /// Notifications shown to the user.
    pub notifications: Vec<Notification>,
    /// Store calls, in order.
    pub calls: Vec<StoreCall>,
    /// Actions the view published on the dispatch bus.
    pub dispatched: Vec<DispatchAction>,
}

impl Scenario {
    /// Scenario for `room` with a registered local user and seed zero.
    pub fn new(kind: ScenarioKind, room: impl Into<RoomId>) -> Self {
        Self { kind, room: room.into(), user: UserId::from("@sim:localhost"), guest: false, seed: 0 }
    }

    /// Run the scenario to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if an invariant is violated or the view hits a fatal
    /// error.
    pub async fn run(&self) -> Result<ScenarioReport, RuntimeError<SimDriverError>> {
        let (store, notifications) = SimSessionStore::new(self.user.clone(), self.guest);
        let bus = DispatchBus::new();
        let (_observer, mut dispatched) = bus.register();
        let (driver, mut handle) = SimDriver::new();
        let driver = driver.with_invariants(InvariantRegistry::standard());

        self.prepare(&store);

        let runtime = SimRuntime::new(
            driver,
            store.clone(),
            SimEnv::new(),
            bus,
            notifications,
            RoomViewOptions::new(self.room.clone()),
            RoomViewConfig::default(),
        );

        tracing::info!(kind = ?self.kind, room = %self.room, seed = self.seed, "running scenario");
        drive(runtime, self.script(&store, &mut handle)).await?;

        let mut actions = Vec::new();
        while let Ok(dispatch) = dispatched.try_recv() {
            actions.push(dispatch.action);
        }
        Ok(ScenarioReport {
            final_state: handle.last_render(),
            renders: handle.renders().len(),
            notifications: handle.notifications(),
            calls: store.calls(),
            dispatched: actions,
        })
    }

    fn prepare(&self, store: &SimSessionStore) {
        let peer = UserId::from("@peer0:localhost");
        match self.kind {
            ScenarioKind::Join => {
                let room = store.allow_peek(self.room.clone());
                room.set_name("Simulation");
                room.set_membership(&peer, Membership::Join);
            },
            ScenarioKind::DeferredJoin => {
                store.set_join_behavior(JoinBehavior::Deferred);
            },
            ScenarioKind::FirstJoin => {
                store.allow_peek(self.room.clone()).set_membership(&peer, Membership::Join);
                store.set_profile_name(None);
            },
            ScenarioKind::Invite => {
                let room = store.add_room(self.room.clone());
                room.set_membership(&peer, Membership::Join);
                room.set_membership(&self.user, Membership::Invite);
            },
            ScenarioKind::PeekForbidden => {
                store.set_join_behavior(JoinBehavior::Fail(SessionError::GuestAccessForbidden));
            },
            ScenarioKind::Search => {
                let room = store.add_room(self.room.clone());
                room.set_membership(&self.user, Membership::Join);
                let hit = |n: u32| SearchHit {
                    event_id: format!("$hit{n}").into(),
                    room_id: self.room.clone(),
                    sender: peer.clone(),
                    body: format!("hello number {n}"),
                };
                store.set_search_result(
                    "hello",
                    Ok(SearchResponse {
                        results: vec![hit(3), hit(2)],
                        highlights: vec!["hello".into()],
                        next_batch: Some("page-2".into()),
                        count: Some(3),
                    }),
                );
                store.set_search_page(
                    "page-2",
                    Ok(SearchResponse {
                        results: vec![hit(1)],
                        highlights: vec!["Hello".into(), "hello".into()],
                        next_batch: None,
                        count: Some(3),
                    }),
                );
            },
            ScenarioKind::Churn => {
                let room = store.add_room(self.room.clone());
                room.set_membership(&self.user, Membership::Join);
            },
        }
    }

    async fn script(&self, store: &SimSessionStore, handle: &mut SimDriverHandle) {
        match self.kind {
            ScenarioKind::Join | ScenarioKind::PeekForbidden => {
                handle.send(Intent::Join);
            },
            ScenarioKind::DeferredJoin => {
                handle.send(Intent::Join);
                handle.wait_for(|view| view.pending_join.is_some()).await;
                store.materialize_deferred_joins();
                handle.wait_for(|view| view.access_state == RoomAccessState::Joined).await;
            },
            ScenarioKind::FirstJoin => {
                handle.send(Intent::Join);
                handle.wait_for(|view| view.awaiting_display_name).await;
                handle.send(Intent::ChooseDisplayName(Some("Simulated".into())));
                handle.wait_for(|view| view.access_state == RoomAccessState::Joined).await;
            },
            ScenarioKind::Invite => {
                handle.send(Intent::Reject);
            },
            ScenarioKind::Search => {
                handle.send(Intent::OpenSearch);
                handle.send(Intent::Search { term: "hello".into(), scope: SearchScope::Room });
                handle.send(Intent::LoadMoreResults { backwards: true });
            },
            ScenarioKind::Churn => self.churn(store, handle).await,
        }
        handle.close();
    }

    async fn churn(&self, store: &SimSessionStore, handle: &SimDriverHandle) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        for step in 0..CHURN_STEPS {
            let peer = UserId::new(format!("@peer{}:localhost", rng.gen_range(0..CHURN_PEERS)));
            match rng.gen_range(0..4) {
                0 => {
                    let membership =
                        if rng.gen_bool(0.5) { Membership::Join } else { Membership::Leave };
                    store.set_membership(&self.room, &peer, membership);
                },
                1 => store.append_timeline(&self.room, format!("$churn{step}"), &peer, true),
                2 => {
                    handle.send(Intent::Scrolled {
                        at_live_edge: rng.gen_bool(0.5),
                        read_marker_offset: Some(rng.gen_range(-5..5)),
                    });
                },
                _ => {
                    handle.send(Intent::KeyPressed);
                },
            }
            tokio::task::yield_now().await;
        }
    }
}

/// Run `runtime` alongside `script`.
///
/// The script is abandoned if the runtime stops first, so a failed run never
/// leaves the script waiting for a render that will not come.
async fn drive(
    runtime: SimRuntime,
    script: impl Future<Output = ()>,
) -> Result<(), RuntimeError<SimDriverError>> {
    let run = runtime.run();
    tokio::pin!(run);
    tokio::select! {
        result = &mut run => return result.map(|_| ()),
        () = script => {},
    }
    run.await.map(|_| ())
}
