//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` stands in for a real frontend during deterministic testing. It
//! implements [`Driver`] so the same [`roomframe_app::Runtime`] orchestration
//! code runs in both production and simulation. Intents come from a
//! [`SimDriverHandle`]; every render is captured as a [`ViewSnapshot`] and
//! optionally checked against an [`InvariantRegistry`].

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    future::Future,
    ops::Sub,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use roomframe_app::{Driver, Intent, Notification, RoomView, RoomViewAction};
use tokio::sync::{Notify, mpsc};

use crate::invariants::{InvariantRegistry, SystemSnapshot, ViewSnapshot};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Output captured from the runtime.
#[derive(Debug, Default)]
struct Recorded {
    renders: Vec<ViewSnapshot>,
    presented: Vec<RoomViewAction>,
}

#[derive(Debug, Default)]
struct Shared {
    recorded: Mutex<Recorded>,
    rendered: Notify,
}

impl Shared {
    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulation driver for deterministic testing.
#[derive(Debug)]
pub struct SimDriver {
    intents: mpsc::UnboundedReceiver<Intent>,
    shared: Arc<Shared>,
    invariants: Option<InvariantRegistry>,
    history: SystemSnapshot,
}

impl SimDriver {
    /// Create a driver and the handle that feeds it.
    ///
    /// Input stays open until the handle is closed or dropped.
    pub fn new() -> (Self, SimDriverHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let driver =
            Self { intents: rx, shared: Arc::clone(&shared), invariants: None, history: SystemSnapshot::empty() };
        (driver, SimDriverHandle { intents: Some(tx), shared })
    }

    /// Create a driver that delivers `intents` in order, then closes input.
    pub fn scripted(intents: impl IntoIterator<Item = Intent>) -> (Self, SimDriverHandle) {
        let (driver, mut handle) = Self::new();
        for intent in intents {
            handle.send(intent);
        }
        handle.close();
        (driver, handle)
    }

    /// Enable invariant checking on every render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    fn poll_input(&mut self) -> impl Future<Output = Result<Option<Intent>, Self::Error>> + Send {
        async move { Ok(self.intents.recv().await) }
    }

    fn render<I>(&mut self, view: &RoomView<I>) -> Result<(), Self::Error>
    where
        I: Copy + Ord + Sub<Output = Duration>,
    {
        let snapshot = ViewSnapshot::from_view(view);
        self.history.observe(snapshot.clone());

        if let Some(registry) = &self.invariants {
            registry.check_all(&self.history).map_err(|violations| {
                let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
                SimDriverError(format!("invariant violation: {}", messages.join("; ")))
            })?;
        }

        self.shared.recorded().renders.push(snapshot);
        self.shared.rendered.notify_waiters();
        Ok(())
    }

    fn present(&mut self, action: RoomViewAction) -> Result<(), Self::Error> {
        tracing::trace!(?action, "presenting");
        self.shared.recorded().presented.push(action);
        Ok(())
    }
}

/// Test-side handle: sends intents, reads what the driver captured.
#[derive(Debug)]
pub struct SimDriverHandle {
    intents: Option<mpsc::UnboundedSender<Intent>>,
    shared: Arc<Shared>,
}

impl SimDriverHandle {
    /// Queue an intent. Returns `false` if input is closed.
    pub fn send(&self, intent: Intent) -> bool {
        self.intents.as_ref().is_some_and(|tx| tx.send(intent).is_ok())
    }

    /// Close input. The runtime exits once outstanding work settles.
    pub fn close(&mut self) {
        self.intents = None;
    }

    /// Every render so far.
    pub fn renders(&self) -> Vec<ViewSnapshot> {
        self.shared.recorded().renders.clone()
    }

    /// The most recent render.
    pub fn last_render(&self) -> Option<ViewSnapshot> {
        self.shared.recorded().renders.last().cloned()
    }

    /// Every presented action so far.
    pub fn presented(&self) -> Vec<RoomViewAction> {
        self.shared.recorded().presented.clone()
    }

    /// Notifications presented so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.shared
            .recorded()
            .presented
            .iter()
            .filter_map(|action| match action {
                RoomViewAction::Notify(notification) => Some(notification.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait for a render whose snapshot satisfies `predicate`.
    ///
    /// Returns immediately if the latest render already does.
    pub async fn wait_for(&self, predicate: impl Fn(&ViewSnapshot) -> bool) -> ViewSnapshot {
        loop {
            let rendered = self.shared.rendered.notified();
            if let Some(snapshot) = self.last_render().filter(|snapshot| predicate(snapshot)) {
                return snapshot;
            }
            rendered.await;
        }
    }
}
