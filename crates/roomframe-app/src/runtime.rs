//! Generic runtime for one room view.
//!
//! The Runtime drives the controller's event loop, coordinating between:
//! - [`RoomView`]: the room session state machine
//! - [`Bridge`]: session-store calls
//! - [`Driver`]: user input and presentation
//!
//! Everything runs on one task. Store operations are collected in a
//! [`FuturesUnordered`] and their completions are fed back to the view one at
//! a time, so no completion ever overlaps a state mutation.

use futures::{StreamExt, future::BoxFuture, stream::FuturesUnordered};
use roomframe_core::{Dispatch, DispatchBus, Environment, SessionNotification, SessionStore};
use tokio::sync::mpsc;

use crate::{
    Bridge, Driver, Identity, RoomView, RoomViewAction, RoomViewConfig, RoomViewEvent,
    RoomViewOptions, RuntimeError,
};

type PendingOps = FuturesUnordered<BoxFuture<'static, RoomViewEvent>>;

/// Generic runtime that orchestrates a [`RoomView`], a [`Bridge`] and a
/// [`Driver`].
///
/// # Type Parameters
///
/// - `D`: Presentation driver
/// - `S`: Session store
/// - `E`: Environment providing the clock
pub struct Runtime<D, S, E>
where
    D: Driver,
    S: SessionStore,
    E: Environment,
{
    driver: D,
    bridge: Bridge<S>,
    env: E,
    bus: DispatchBus,
    notifications: mpsc::UnboundedReceiver<SessionNotification>,
    view: RoomView<E::Instant>,
}

impl<D, S, E> Runtime<D, S, E>
where
    D: Driver,
    S: SessionStore,
    E: Environment,
{
    /// Create a runtime for the room named in `options`.
    ///
    /// The room object is looked up once here; if the store does not know the
    /// room yet, the view will try to preview it when mounted.
    pub fn new(
        driver: D,
        store: S,
        env: E,
        bus: DispatchBus,
        notifications: mpsc::UnboundedReceiver<SessionNotification>,
        options: RoomViewOptions,
        config: RoomViewConfig,
    ) -> Self {
        let identity = Identity { user_id: store.user_id(), is_guest: store.is_guest() };
        let room = store.lookup_room(&options.address);
        let view = RoomView::new(identity, options, config, room);
        Self { driver, bridge: Bridge::new(store), env, bus, notifications, view }
    }

    /// The view being driven.
    pub fn view(&self) -> &RoomView<E::Instant> {
        &self.view
    }

    /// Run until input closes and all outstanding work has settled.
    ///
    /// Returns the unmounted view for inspection.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails or the view hits a fatal error.
    pub async fn run(mut self) -> Result<RoomView<E::Instant>, RuntimeError<D::Error>> {
        let (token, mut bus_rx) = self.bus.register();
        let result = self.event_loop(&mut bus_rx).await;

        self.view.unmount();
        self.bus.unregister(token);
        result.map(|()| self.view)
    }

    async fn event_loop(
        &mut self,
        bus_rx: &mut mpsc::UnboundedReceiver<Dispatch>,
    ) -> Result<(), RuntimeError<D::Error>> {
        let mut pending = PendingOps::new();
        let actions = self.view.mount(self.env.now());
        self.execute(actions, &mut pending)?;

        let mut input_open = true;
        let mut notifications_open = true;

        loop {
            let deadline = self.view.next_deadline(self.env.now());

            if !input_open && pending.is_empty() && deadline.is_none() {
                match self.next_buffered(bus_rx) {
                    Some(event) => {
                        self.process(event, &mut pending)?;
                        continue;
                    },
                    None => break,
                }
            }

            let event = tokio::select! {
                biased;

                Some(completed) = pending.next(), if !pending.is_empty() => completed,

                notification = self.notifications.recv(), if notifications_open => {
                    match notification {
                        Some(notification) => RoomViewEvent::Session(notification),
                        None => {
                            tracing::debug!("session notification channel closed");
                            notifications_open = false;
                            continue;
                        },
                    }
                }

                Some(dispatch) = bus_rx.recv() => RoomViewEvent::Dispatched(dispatch.action),

                input = self.driver.poll_input(), if input_open => {
                    match input.map_err(RuntimeError::Driver)? {
                        Some(intent) => RoomViewEvent::Intent(intent),
                        None => {
                            tracing::debug!("driver input closed");
                            input_open = false;
                            continue;
                        },
                    }
                }

                () = self.env.sleep(deadline.unwrap_or_default()), if deadline.is_some() => {
                    RoomViewEvent::Tick
                }

                else => break,
            };

            self.process(event, &mut pending)?;
        }

        Ok(())
    }

    /// Next event already buffered on the notification or bus channels.
    fn next_buffered(
        &mut self,
        bus_rx: &mut mpsc::UnboundedReceiver<Dispatch>,
    ) -> Option<RoomViewEvent> {
        if let Ok(notification) = self.notifications.try_recv() {
            return Some(RoomViewEvent::Session(notification));
        }
        bus_rx.try_recv().ok().map(|dispatch| RoomViewEvent::Dispatched(dispatch.action))
    }

    fn process(
        &mut self,
        event: RoomViewEvent,
        pending: &mut PendingOps,
    ) -> Result<(), RuntimeError<D::Error>> {
        match self.view.handle(event, self.env.now()) {
            Ok(actions) => self.execute(actions, pending),
            Err(error) if error.is_fatal() => Err(error.into()),
            Err(error) => {
                tracing::warn!(%error, "intent rejected");
                Ok(())
            },
        }
    }

    fn execute(
        &mut self,
        actions: Vec<RoomViewAction>,
        pending: &mut PendingOps,
    ) -> Result<(), RuntimeError<D::Error>> {
        for action in actions {
            match action {
                RoomViewAction::Render => {
                    self.driver.render(&self.view).map_err(RuntimeError::Driver)?;
                },
                RoomViewAction::Dispatch(dispatch) => self.bus.dispatch(&dispatch),
                action if action.is_store_bound() => {
                    if let Some(operation) = self.bridge.execute(action) {
                        pending.push(operation);
                    }
                },
                action => self.driver.present(action).map_err(RuntimeError::Driver)?,
            }
        }
        Ok(())
    }
}
