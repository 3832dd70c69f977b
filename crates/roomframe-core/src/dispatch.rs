//! Process-wide dispatch bus.
//!
//! Components publish named actions and every registered subscriber receives
//! them in publish order. Subscribers are identified by a [`DispatcherRef`]
//! token returned from [`DispatchBus::register`], which is also used to
//! unregister.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::RoomId;

/// Named action payloads carried on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DispatchAction {
    /// The user moved the pointer or pressed a key.
    UserActivity,
    /// Ask the room-leave handler to leave a room.
    LeaveRoom {
        /// Room to leave.
        room_id: RoomId,
    },
    /// Navigate away to the next room.
    ViewNextRoom,
    /// Open the room directory.
    ViewRoomDirectory,
    /// Timeline geometry changed.
    TimelineResize,
    /// Enter or leave fullscreen video.
    VideoFullscreen {
        /// Whether to enter fullscreen.
        fullscreen: bool,
    },
    /// An outgoing message was sent.
    MessageSent,
    /// An outgoing message failed to send.
    MessageSendFailed,
    /// An outgoing message was cancelled.
    MessageSendCancelled,
}

/// A published action with its delivery flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// The action.
    pub action: DispatchAction,
    /// Publisher asked for synchronous delivery.
    pub sync: bool,
}

impl Dispatch {
    /// Asynchronous (default) delivery.
    pub fn new(action: DispatchAction) -> Self {
        Self { action, sync: false }
    }

    /// Synchronous delivery.
    pub fn sync(action: DispatchAction) -> Self {
        Self { action, sync: true }
    }
}

/// Subscription token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DispatcherRef(u64);

#[derive(Debug, Default)]
struct BusInner {
    next_ref: u64,
    subscribers: BTreeMap<u64, mpsc::UnboundedSender<Dispatch>>,
}

/// Publish/subscribe channel shared by every component of the client.
#[derive(Debug, Clone, Default)]
pub struct DispatchBus {
    inner: Arc<Mutex<BusInner>>,
}

impl DispatchBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    pub fn register(&self) -> (DispatcherRef, mpsc::UnboundedReceiver<Dispatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let token = inner.next_ref;
        inner.next_ref += 1;
        inner.subscribers.insert(token, tx);
        (DispatcherRef(token), rx)
    }

    /// Remove a subscriber. Unknown tokens are ignored.
    pub fn unregister(&self, token: DispatcherRef) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.remove(&token.0);
    }

    /// Publish an action to every subscriber.
    ///
    /// Subscribers whose receiver has been dropped are pruned.
    pub fn dispatch(&self, dispatch: &Dispatch) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.retain(|token, tx| {
            let delivered = tx.send(dispatch.clone()).is_ok();
            if !delivered {
                tracing::debug!(token, "pruning closed dispatch subscriber");
            }
            delivered
        });
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_in_order() {
        let bus = DispatchBus::new();
        let (_a, mut rx_a) = bus.register();
        let (_b, mut rx_b) = bus.register();

        bus.dispatch(&Dispatch::new(DispatchAction::ViewNextRoom));
        bus.dispatch(&Dispatch::sync(DispatchAction::TimelineResize));

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.try_recv().ok().map(|d| d.action), Some(DispatchAction::ViewNextRoom));
            let second = rx.try_recv().ok();
            assert_eq!(second, Some(Dispatch::sync(DispatchAction::TimelineResize)));
        }
    }

    #[test]
    fn unregistered_subscriber_stops_receiving() {
        let bus = DispatchBus::new();
        let (token, mut rx) = bus.register();
        bus.unregister(token);

        bus.dispatch(&Dispatch::new(DispatchAction::UserActivity));
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let bus = DispatchBus::new();
        let (_token, rx) = bus.register();
        drop(rx);

        bus.dispatch(&Dispatch::new(DispatchAction::UserActivity));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn actions_serialize_with_wire_names() {
        let leave = DispatchAction::LeaveRoom { room_id: RoomId::from("!r:hs") };
        let json = serde_json::to_value(&leave).ok();
        assert_eq!(json, Some(serde_json::json!({ "action": "leave_room", "room_id": "!r:hs" })));

        let fullscreen = serde_json::to_value(DispatchAction::VideoFullscreen { fullscreen: true });
        assert_eq!(
            fullscreen.ok(),
            Some(serde_json::json!({ "action": "video_fullscreen", "fullscreen": true }))
        );
    }
}
