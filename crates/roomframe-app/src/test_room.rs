//! Mutable in-memory room for unit tests.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use roomframe_core::{Member, Membership, Room, RoomHandle, RoomId, UserId};

#[derive(Debug, Default)]
struct Inner {
    name: Option<String>,
    members: BTreeMap<UserId, Member>,
    state: HashMap<String, serde_json::Value>,
    account_data: HashMap<String, serde_json::Value>,
    unsent: usize,
}

#[derive(Debug)]
pub(crate) struct TestRoom {
    room_id: RoomId,
    inner: Mutex<Inner>,
}

impl TestRoom {
    pub(crate) fn new(room_id: RoomId) -> Self {
        Self { room_id, inner: Mutex::new(Inner::default()) }
    }

    pub(crate) fn handle(room_id: &str) -> Arc<Self> {
        Arc::new(Self::new(RoomId::from(room_id)))
    }

    pub(crate) fn set_name(&self, name: &str) {
        self.inner.lock().unwrap().name = Some(name.to_string());
    }

    pub(crate) fn set_member(&self, member: Member) {
        self.inner.lock().unwrap().members.insert(member.user_id.clone(), member);
    }

    pub(crate) fn set_state(&self, event_type: &str, content: serde_json::Value) {
        self.inner.lock().unwrap().state.insert(event_type.to_string(), content);
    }

    pub(crate) fn set_account_data(&self, event_type: &str, content: serde_json::Value) {
        self.inner.lock().unwrap().account_data.insert(event_type.to_string(), content);
    }

    pub(crate) fn set_unsent(&self, count: usize) {
        self.inner.lock().unwrap().unsent = count;
    }
}

impl Room for TestRoom {
    fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn name(&self) -> Option<String> {
        self.inner.lock().unwrap().name.clone()
    }

    fn membership(&self, user_id: &UserId) -> Option<Membership> {
        self.inner.lock().unwrap().members.get(user_id).map(|m| m.membership)
    }

    fn joined_members(&self) -> Vec<Member> {
        let inner = self.inner.lock().unwrap();
        inner.members.values().filter(|m| m.membership == Membership::Join).cloned().collect()
    }

    fn state_event(&self, event_type: &str, _state_key: &str) -> Option<serde_json::Value> {
        self.inner.lock().unwrap().state.get(event_type).cloned()
    }

    fn account_data(&self, event_type: &str) -> Option<serde_json::Value> {
        self.inner.lock().unwrap().account_data.get(event_type).cloned()
    }

    fn unsent_event_count(&self) -> usize {
        self.inner.lock().unwrap().unsent
    }
}

pub(crate) fn as_handle(room: &Arc<TestRoom>) -> RoomHandle {
    room.clone()
}
