//! In-memory room object.
//!
//! `SimRoom` is the harness's stand-in for a synced room. The simulated store
//! mutates it through the setters below, and views query it through the
//! [`Room`] trait exactly as they would a real one.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, PoisonError, RwLock},
};

use roomframe_core::{Member, Membership, Room, RoomHandle, RoomId, UserId};

#[derive(Debug, Default)]
struct RoomData {
    name: Option<String>,
    members: BTreeMap<UserId, Member>,
    state: HashMap<(String, String), serde_json::Value>,
    account_data: HashMap<String, serde_json::Value>,
    unsent: usize,
}

/// Simulated room shared between the store and the views showing it.
#[derive(Debug)]
pub struct SimRoom {
    room_id: RoomId,
    data: RwLock<RoomData>,
}

impl SimRoom {
    /// Create an empty room.
    pub fn new(room_id: impl Into<RoomId>) -> Arc<Self> {
        Arc::new(Self { room_id: room_id.into(), data: RwLock::new(RoomData::default()) })
    }

    /// This room as a handle for the controller.
    pub fn handle(self: &Arc<Self>) -> RoomHandle {
        Arc::clone(self) as RoomHandle
    }

    /// Set the room name.
    pub fn set_name(&self, name: impl Into<String>) {
        self.write().name = Some(name.into());
    }

    /// Insert or replace a member.
    pub fn set_member(&self, member: Member) {
        self.write().members.insert(member.user_id.clone(), member);
    }

    /// Change a member's membership, creating the member if needed.
    ///
    /// Returns the member after the change.
    pub fn set_membership(&self, user_id: &UserId, membership: Membership) -> Member {
        let mut data = self.write();
        let member = data
            .members
            .entry(user_id.clone())
            .or_insert_with(|| Member::new(user_id.clone(), membership));
        member.membership = membership;
        member.clone()
    }

    /// Set a state event with an empty state key.
    pub fn set_state(&self, event_type: &str, content: serde_json::Value) {
        self.write().state.insert((event_type.to_owned(), String::new()), content);
    }

    /// Set a room account-data event.
    pub fn set_account_data(&self, event_type: &str, content: serde_json::Value) {
        self.write().account_data.insert(event_type.to_owned(), content);
    }

    /// Set the number of events that failed to send.
    pub fn set_unsent(&self, count: usize) {
        self.write().unsent = count;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RoomData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RoomData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Room for SimRoom {
    fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn name(&self) -> Option<String> {
        self.read().name.clone()
    }

    fn membership(&self, user_id: &UserId) -> Option<Membership> {
        self.read().members.get(user_id).map(|member| member.membership)
    }

    fn joined_members(&self) -> Vec<Member> {
        self.read()
            .members
            .values()
            .filter(|member| member.membership == Membership::Join)
            .cloned()
            .collect()
    }

    fn state_event(&self, event_type: &str, state_key: &str) -> Option<serde_json::Value> {
        self.read().state.get(&(event_type.to_owned(), state_key.to_owned())).cloned()
    }

    fn account_data(&self, event_type: &str) -> Option<serde_json::Value> {
        self.read().account_data.get(event_type).cloned()
    }

    fn unsent_event_count(&self) -> usize {
        self.read().unsent
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn membership_changes_update_joined_members() {
        let room = SimRoom::new("!r:hs");
        let alice = UserId::from("@alice:hs");
        room.set_membership(&alice, Membership::Invite);
        assert!(room.joined_members().is_empty());

        let member = room.set_membership(&alice, Membership::Join);
        assert_eq!(member.membership, Membership::Join);
        assert_eq!(room.joined_members(), vec![member]);
        assert_eq!(room.membership(&alice), Some(Membership::Join));
    }

    #[test]
    fn state_is_keyed_by_empty_state_key() {
        let room = SimRoom::new("!r:hs");
        room.set_state("m.room.guest_access", json!({ "guest_access": "can_join" }));

        assert!(room.state_event("m.room.guest_access", "").is_some());
        assert!(room.state_event("m.room.guest_access", "other").is_none());
    }
}
