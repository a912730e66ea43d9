// Room state persisted in the shared store

use serde::{Deserialize, Serialize};

use crate::value_objects::{MembershipToken, RoomId};

pub const DEFAULT_ROOM_CAPACITY: usize = 2;
pub const DEFAULT_ROOM_TTL_SECONDS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMeta {
    pub created_at: i64,
    pub connected: Vec<MembershipToken>,
}

impl RoomMeta {
    pub fn new(created_at: i64) -> Self {
        Self {
            created_at,
            connected: Vec::new(),
        }
    }

    pub fn has_member(&self, token: &MembershipToken) -> bool {
        self.connected.iter().any(|member| member == token)
    }

    pub fn is_full(&self, capacity: usize) -> bool {
        self.connected.len() >= capacity
    }
}

/// Result of the bounded, atomic member-set append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMemberOutcome {
    Added,
    AlreadyMember,
    Full,
    RoomMissing,
}

/// Keys that make up one room in the shared store. They share one expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKey {
    Meta,
    Messages,
    History,
    Aux,
}

impl RoomKey {
    pub const ALL: [RoomKey; 4] = [RoomKey::Meta, RoomKey::Messages, RoomKey::History, RoomKey::Aux];
    /// Keys whose expiry follows the meta key.
    pub const DEPENDENTS: [RoomKey; 3] = [RoomKey::Messages, RoomKey::History, RoomKey::Aux];

    pub fn key_for(&self, room_id: &RoomId) -> String {
        match self {
            RoomKey::Meta => format!("meta:{}", room_id),
            RoomKey::Messages => format!("messages:{}", room_id),
            RoomKey::History => format!("history:{}", room_id),
            RoomKey::Aux => room_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_store_layout() {
        let room_id = RoomId::parse("abc").unwrap();
        let keys: Vec<String> = RoomKey::ALL.iter().map(|key| key.key_for(&room_id)).collect();
        assert_eq!(keys, vec!["meta:abc", "messages:abc", "history:abc", "abc"]);
    }

    #[test]
    fn meta_reports_membership_and_capacity() {
        let mut meta = RoomMeta::new(0);
        let t1 = MembershipToken::generate();
        meta.connected.push(t1.clone());
        assert!(meta.has_member(&t1));
        assert!(!meta.is_full(DEFAULT_ROOM_CAPACITY));
        meta.connected.push(MembershipToken::generate());
        assert!(meta.is_full(DEFAULT_ROOM_CAPACITY));
    }
}
