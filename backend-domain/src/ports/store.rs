use async_trait::async_trait;

use crate::entities::{AddMemberOutcome, ChatMessage, RoomKey, RoomMeta};
use crate::value_objects::{MembershipToken, RoomId};

/// Shared key-value store holding room meta, member sets and message logs.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create_room(&self, room_id: &RoomId, created_at: i64, ttl_seconds: u64) -> anyhow::Result<()>;
    async fn load_meta(&self, room_id: &RoomId) -> anyhow::Result<Option<RoomMeta>>;
    /// Appends `token` unless the room is missing, already holds it, or is at
    /// `capacity`. The check and the append are one atomic step.
    async fn try_add_member(
        &self,
        room_id: &RoomId,
        token: &MembershipToken,
        capacity: usize,
    ) -> anyhow::Result<AddMemberOutcome>;
    async fn remove_member(&self, room_id: &RoomId, token: &MembershipToken) -> anyhow::Result<bool>;
    /// Appends to the room's log and gives the log the meta key's remaining
    /// expiry in the same step. Returns false, writing nothing, when the room
    /// is gone.
    async fn append_message(&self, room_id: &RoomId, message: &ChatMessage) -> anyhow::Result<bool>;
    async fn list_messages(&self, room_id: &RoomId) -> anyhow::Result<Vec<ChatMessage>>;
    /// Remaining lifetime in seconds; `None` when the key is missing or has no expiry.
    async fn remaining_ttl(&self, room_id: &RoomId, key: RoomKey) -> anyhow::Result<Option<u64>>;
    async fn expire(&self, room_id: &RoomId, key: RoomKey, ttl_seconds: u64) -> anyhow::Result<()>;
    async fn room_exists(&self, room_id: &RoomId) -> anyhow::Result<bool>;
    async fn delete_room(&self, room_id: &RoomId) -> anyhow::Result<()>;
    async fn ping(&self) -> anyhow::Result<()>;
}
