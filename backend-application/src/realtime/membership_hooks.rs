use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use backend_domain::{ConnectionId, MembershipToken, RoomId, RoomStore};

/// One connection's membership in one room, handed to join/leave hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMember {
    pub connection_id: ConnectionId,
    pub room_id: RoomId,
    pub token: Option<MembershipToken>,
}

/// Side effects run after a connection joins or leaves a room. Errors are
/// logged by the gateway and never undo the membership change.
#[async_trait]
pub trait MembershipHooks: Send + Sync {
    async fn on_join(&self, member: &RoomMember) -> anyhow::Result<()>;
    async fn on_leave(&self, member: &RoomMember) -> anyhow::Result<()>;
}

/// Frees the seat held by a leaving connection's token.
pub struct SeatReleaseHooks {
    store: Arc<dyn RoomStore>,
}

impl SeatReleaseHooks {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MembershipHooks for SeatReleaseHooks {
    async fn on_join(&self, member: &RoomMember) -> anyhow::Result<()> {
        debug!("connection {} joined room {}", member.connection_id, member.room_id);
        Ok(())
    }

    async fn on_leave(&self, member: &RoomMember) -> anyhow::Result<()> {
        let Some(token) = &member.token else {
            return Ok(());
        };
        if self.store.remove_member(&member.room_id, token).await? {
            info!("released seat in room {}", member.room_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_domain::AddMemberOutcome;
    use backend_infrastructure::MemoryStore;

    #[tokio::test]
    async fn leave_removes_token_from_member_set() {
        let store = Arc::new(MemoryStore::new());
        let room_id = RoomId::parse("R").unwrap();
        let token = MembershipToken::generate();
        store.create_room(&room_id, 0, 600).await.unwrap();
        assert_eq!(
            store.try_add_member(&room_id, &token, 2).await.unwrap(),
            AddMemberOutcome::Added
        );

        let hooks = SeatReleaseHooks::new(store.clone());
        let member = RoomMember {
            connection_id: ConnectionId::new(),
            room_id: room_id.clone(),
            token: Some(token.clone()),
        };
        hooks.on_join(&member).await.unwrap();
        hooks.on_leave(&member).await.unwrap();

        let meta = store.load_meta(&room_id).await.unwrap().unwrap();
        assert!(!meta.has_member(&token));
    }

    #[tokio::test]
    async fn tokenless_leave_is_a_no_op() {
        let hooks = SeatReleaseHooks::new(Arc::new(MemoryStore::new()));
        let member = RoomMember {
            connection_id: ConnectionId::new(),
            room_id: RoomId::parse("R").unwrap(),
            token: None,
        };
        assert!(hooks.on_leave(&member).await.is_ok());
    }
}
