use std::sync::Arc;

use tracing::{debug, info};

use backend_domain::{now_millis, ChatDestroy, ChatEvent, RoomId, RoomKey, RoomStore};

use crate::realtime::FanoutBridge;
use crate::{AppError, Metrics};

/// Creates rooms, keeps their dependent keys expiring together and tears
/// them down.
pub struct RoomLifecycle {
    store: Arc<dyn RoomStore>,
    bridge: Arc<FanoutBridge>,
    metrics: Arc<Metrics>,
    ttl_seconds: u64,
}

impl RoomLifecycle {
    pub fn new(
        store: Arc<dyn RoomStore>,
        bridge: Arc<FanoutBridge>,
        metrics: Arc<Metrics>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            store,
            bridge,
            metrics,
            ttl_seconds,
        }
    }

    pub async fn create_room(&self) -> Result<RoomId, AppError> {
        let room_id = RoomId::generate();
        self.store
            .create_room(&room_id, now_millis(), self.ttl_seconds)
            .await?;
        self.metrics.record_room_created();
        info!("room {} created, ttl {}s", room_id, self.ttl_seconds);
        Ok(room_id)
    }

    /// Copies the meta key's remaining lifetime onto every dependent key.
    /// Never extends the room. Returns the propagated TTL, or `None` when the
    /// meta key is gone.
    pub async fn touch_on_activity(&self, room_id: &RoomId) -> Result<Option<u64>, AppError> {
        let Some(remaining) = self.store.remaining_ttl(room_id, RoomKey::Meta).await? else {
            debug!("room {} has no ttl to propagate", room_id);
            return Ok(None);
        };
        for key in RoomKey::DEPENDENTS {
            self.store.expire(room_id, key, remaining).await?;
        }
        Ok(Some(remaining))
    }

    pub async fn remaining_ttl(&self, room_id: &RoomId) -> Result<Option<u64>, AppError> {
        Ok(self.store.remaining_ttl(room_id, RoomKey::Meta).await?)
    }

    /// Deletes every key of the room, then tells all relay processes.
    pub async fn destroy_room(&self, room_id: &RoomId) -> Result<(), AppError> {
        self.store.delete_room(room_id).await?;
        self.metrics.record_room_destroyed();
        info!("room {} destroyed", room_id);

        let event = ChatEvent::Destroy(ChatDestroy::new(room_id.clone()));
        self.bridge.publish_event(&event, Some(room_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use backend_domain::{BusEvent, ChatMessage, SchemaRegistry};
    use backend_infrastructure::{MemoryBusHub, MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        bridge: Arc<FanoutBridge>,
        lifecycle: RoomLifecycle,
    }

    fn fixture() -> Fixture {
        let hub = MemoryBusHub::new();
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(Metrics::default());
        let bridge = Arc::new(FanoutBridge::new(
            Arc::new(hub.connect()),
            Arc::new(SchemaRegistry::default()),
            metrics.clone(),
        ));
        let lifecycle = RoomLifecycle::new(store.clone(), bridge.clone(), metrics, 600);
        Fixture {
            store,
            bridge,
            lifecycle,
        }
    }

    fn message(room_id: &RoomId, n: usize) -> ChatMessage {
        ChatMessage {
            id: format!("m{}", n),
            sender: "fox".to_string(),
            text: "hi".to_string(),
            timestamp: 1,
            room_id: room_id.clone(),
            token: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn created_room_has_base_ttl_and_empty_member_set() {
        let f = fixture();
        let room_id = f.lifecycle.create_room().await.unwrap();
        let meta = f.store.load_meta(&room_id).await.unwrap().unwrap();
        assert!(meta.connected.is_empty());
        assert_eq!(f.lifecycle.remaining_ttl(&room_id).await.unwrap(), Some(600));
    }

    #[tokio::test(start_paused = true)]
    async fn dependent_keys_expire_in_lockstep_with_meta() {
        let f = fixture();
        let room_id = f.lifecycle.create_room().await.unwrap();
        f.store
            .seed_list(&room_id, RoomKey::History, vec!["h".to_string()]);
        f.store.seed_list(&room_id, RoomKey::Aux, vec!["a".to_string()]);

        for n in 0..5 {
            tokio::time::advance(Duration::from_secs(30)).await;
            f.store.append_message(&room_id, &message(&room_id, n)).await.unwrap();
            f.lifecycle.touch_on_activity(&room_id).await.unwrap();

            let meta_ttl = f.store.remaining_ttl(&room_id, RoomKey::Meta).await.unwrap();
            for key in RoomKey::DEPENDENTS {
                assert_eq!(f.store.remaining_ttl(&room_id, key).await.unwrap(), meta_ttl);
            }
        }
        // Touching never extends the room.
        assert_eq!(f.lifecycle.remaining_ttl(&room_id).await.unwrap(), Some(450));

        tokio::time::advance(Duration::from_secs(450)).await;
        assert!(!f.store.room_exists(&room_id).await.unwrap());
        assert!(f.store.list_messages(&room_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn touching_a_gone_room_is_a_no_op() {
        let f = fixture();
        let room_id = RoomId::parse("gone").unwrap();
        assert_eq!(f.lifecycle.touch_on_activity(&room_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn destroy_removes_keys_and_publishes_once() {
        let f = fixture();
        let room_id = f.lifecycle.create_room().await.unwrap();
        f.store.append_message(&room_id, &message(&room_id, 0)).await.unwrap();
        let mut rx = f.bridge.events();
        f.bridge.ensure_room_subscribed(&room_id).await.unwrap();

        f.lifecycle.destroy_room(&room_id).await.unwrap();

        for key in RoomKey::ALL {
            assert_eq!(f.store.remaining_ttl(&room_id, key).await.unwrap(), None);
        }
        assert!(!f.store.room_exists(&room_id).await.unwrap());

        let BusEvent::Message(published) = rx.recv().await.unwrap() else {
            panic!("expected a bus message");
        };
        let (_, event) = f.bridge.decode(&published).unwrap();
        assert_eq!(event, ChatEvent::Destroy(ChatDestroy::new(room_id)));
        assert!(rx.try_recv().is_err());
    }
}
