use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use backend_domain::{
    BusChannel, BusEnvelope, BusError, BusEvent, BusMessage, ChatEvent, DecodeError, MessageBus,
    RoomId, SchemaRegistry, SchemaViolation,
};

use crate::{AppError, Metrics};

/// Bridges validated events onto the shared bus and tracks which bus
/// channels this process is subscribed to.
pub struct FanoutBridge {
    bus: Arc<dyn MessageBus>,
    registry: Arc<SchemaRegistry>,
    metrics: Arc<Metrics>,
    subscribed: Mutex<HashSet<String>>,
}

impl FanoutBridge {
    pub fn new(bus: Arc<dyn MessageBus>, registry: Arc<SchemaRegistry>, metrics: Arc<Metrics>) -> Self {
        Self {
            bus,
            registry,
            metrics,
            subscribed: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn events(&self) -> broadcast::Receiver<BusEvent> {
        self.bus.events()
    }

    /// Validates an untyped payload for `channel`/`event` and publishes it.
    /// Unknown pairs and contract failures are rejected before the bus is
    /// touched.
    pub async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: Value,
        room_id: Option<&RoomId>,
    ) -> Result<ChatEvent, AppError> {
        let validated = self.registry.validate_parts(channel, event, payload)?;
        self.publish_event(&validated, room_id).await?;
        Ok(validated)
    }

    /// Publishes an already typed event. `room_id` selects the room-scoped
    /// channel and must match the event's own room.
    pub async fn publish_event(&self, event: &ChatEvent, room_id: Option<&RoomId>) -> Result<(), AppError> {
        self.registry.check(event)?;
        if let Some(room_id) = room_id {
            if event.room_id() != room_id {
                return Err(SchemaViolation::new(
                    event.kind().as_str(),
                    "roomId",
                    format!("does not match target room {}", room_id),
                )
                .into());
            }
        }

        let envelope = BusEnvelope::for_event(event, room_id.is_some())
            .and_then(|envelope| envelope.encode())
            .map_err(|err| AppError::Internal(err.into()))?;
        let channel = BusChannel::for_kind(event.kind(), room_id).name();

        match self.bus.publish(&channel, &envelope).await {
            Ok(()) => {
                self.metrics.record_published();
                debug!("published {} on {}", event.kind(), channel);
                Ok(())
            }
            Err(err) => {
                self.metrics.record_publish_error();
                warn!("publish on {} failed: {}", channel, err);
                Err(err.into())
            }
        }
    }

    fn global_channels(&self) -> Vec<String> {
        self.registry
            .kinds()
            .map(|kind| BusChannel::for_kind(kind, None).name())
            .collect()
    }

    /// Subscribes to every declared channel of `room_id` not yet tracked.
    /// Repeat calls for the same room are no-ops.
    pub async fn ensure_room_subscribed(&self, room_id: &RoomId) -> Result<(), BusError> {
        self.ensure_subscribed(BusChannel::room_channels(room_id)).await
    }

    pub async fn ensure_global_subscribed(&self) -> Result<(), BusError> {
        self.ensure_subscribed(self.global_channels()).await
    }

    async fn ensure_subscribed(&self, channels: Vec<String>) -> Result<(), BusError> {
        let mut subscribed = self.subscribed.lock().await;
        let pending: Vec<String> = channels
            .into_iter()
            .filter(|channel| !subscribed.contains(channel))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        match self.bus.subscribe(&pending).await {
            Ok(()) => {
                for channel in &pending {
                    debug!("subscribed to {}", channel);
                }
                subscribed.extend(pending);
                Ok(())
            }
            Err(err) => {
                warn!("subscribe to {} failed: {}", pending.join(","), err);
                Err(err)
            }
        }
    }

    /// Drops the room's channels from the tracked set and unsubscribes them.
    pub async fn release_room(&self, room_id: &RoomId) -> Result<(), BusError> {
        let mut subscribed = self.subscribed.lock().await;
        let tracked: Vec<String> = BusChannel::room_channels(room_id)
            .into_iter()
            .filter(|channel| subscribed.remove(channel))
            .collect();
        if tracked.is_empty() {
            return Ok(());
        }
        self.bus.unsubscribe(&tracked).await.map_err(|err| {
            warn!("unsubscribe from room {} failed: {}", room_id, err);
            err
        })
    }

    /// Forgets every tracked channel and subscribes again for the global
    /// channels plus each of `rooms`. Returns how many channels are tracked
    /// afterwards.
    pub async fn resubscribe(&self, rooms: &[RoomId]) -> usize {
        self.subscribed.lock().await.clear();
        if let Err(err) = self.ensure_global_subscribed().await {
            warn!("global resubscribe failed: {}", err);
        }
        for room_id in rooms {
            if let Err(err) = self.ensure_room_subscribed(room_id).await {
                warn!("resubscribe for room {} failed: {}", room_id, err);
            }
        }
        let count = self.subscribed.lock().await.len();
        info!("bus resubscribed {} channels for {} rooms", count, rooms.len());
        count
    }

    pub async fn is_subscribed(&self, channel: &str) -> bool {
        self.subscribed.lock().await.contains(channel)
    }

    pub fn decode(&self, message: &BusMessage) -> Result<(BusChannel, ChatEvent), DecodeError> {
        self.registry.decode(&message.channel, &message.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_domain::{ChatDestroy, ChatMessage, MembershipToken};
    use backend_infrastructure::MemoryBusHub;
    use serde_json::json;

    fn room(raw: &str) -> RoomId {
        RoomId::parse(raw).unwrap()
    }

    fn bridge_on(hub: &MemoryBusHub) -> FanoutBridge {
        FanoutBridge::new(
            Arc::new(hub.connect()),
            Arc::new(SchemaRegistry::default()),
            Arc::new(Metrics::default()),
        )
    }

    async fn next_message(rx: &mut broadcast::Receiver<BusEvent>) -> BusMessage {
        match rx.recv().await.unwrap() {
            BusEvent::Message(message) => message,
            other => panic!("unexpected bus event {:?}", other),
        }
    }

    #[tokio::test]
    async fn published_payload_round_trips_to_same_process_subscriber() {
        let hub = MemoryBusHub::new();
        let bridge = bridge_on(&hub);
        let room_id = room("R");
        let mut rx = bridge.events();
        bridge.ensure_room_subscribed(&room_id).await.unwrap();

        let payload = json!({
            "id": "m1",
            "sender": "fox",
            "text": "hi",
            "timestamp": 1700000000000_i64,
            "roomId": "R",
            "token": "owner",
        });
        let published = bridge
            .publish("chat", "message", payload, Some(&room_id))
            .await
            .unwrap();

        let message = next_message(&mut rx).await;
        assert_eq!(message.channel, "room:R:chat:message");
        let (channel, received) = bridge.decode(&message).unwrap();
        assert_eq!(channel.room_id, Some(room_id));
        assert_eq!(received, published);
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_the_bus() {
        let hub = MemoryBusHub::new();
        let bridge = bridge_on(&hub);
        let room_id = room("R");
        let mut rx = bridge.events();
        bridge.ensure_room_subscribed(&room_id).await.unwrap();

        let payload = json!({
            "id": "m1",
            "sender": "fox",
            "text": "x".repeat(1001),
            "timestamp": 1,
            "roomId": "R",
        });
        let err = bridge
            .publish("chat", "message", payload, Some(&room_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SchemaViolation(_)));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn unknown_pair_is_rejected_without_io() {
        let hub = MemoryBusHub::new();
        let bridge = bridge_on(&hub);
        hub.set_available(false);
        let err = bridge
            .publish("chat", "typing", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownEventKind(_)));
    }

    #[tokio::test]
    async fn mismatched_room_is_a_violation() {
        let hub = MemoryBusHub::new();
        let bridge = bridge_on(&hub);
        let event = ChatEvent::Destroy(ChatDestroy::new(room("A")));
        let err = bridge.publish_event(&event, Some(&room("B"))).await.unwrap_err();
        assert!(matches!(err, AppError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn bus_outage_surfaces_as_unavailable() {
        let hub = MemoryBusHub::new();
        let bridge = bridge_on(&hub);
        hub.set_available(false);
        let event = ChatEvent::Message(ChatMessage {
            id: "m1".to_string(),
            sender: "fox".to_string(),
            text: "hi".to_string(),
            timestamp: 1,
            room_id: room("R"),
            token: Some(MembershipToken::generate()),
        });
        let err = bridge.publish_event(&event, Some(&room("R"))).await.unwrap_err();
        assert!(matches!(err, AppError::BusUnavailable(_)));
    }

    #[tokio::test]
    async fn room_subscription_is_idempotent() {
        let hub = MemoryBusHub::new();
        let bridge = bridge_on(&hub);
        let room_id = room("R");
        bridge.ensure_room_subscribed(&room_id).await.unwrap();

        // A second join must not touch the bus at all.
        hub.set_available(false);
        bridge.ensure_room_subscribed(&room_id).await.unwrap();
        hub.set_available(true);

        assert!(bridge.is_subscribed("room:R:chat:message").await);
        assert!(bridge.is_subscribed("room:R:chat:destroy").await);
        assert_eq!(hub.subscription_count("room:R:chat:message"), 1);
    }

    #[tokio::test]
    async fn failed_subscribe_is_not_tracked() {
        let hub = MemoryBusHub::new();
        let bridge = bridge_on(&hub);
        let room_id = room("R");
        hub.set_available(false);
        assert!(bridge.ensure_room_subscribed(&room_id).await.is_err());
        assert!(!bridge.is_subscribed("room:R:chat:message").await);

        hub.set_available(true);
        bridge.ensure_room_subscribed(&room_id).await.unwrap();
        assert_eq!(hub.subscription_count("room:R:chat:message"), 1);
    }

    #[tokio::test]
    async fn release_and_resubscribe_track_only_live_rooms() {
        let hub = MemoryBusHub::new();
        let bridge = bridge_on(&hub);
        bridge.ensure_room_subscribed(&room("A")).await.unwrap();
        bridge.ensure_room_subscribed(&room("B")).await.unwrap();

        bridge.release_room(&room("A")).await.unwrap();
        assert_eq!(hub.subscription_count("room:A:chat:message"), 0);

        hub.simulate_reconnect();
        assert_eq!(hub.subscription_count("room:B:chat:message"), 0);
        let tracked = bridge.resubscribe(&[room("B")]).await;

        assert_eq!(tracked, 4);
        assert_eq!(hub.subscription_count("room:B:chat:message"), 1);
        assert_eq!(hub.subscription_count("chat:message"), 1);
        assert!(!bridge.is_subscribed("room:A:chat:message").await);
    }
}
