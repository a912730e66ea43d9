use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use backend_domain::{
    AddMemberOutcome, ChatMessage, MembershipToken, RoomId, RoomKey, RoomMeta, RoomStore,
};

#[derive(Debug, Clone)]
enum Value {
    Meta(RoomMeta),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// In-process store with per-key expiry measured on tokio's clock, so tests
/// can drive it with a paused runtime.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lazily evicts `key` when its deadline has passed.
    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let expired = entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline <= Instant::now())
            .unwrap_or(false);
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get_mut(key)
    }

    /// Inserts an arbitrary list value, for keys the relay only expires.
    pub fn seed_list(&self, room_id: &RoomId, key: RoomKey, items: Vec<String>) {
        self.lock().insert(
            key.key_for(room_id),
            Entry {
                value: Value::List(items),
                expires_at: None,
            },
        );
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create_room(&self, room_id: &RoomId, created_at: i64, ttl_seconds: u64) -> anyhow::Result<()> {
        self.lock().insert(
            RoomKey::Meta.key_for(room_id),
            Entry {
                value: Value::Meta(RoomMeta::new(created_at)),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(())
    }

    async fn load_meta(&self, room_id: &RoomId) -> anyhow::Result<Option<RoomMeta>> {
        let mut entries = self.lock();
        Ok(match Self::live(&mut entries, &RoomKey::Meta.key_for(room_id)) {
            Some(Entry {
                value: Value::Meta(meta),
                ..
            }) => Some(meta.clone()),
            _ => None,
        })
    }

    async fn try_add_member(
        &self,
        room_id: &RoomId,
        token: &MembershipToken,
        capacity: usize,
    ) -> anyhow::Result<AddMemberOutcome> {
        let mut entries = self.lock();
        let Some(Entry {
            value: Value::Meta(meta),
            ..
        }) = Self::live(&mut entries, &RoomKey::Meta.key_for(room_id))
        else {
            return Ok(AddMemberOutcome::RoomMissing);
        };
        if meta.has_member(token) {
            return Ok(AddMemberOutcome::AlreadyMember);
        }
        if meta.is_full(capacity) {
            return Ok(AddMemberOutcome::Full);
        }
        meta.connected.push(token.clone());
        Ok(AddMemberOutcome::Added)
    }

    async fn remove_member(&self, room_id: &RoomId, token: &MembershipToken) -> anyhow::Result<bool> {
        let mut entries = self.lock();
        let Some(Entry {
            value: Value::Meta(meta),
            ..
        }) = Self::live(&mut entries, &RoomKey::Meta.key_for(room_id))
        else {
            return Ok(false);
        };
        let before = meta.connected.len();
        meta.connected.retain(|member| member != token);
        Ok(meta.connected.len() != before)
    }

    async fn append_message(&self, room_id: &RoomId, message: &ChatMessage) -> anyhow::Result<bool> {
        let encoded = serde_json::to_string(message)?;
        let key = RoomKey::Messages.key_for(room_id);
        let mut entries = self.lock();
        let Some(deadline) = Self::live(&mut entries, &RoomKey::Meta.key_for(room_id))
            .map(|meta| meta.expires_at)
        else {
            return Ok(false);
        };
        match Self::live(&mut entries, &key) {
            Some(Entry {
                value: Value::List(items),
                expires_at,
            }) => {
                items.push(encoded);
                *expires_at = deadline;
            }
            Some(_) => anyhow::bail!("key {} does not hold a list", key),
            None => {
                entries.insert(
                    key,
                    Entry {
                        value: Value::List(vec![encoded]),
                        expires_at: deadline,
                    },
                );
            }
        }
        Ok(true)
    }

    async fn list_messages(&self, room_id: &RoomId) -> anyhow::Result<Vec<ChatMessage>> {
        let mut entries = self.lock();
        let Some(Entry {
            value: Value::List(items),
            ..
        }) = Self::live(&mut entries, &RoomKey::Messages.key_for(room_id))
        else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(anyhow::Error::from))
            .collect()
    }

    async fn remaining_ttl(&self, room_id: &RoomId, key: RoomKey) -> anyhow::Result<Option<u64>> {
        let mut entries = self.lock();
        let Some(entry) = Self::live(&mut entries, &key.key_for(room_id)) else {
            return Ok(None);
        };
        Ok(entry.expires_at.map(|deadline| {
            let remaining = deadline.saturating_duration_since(Instant::now());
            (remaining.as_millis() as u64 + 500) / 1000
        }))
    }

    async fn expire(&self, room_id: &RoomId, key: RoomKey, ttl_seconds: u64) -> anyhow::Result<()> {
        let name = key.key_for(room_id);
        let mut entries = self.lock();
        if ttl_seconds == 0 {
            entries.remove(&name);
            return Ok(());
        }
        if let Some(entry) = Self::live(&mut entries, &name) {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_seconds));
        }
        Ok(())
    }

    async fn room_exists(&self, room_id: &RoomId) -> anyhow::Result<bool> {
        let mut entries = self.lock();
        Ok(Self::live(&mut entries, &RoomKey::Meta.key_for(room_id)).is_some())
    }

    async fn delete_room(&self, room_id: &RoomId) -> anyhow::Result<()> {
        let mut entries = self.lock();
        for key in RoomKey::ALL {
            entries.remove(&key.key_for(room_id));
        }
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::parse("room-1").unwrap()
    }

    fn message(id: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender: "fox".to_string(),
            text: "hi".to_string(),
            timestamp: 1,
            room_id: room(),
            token: None,
        }
    }

    #[tokio::test]
    async fn bounded_add_stops_at_capacity() {
        let store = MemoryStore::new();
        store.create_room(&room(), 1, 600).await.unwrap();
        let t1 = MembershipToken::generate();
        let t2 = MembershipToken::generate();
        let t3 = MembershipToken::generate();

        assert_eq!(store.try_add_member(&room(), &t1, 2).await.unwrap(), AddMemberOutcome::Added);
        assert_eq!(store.try_add_member(&room(), &t1, 2).await.unwrap(), AddMemberOutcome::AlreadyMember);
        assert_eq!(store.try_add_member(&room(), &t2, 2).await.unwrap(), AddMemberOutcome::Added);
        assert_eq!(store.try_add_member(&room(), &t3, 2).await.unwrap(), AddMemberOutcome::Full);
        assert_eq!(store.load_meta(&room()).await.unwrap().unwrap().connected, vec![t1.clone(), t2]);

        assert!(store.remove_member(&room(), &t1).await.unwrap());
        assert_eq!(store.try_add_member(&room(), &t3, 2).await.unwrap(), AddMemberOutcome::Added);
    }

    #[tokio::test]
    async fn bounded_add_on_missing_room() {
        let store = MemoryStore::new();
        let outcome = store
            .try_add_member(&room(), &MembershipToken::generate(), 2)
            .await
            .unwrap();
        assert_eq!(outcome, AddMemberOutcome::RoomMissing);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_on_the_tokio_clock() {
        let store = MemoryStore::new();
        store.create_room(&room(), 1, 10).await.unwrap();
        store.seed_list(&room(), RoomKey::History, vec!["h".to_string()]);
        assert_eq!(store.remaining_ttl(&room(), RoomKey::History).await.unwrap(), None);
        store.expire(&room(), RoomKey::History, 10).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.remaining_ttl(&room(), RoomKey::Meta).await.unwrap(), Some(6));
        assert_eq!(store.remaining_ttl(&room(), RoomKey::History).await.unwrap(), Some(6));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!store.room_exists(&room()).await.unwrap());
        assert_eq!(store.remaining_ttl(&room(), RoomKey::History).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn appended_log_inherits_the_room_deadline() {
        let store = MemoryStore::new();
        store.create_room(&room(), 1, 10).await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        assert!(store.append_message(&room(), &message("m1")).await.unwrap());
        assert_eq!(store.remaining_ttl(&room(), RoomKey::Messages).await.unwrap(), Some(7));

        tokio::time::advance(Duration::from_secs(7)).await;
        assert!(!store.room_exists(&room()).await.unwrap());
        assert!(store.list_messages(&room()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_to_missing_room_writes_nothing() {
        let store = MemoryStore::new();
        assert!(!store.append_message(&room(), &message("m1")).await.unwrap());
        assert!(store.list_messages(&room()).await.unwrap().is_empty());
        assert_eq!(store.remaining_ttl(&room(), RoomKey::Messages).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_never_pass_capacity() {
        let store = Arc::new(MemoryStore::new());
        store.create_room(&room(), 1, 600).await.unwrap();

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .try_add_member(&room(), &MembershipToken::generate(), 2)
                        .await
                        .unwrap()
                })
            })
            .collect();
        let mut added = 0;
        for attempt in attempts {
            if attempt.await.unwrap() == AddMemberOutcome::Added {
                added += 1;
            }
        }

        assert_eq!(added, 2);
        assert_eq!(store.load_meta(&room()).await.unwrap().unwrap().connected.len(), 2);
    }

    #[tokio::test]
    async fn delete_room_removes_every_key() {
        let store = MemoryStore::new();
        store.create_room(&room(), 1, 600).await.unwrap();
        store.append_message(&room(), &message("m1")).await.unwrap();
        store.seed_list(&room(), RoomKey::History, vec!["h".to_string()]);

        store.delete_room(&room()).await.unwrap();

        assert!(store.load_meta(&room()).await.unwrap().is_none());
        for key in RoomKey::ALL {
            assert_eq!(store.remaining_ttl(&room(), key).await.unwrap(), None);
        }
        assert!(store.list_messages(&room()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn messages_keep_append_order() {
        let store = MemoryStore::new();
        store.create_room(&room(), 1, 600).await.unwrap();
        for id in ["a", "b", "c"] {
            store.append_message(&room(), &message(id)).await.unwrap();
        }
        let ids: Vec<String> = store
            .list_messages(&room())
            .await
            .unwrap()
            .into_iter()
            .map(|message| message.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
