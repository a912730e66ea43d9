use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::warn;

use backend_domain::{
    AddMemberOutcome, ChatMessage, MembershipToken, RoomId, RoomKey, RoomMeta, RoomStore,
};

const FIELD_CONNECTED: &str = "connected";
const FIELD_CREATED_AT: &str = "createdAt";

// KEYS[1] = meta key, ARGV[1] = token, ARGV[2] = capacity.
// Returns 1 added, 0 already member, -1 room missing, -2 full.
const ADD_MEMBER_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return -1
end
local raw = redis.call('HGET', KEYS[1], 'connected')
local connected = {}
if raw and raw ~= '' then
  connected = cjson.decode(raw)
end
for _, token in ipairs(connected) do
  if token == ARGV[1] then
    return 0
  end
end
if #connected >= tonumber(ARGV[2]) then
  return -2
end
table.insert(connected, ARGV[1])
redis.call('HSET', KEYS[1], 'connected', cjson.encode(connected))
return 1
"#;

// KEYS[1] = meta key, ARGV[1] = token. Returns 1 when the token was removed.
const REMOVE_MEMBER_SCRIPT: &str = r#"
local raw = redis.call('HGET', KEYS[1], 'connected')
if not raw or raw == '' then
  return 0
end
local connected = cjson.decode(raw)
local kept = {}
local removed = 0
for _, token in ipairs(connected) do
  if token == ARGV[1] then
    removed = 1
  else
    table.insert(kept, token)
  end
end
if removed == 0 then
  return 0
end
if #kept == 0 then
  redis.call('HSET', KEYS[1], 'connected', '[]')
else
  redis.call('HSET', KEYS[1], 'connected', cjson.encode(kept))
end
return 1
"#;

// KEYS[1] = meta key, KEYS[2] = message list, ARGV[1] = encoded message.
// Returns 0 without writing when the room is gone.
const APPEND_MESSAGE_SCRIPT: &str = r#"
local ttl = redis.call('PTTL', KEYS[1])
if ttl == -2 then
  return 0
end
redis.call('RPUSH', KEYS[2], ARGV[1])
if ttl > 0 then
  redis.call('PEXPIRE', KEYS[2], ttl)
else
  redis.call('PERSIST', KEYS[2])
end
return 1
"#;

/// Room state in Redis: hash `meta:{id}` (`connected`, `createdAt`) and list
/// `messages:{id}`.
pub struct RedisStore {
    conn: ConnectionManager,
    add_member: Script,
    remove_member: Script,
    append_message: Script,
}

impl RedisStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            add_member: Script::new(ADD_MEMBER_SCRIPT),
            remove_member: Script::new(REMOVE_MEMBER_SCRIPT),
            append_message: Script::new(APPEND_MESSAGE_SCRIPT),
        })
    }
}

fn parse_meta(fields: &HashMap<String, String>) -> anyhow::Result<Option<RoomMeta>> {
    let Some(created_at) = fields.get(FIELD_CREATED_AT) else {
        return Ok(None);
    };
    let created_at = created_at
        .parse::<i64>()
        .map_err(|err| anyhow!("invalid createdAt '{}': {}", created_at, err))?;
    let connected = match fields.get(FIELD_CONNECTED) {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)?,
        _ => Vec::new(),
    };
    Ok(Some(RoomMeta {
        created_at,
        connected,
    }))
}

#[async_trait]
impl RoomStore for RedisStore {
    async fn create_room(&self, room_id: &RoomId, created_at: i64, ttl_seconds: u64) -> anyhow::Result<()> {
        let key = RoomKey::Meta.key_for(room_id);
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(
                &key,
                &[
                    (FIELD_CONNECTED, "[]".to_string()),
                    (FIELD_CREATED_AT, created_at.to_string()),
                ],
            )
            .expire(&key, ttl_seconds as i64)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn load_meta(&self, room_id: &RoomId) -> anyhow::Result<Option<RoomMeta>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(RoomKey::Meta.key_for(room_id)).await?;
        parse_meta(&fields)
    }

    async fn try_add_member(
        &self,
        room_id: &RoomId,
        token: &MembershipToken,
        capacity: usize,
    ) -> anyhow::Result<AddMemberOutcome> {
        let mut conn = self.conn.clone();
        let outcome: i64 = self
            .add_member
            .key(RoomKey::Meta.key_for(room_id))
            .arg(token.as_str())
            .arg(capacity)
            .invoke_async(&mut conn)
            .await?;
        match outcome {
            1 => Ok(AddMemberOutcome::Added),
            0 => Ok(AddMemberOutcome::AlreadyMember),
            -1 => Ok(AddMemberOutcome::RoomMissing),
            -2 => Ok(AddMemberOutcome::Full),
            other => Err(anyhow!("unexpected add-member result {}", other)),
        }
    }

    async fn remove_member(&self, room_id: &RoomId, token: &MembershipToken) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .remove_member
            .key(RoomKey::Meta.key_for(room_id))
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    async fn append_message(&self, room_id: &RoomId, message: &ChatMessage) -> anyhow::Result<bool> {
        let encoded = serde_json::to_string(message)?;
        let mut conn = self.conn.clone();
        let appended: i64 = self
            .append_message
            .key(RoomKey::Meta.key_for(room_id))
            .key(RoomKey::Messages.key_for(room_id))
            .arg(encoded)
            .invoke_async(&mut conn)
            .await?;
        Ok(appended == 1)
    }

    async fn list_messages(&self, room_id: &RoomId) -> anyhow::Result<Vec<ChatMessage>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn
            .lrange(RoomKey::Messages.key_for(room_id), 0, -1)
            .await?;
        Ok(raw
            .iter()
            .filter_map(|item| match serde_json::from_str::<ChatMessage>(item) {
                Ok(message) => Some(message),
                Err(err) => {
                    warn!("skipping malformed stored message in room {}: {}", room_id, err);
                    None
                }
            })
            .collect())
    }

    async fn remaining_ttl(&self, room_id: &RoomId, key: RoomKey) -> anyhow::Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key.key_for(room_id)).await?;
        Ok(u64::try_from(ttl).ok())
    }

    async fn expire(&self, room_id: &RoomId, key: RoomKey, ttl_seconds: u64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .expire(key.key_for(room_id), ttl_seconds as i64)
            .await?;
        Ok(())
    }

    async fn room_exists(&self, room_id: &RoomId) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(RoomKey::Meta.key_for(room_id)).await?;
        Ok(exists)
    }

    async fn delete_room(&self, room_id: &RoomId) -> anyhow::Result<()> {
        let keys: Vec<String> = RoomKey::ALL.iter().map(|key| key.key_for(room_id)).collect();
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn missing_created_at_means_no_room() {
        assert!(parse_meta(&fields(&[("connected", "[]")])).unwrap().is_none());
        assert!(parse_meta(&HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn meta_fields_are_decoded() {
        let meta = parse_meta(&fields(&[("connected", r#"["a","b"]"#), ("createdAt", "42")]))
            .unwrap()
            .unwrap();
        assert_eq!(meta.created_at, 42);
        assert_eq!(meta.connected.len(), 2);
    }

    #[test]
    fn lua_empty_table_encoding_is_tolerated() {
        let meta = parse_meta(&fields(&[("connected", ""), ("createdAt", "1")]))
            .unwrap()
            .unwrap();
        assert!(meta.connected.is_empty());
    }
}
