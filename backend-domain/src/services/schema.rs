// Schema registry: per (channel, event) payload contracts

use std::collections::BTreeMap;

use serde_json::Value;

use crate::entities::{BusEnvelope, ChatDestroy, ChatEvent, ChatMessage, MessageDraft};
use crate::errors::{DecodeError, RegistryError, SchemaViolation, UnknownEventKind};
use crate::value_objects::{BusChannel, EventKind};

pub const MAX_SENDER_CHARS: usize = 100;
pub const MAX_DRAFT_SENDER_CHARS: usize = 20;
pub const MAX_TEXT_CHARS: usize = 1000;

/// Immutable set of channel/event definitions loaded once at startup.
///
/// Lookups go channel first, then event, so every pair added to
/// [`EventKind`] is visible to the admission and publish paths alike.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    definitions: BTreeMap<&'static str, BTreeMap<&'static str, EventKind>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let mut definitions: BTreeMap<&'static str, BTreeMap<&'static str, EventKind>> =
            BTreeMap::new();
        for kind in EventKind::ALL {
            definitions
                .entry(kind.channel())
                .or_default()
                .insert(kind.event(), kind);
        }
        Self { definitions }
    }
}

impl SchemaRegistry {
    pub fn resolve(&self, channel: &str, event: &str) -> Result<EventKind, UnknownEventKind> {
        self.definitions
            .get(channel)
            .and_then(|events| events.get(event))
            .copied()
            .ok_or_else(|| UnknownEventKind {
                channel: channel.to_string(),
                event: event.to_string(),
            })
    }

    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.definitions
            .values()
            .flat_map(|events| events.values().copied())
    }

    /// Validates an untyped payload for `channel`/`event`.
    pub fn validate_parts(
        &self,
        channel: &str,
        event: &str,
        payload: Value,
    ) -> Result<ChatEvent, RegistryError> {
        let kind = self.resolve(channel, event)?;
        Ok(self.validate(kind, payload)?)
    }

    /// Parses and normalizes `payload` into the typed event for `kind`.
    /// Unknown fields are dropped.
    pub fn validate(&self, kind: EventKind, payload: Value) -> Result<ChatEvent, SchemaViolation> {
        let event = match kind {
            EventKind::ChatMessage => serde_json::from_value::<ChatMessage>(payload)
                .map(ChatEvent::Message),
            EventKind::ChatDestroy => serde_json::from_value::<ChatDestroy>(payload)
                .map(ChatEvent::Destroy),
        }
        .map_err(|err| SchemaViolation::new(kind.as_str(), "payload", err.to_string()))?;
        self.check(&event)?;
        Ok(event)
    }

    /// Field-level contract for an already typed event.
    pub fn check(&self, event: &ChatEvent) -> Result<(), SchemaViolation> {
        let kind = event.kind().as_str();
        match event {
            ChatEvent::Message(message) => {
                if message.id.trim().is_empty() {
                    return Err(SchemaViolation::new(kind, "id", "must not be empty"));
                }
                check_max_chars(kind, "sender", &message.sender, MAX_SENDER_CHARS)?;
                check_max_chars(kind, "text", &message.text, MAX_TEXT_CHARS)?;
            }
            ChatEvent::Destroy(destroy) => {
                if !destroy.is_destroyed {
                    return Err(SchemaViolation::new(kind, "isDestroyed", "must be true"));
                }
            }
        }
        Ok(())
    }

    /// Contract for the message-post body accepted over HTTP.
    pub fn validate_draft(&self, draft: &MessageDraft) -> Result<(), SchemaViolation> {
        let kind = EventKind::ChatMessage.as_str();
        check_max_chars(kind, "sender", &draft.sender, MAX_DRAFT_SENDER_CHARS)?;
        check_max_chars(kind, "text", &draft.text, MAX_TEXT_CHARS)?;
        Ok(())
    }

    /// Decodes a raw bus message into its channel and typed event.
    pub fn decode(&self, channel: &str, raw: &str) -> Result<(BusChannel, ChatEvent), DecodeError> {
        let bus_channel =
            BusChannel::parse(channel).ok_or_else(|| DecodeError::Channel(channel.to_string()))?;
        let channel_kind = self.resolve(&bus_channel.channel, &bus_channel.event)?;
        let envelope = BusEnvelope::decode(raw)?;
        let envelope_kind = envelope.kind.parse::<EventKind>()?;
        if envelope_kind != channel_kind {
            return Err(DecodeError::KindMismatch {
                envelope: envelope.kind,
                channel: channel.to_string(),
            });
        }
        let event = self.validate(envelope_kind, envelope.payload)?;
        Ok((bus_channel, event))
    }
}

fn check_max_chars(kind: &str, field: &str, value: &str, max: usize) -> Result<(), SchemaViolation> {
    let count = value.chars().count();
    if count > max {
        return Err(SchemaViolation::new(
            kind,
            field,
            format!("must be at most {} characters (got {})", max, count),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_payload() -> Value {
        json!({
            "id": "m1",
            "sender": "fox",
            "text": "hi",
            "timestamp": 1700000000000_i64,
            "roomId": "R",
        })
    }

    #[test]
    fn resolves_declared_pairs_only() {
        let registry = SchemaRegistry::default();
        assert_eq!(registry.resolve("chat", "message").unwrap(), EventKind::ChatMessage);
        assert_eq!(registry.resolve("chat", "destroy").unwrap(), EventKind::ChatDestroy);
        assert!(registry.resolve("chat", "typing").is_err());
        assert!(registry.resolve("presence", "message").is_err());
        assert_eq!(registry.kinds().count(), EventKind::ALL.len());
    }

    #[test]
    fn valid_message_is_normalized() {
        let registry = SchemaRegistry::default();
        let mut payload = message_payload();
        payload["extra"] = json!("dropped");
        let event = registry.validate(EventKind::ChatMessage, payload).unwrap();
        let ChatEvent::Message(message) = &event else {
            panic!("expected message");
        };
        assert_eq!(message.sender, "fox");
        assert_eq!(message.token, None);
        assert!(event.to_payload().unwrap().get("extra").is_none());
    }

    #[test]
    fn oversized_text_is_a_violation() {
        let registry = SchemaRegistry::default();
        let mut payload = message_payload();
        payload["text"] = json!("x".repeat(MAX_TEXT_CHARS + 1));
        let err = registry.validate(EventKind::ChatMessage, payload).unwrap_err();
        assert_eq!(err.field, "text");
    }

    #[test]
    fn text_limit_counts_characters_not_bytes() {
        let registry = SchemaRegistry::default();
        let mut payload = message_payload();
        payload["text"] = json!("é".repeat(MAX_TEXT_CHARS));
        assert!(registry.validate(EventKind::ChatMessage, payload).is_ok());
    }

    #[test]
    fn missing_field_is_a_violation() {
        let registry = SchemaRegistry::default();
        let mut payload = message_payload();
        payload.as_object_mut().unwrap().remove("timestamp");
        let err = registry.validate(EventKind::ChatMessage, payload).unwrap_err();
        assert_eq!(err.kind, "chat.message");
    }

    #[test]
    fn destroy_requires_literal_true() {
        let registry = SchemaRegistry::default();
        assert!(registry
            .validate(EventKind::ChatDestroy, json!({"roomId": "R", "isDestroyed": true}))
            .is_ok());
        let err = registry
            .validate(EventKind::ChatDestroy, json!({"roomId": "R", "isDestroyed": false}))
            .unwrap_err();
        assert_eq!(err.field, "isDestroyed");
    }

    #[test]
    fn unknown_parts_fail_before_payload_checks() {
        let registry = SchemaRegistry::default();
        let err = registry
            .validate_parts("chat", "typing", json!({}))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownEventKind(_)));
    }

    #[test]
    fn draft_sender_limit_is_stricter_than_relay_limit() {
        let registry = SchemaRegistry::default();
        let draft = MessageDraft {
            sender: "s".repeat(MAX_DRAFT_SENDER_CHARS + 1),
            text: "hi".to_string(),
        };
        assert_eq!(registry.validate_draft(&draft).unwrap_err().field, "sender");
    }

    #[test]
    fn decode_rejects_malformed_json_and_mismatched_kind() {
        let registry = SchemaRegistry::default();
        assert!(matches!(
            registry.decode("room:R:chat:message", "{not json"),
            Err(DecodeError::Json(_))
        ));
        let destroy = json!({"kind": "chat.destroy", "roomId": "R", "payload": {"roomId": "R", "isDestroyed": true}});
        assert!(matches!(
            registry.decode("room:R:chat:message", &destroy.to_string()),
            Err(DecodeError::KindMismatch { .. })
        ));
        let (channel, event) = registry
            .decode("room:R:chat:destroy", &destroy.to_string())
            .unwrap();
        assert_eq!(channel.room_id.unwrap().as_str(), "R");
        assert_eq!(event.kind(), EventKind::ChatDestroy);
    }
}
