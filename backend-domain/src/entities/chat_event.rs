// Chat events relayed between parties

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_objects::{EventKind, MembershipToken, RoomId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    pub timestamp: i64,
    pub room_id: RoomId,
    /// Owner marker. Nulled before the message reaches anyone but its owner.
    #[serde(default)]
    pub token: Option<MembershipToken>,
}

impl ChatMessage {
    /// Stamps a validated draft with a fresh id and the current time.
    pub fn from_draft(draft: MessageDraft, room_id: RoomId, token: MembershipToken) -> Self {
        Self {
            id: crate::utils::new_message_id(),
            sender: draft.sender,
            text: draft.text,
            timestamp: crate::utils::now_millis(),
            room_id,
            token: Some(token),
        }
    }

    pub fn redacted_for(mut self, requester: Option<&MembershipToken>) -> Self {
        if self.token.as_ref() != requester {
            self.token = None;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDestroy {
    pub room_id: RoomId,
    pub is_destroyed: bool,
}

impl ChatDestroy {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            is_destroyed: true,
        }
    }
}

/// Body of a message post before the server assigns id and timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDraft {
    pub sender: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message(ChatMessage),
    Destroy(ChatDestroy),
}

impl ChatEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChatEvent::Message(_) => EventKind::ChatMessage,
            ChatEvent::Destroy(_) => EventKind::ChatDestroy,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        match self {
            ChatEvent::Message(message) => &message.room_id,
            ChatEvent::Destroy(destroy) => &destroy.room_id,
        }
    }

    pub fn to_payload(&self) -> serde_json::Result<Value> {
        match self {
            ChatEvent::Message(message) => serde_json::to_value(message),
            ChatEvent::Destroy(destroy) => serde_json::to_value(destroy),
        }
    }
}
