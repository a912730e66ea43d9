// Wire envelope written to the shared bus

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ChatEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusEnvelope {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub payload: Value,
}

impl BusEnvelope {
    pub fn for_event(event: &ChatEvent, room_scoped: bool) -> serde_json::Result<Self> {
        Ok(Self {
            kind: event.kind().as_str().to_string(),
            room_id: room_scoped.then(|| event.room_id().to_string()),
            payload: event.to_payload()?,
        })
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
