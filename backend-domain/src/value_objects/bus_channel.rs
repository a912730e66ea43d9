// Bus channel naming: `room:{roomId}:{channel}:{event}` or `{channel}:{event}`

use std::fmt;

use super::{EventKind, RoomId};

const ROOM_SEGMENT: &str = "room";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BusChannel {
    pub room_id: Option<RoomId>,
    pub channel: String,
    pub event: String,
}

impl BusChannel {
    pub fn for_kind(kind: EventKind, room_id: Option<&RoomId>) -> Self {
        Self {
            room_id: room_id.cloned(),
            channel: kind.channel().to_string(),
            event: kind.event().to_string(),
        }
    }

    /// Every room-scoped channel a process listens on for `room_id`.
    pub fn room_channels(room_id: &RoomId) -> Vec<String> {
        EventKind::ALL
            .into_iter()
            .map(|kind| Self::for_kind(kind, Some(room_id)).name())
            .collect()
    }

    pub fn name(&self) -> String {
        match &self.room_id {
            Some(room_id) => format!(
                "{}:{}:{}:{}",
                ROOM_SEGMENT, room_id, self.channel, self.event
            ),
            None => format!("{}:{}", self.channel, self.event),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split(':').collect();
        if parts[0] == ROOM_SEGMENT && parts.len() >= 4 {
            let room_id = RoomId::parse(parts[1]).ok()?;
            return Some(Self {
                room_id: Some(room_id),
                channel: parts[2].to_string(),
                event: parts[3].to_string(),
            });
        }
        if parts.len() >= 2 {
            return Some(Self {
                room_id: None,
                channel: parts[0].to_string(),
                event: parts[1].to_string(),
            });
        }
        None
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_parts(&self.channel, &self.event)
    }

    pub fn socket_event_name(&self) -> String {
        format!("{}:{}", self.channel, self.event)
    }
}

impl fmt::Display for BusChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
