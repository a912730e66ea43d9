// Closed set of (channel, event) pairs carried by the relay

use std::fmt;
use std::str::FromStr;

use crate::errors::UnknownEventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ChatMessage,
    ChatDestroy,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::ChatMessage, EventKind::ChatDestroy];

    pub fn channel(&self) -> &'static str {
        match self {
            EventKind::ChatMessage | EventKind::ChatDestroy => "chat",
        }
    }

    pub fn event(&self) -> &'static str {
        match self {
            EventKind::ChatMessage => "message",
            EventKind::ChatDestroy => "destroy",
        }
    }

    pub fn from_parts(channel: &str, event: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.channel() == channel && kind.event() == event)
    }

    /// `chat.message` style name used in the bus envelope.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ChatMessage => "chat.message",
            EventKind::ChatDestroy => "chat.destroy",
        }
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (channel, event) = s.split_once('.').unwrap_or((s, ""));
        Self::from_parts(channel, event).ok_or_else(|| UnknownEventKind {
            channel: channel.to_string(),
            event: event.to_string(),
        })
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_resolve_from_their_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
            assert_eq!(EventKind::from_parts(kind.channel(), kind.event()), Some(kind));
        }
    }

    #[test]
    fn unknown_pair_reports_channel_and_event() {
        let err = "chat.typing".parse::<EventKind>().unwrap_err();
        assert_eq!(err.channel, "chat");
        assert_eq!(err.event, "typing");
    }
}
