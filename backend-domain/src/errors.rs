// Domain error taxonomy

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} payload rejected: {field} {reason}")]
pub struct SchemaViolation {
    pub kind: String,
    pub field: String,
    pub reason: String,
}

impl SchemaViolation {
    pub fn new(kind: impl Into<String>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown channel/event: {channel}/{event}")]
pub struct UnknownEventKind {
    pub channel: String,
    pub event: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    UnknownEventKind(#[from] UnknownEventKind),
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Reasons an incoming bus payload is dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed bus channel '{0}'")]
    Channel(String),
    #[error("malformed bus payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    UnknownEventKind(#[from] UnknownEventKind),
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),
    #[error("envelope kind {envelope} does not match channel {channel}")]
    KindMismatch { envelope: String, channel: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRoomId {
    #[error("room id is empty")]
    Empty,
    #[error("room id is too long ({0} bytes)")]
    TooLong(usize),
    #[error("room id contains reserved character {0:?}")]
    ReservedChar(char),
}
