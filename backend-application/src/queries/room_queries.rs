use serde::Serialize;

use backend_domain::RoomId;

use crate::{AppError, AppState};

/// Minimal description of a room, served on the room page route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub created_at: i64,
    pub members: usize,
    pub capacity: usize,
    pub ttl: Option<u64>,
}

pub async fn room_ttl(state: &AppState, room_id: &RoomId) -> Result<u64, AppError> {
    state
        .lifecycle
        .remaining_ttl(room_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("room {}", room_id)))
}

pub async fn describe_room(state: &AppState, room_id: &RoomId) -> Result<RoomSummary, AppError> {
    let meta = state
        .store
        .load_meta(room_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("room {}", room_id)))?;
    let ttl = state.lifecycle.remaining_ttl(room_id).await?;
    Ok(RoomSummary {
        room_id: room_id.clone(),
        created_at: meta.created_at,
        members: meta.connected.len(),
        capacity: state.config.room_capacity,
        ttl,
    })
}
