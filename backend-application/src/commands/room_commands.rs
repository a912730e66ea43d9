use backend_domain::RoomId;

use crate::queries::membership_queries::RoomMembership;
use crate::{AppError, AppState};

pub async fn create_room(state: &AppState) -> Result<RoomId, AppError> {
    state.lifecycle.create_room().await
}

pub async fn delete_room(state: &AppState, member: &RoomMembership) -> Result<(), AppError> {
    state.lifecycle.destroy_room(&member.room_id).await
}
