use backend_domain::{MembershipToken, RoomId};

use crate::{AppError, AppState};

/// A caller whose cookie token is in the room's member set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMembership {
    pub room_id: RoomId,
    pub token: MembershipToken,
}

/// Resolves the room id and cookie of a room-scoped API call into a
/// membership. Anything missing or unknown is `Unauthorized`.
pub async fn authorize_member(
    state: &AppState,
    room_id: Option<&str>,
    token: Option<MembershipToken>,
) -> Result<RoomMembership, AppError> {
    let (Some(raw_room), Some(token)) = (room_id, token) else {
        return Err(AppError::Unauthorized);
    };
    let room_id = RoomId::parse(raw_room).map_err(|_| AppError::Unauthorized)?;
    let is_member = state
        .store
        .load_meta(&room_id)
        .await?
        .map(|meta| meta.has_member(&token))
        .unwrap_or(false);
    if !is_member {
        return Err(AppError::Unauthorized);
    }
    Ok(RoomMembership { room_id, token })
}
