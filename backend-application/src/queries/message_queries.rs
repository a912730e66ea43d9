use backend_domain::ChatMessage;

use super::membership_queries::RoomMembership;
use crate::{AppError, AppState};

/// The room's message log as seen by `member`: owner tokens of other
/// members' messages are nulled.
pub async fn list_messages(state: &AppState, member: &RoomMembership) -> Result<Vec<ChatMessage>, AppError> {
    let messages = state.store.list_messages(&member.room_id).await?;
    Ok(messages
        .into_iter()
        .map(|message| message.redacted_for(Some(&member.token)))
        .collect())
}
