use tracing::{debug, warn};

use backend_domain::{ChatEvent, ChatMessage, MessageDraft};

use crate::queries::membership_queries::RoomMembership;
use crate::{AppError, AppState};

/// Stores a message, re-aligns the room's key expiry, then fans it out to
/// the room. The returned message keeps the sender's own token.
///
/// The log takes the room's deadline as part of the append, so a bus outage
/// after the write never leaves messages outliving the room.
pub async fn post_message(
    state: &AppState,
    member: &RoomMembership,
    draft: MessageDraft,
) -> Result<ChatMessage, AppError> {
    state.registry.validate_draft(&draft)?;

    let message = ChatMessage::from_draft(draft, member.room_id.clone(), member.token.clone());
    let event = ChatEvent::Message(message.clone());
    state.registry.check(&event)?;

    if !state.store.append_message(&member.room_id, &message).await? {
        return Err(AppError::NotFound(format!("room {}", member.room_id)));
    }

    match state.lifecycle.touch_on_activity(&member.room_id).await {
        Ok(ttl) => debug!("room {} ttl propagated: {:?}", member.room_id, ttl),
        Err(err) => warn!("ttl propagation for room {} failed: {}", member.room_id, err),
    }

    state
        .bridge
        .publish_event(&event, Some(&member.room_id))
        .await?;
    Ok(message)
}
