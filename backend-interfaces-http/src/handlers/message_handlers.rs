use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use backend_application::commands::message_commands;
use backend_application::queries::message_queries;
use backend_application::AppState;
use backend_domain::{ChatMessage, MessageDraft};

use super::room_handlers::{require_member, RoomQuery};
use crate::error::HttpError;

#[derive(Serialize)]
pub struct MessageList {
    messages: Vec<ChatMessage>,
}

pub async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RoomQuery>,
    Json(draft): Json<MessageDraft>,
) -> Result<Json<ChatMessage>, HttpError> {
    let member = require_member(&state, &headers, &query).await?;
    let message = message_commands::post_message(&state, &member, draft).await?;
    Ok(Json(message))
}

pub async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RoomQuery>,
) -> Result<Json<MessageList>, HttpError> {
    let member = require_member(&state, &headers, &query).await?;
    let messages = message_queries::list_messages(&state, &member).await?;
    Ok(Json(MessageList { messages }))
}
