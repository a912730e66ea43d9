use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use backend_application::commands::room_commands;
use backend_application::queries::membership_queries::{authorize_member, RoomMembership};
use backend_application::queries::room_queries::{self, RoomSummary};
use backend_application::AppState;
use backend_domain::RoomId;

use crate::error::HttpError;
use crate::middleware::membership_token;

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    #[serde(rename = "roomId")]
    pub room_id: Option<String>,
}

#[derive(Serialize)]
pub struct CreatedRoom {
    #[serde(rename = "roomId")]
    room_id: RoomId,
}

#[derive(Serialize)]
pub struct RoomTtl {
    ttl: u64,
}

/// Resolves `?roomId=` plus the membership cookie into a member, or 401.
pub async fn require_member(
    state: &AppState,
    headers: &HeaderMap,
    query: &RoomQuery,
) -> Result<RoomMembership, HttpError> {
    let token = membership_token(headers, &state.config.cookie_name);
    Ok(authorize_member(state, query.room_id.as_deref(), token).await?)
}

pub async fn create_room(State(state): State<AppState>) -> Result<Json<CreatedRoom>, HttpError> {
    let room_id = room_commands::create_room(&state).await?;
    Ok(Json(CreatedRoom { room_id }))
}

pub async fn room_ttl(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<RoomTtl>, HttpError> {
    let raw = query
        .room_id
        .ok_or_else(|| HttpError::BadRequest("roomId is required".to_string()))?;
    let room_id = RoomId::parse(&raw).map_err(|err| HttpError::BadRequest(err.to_string()))?;
    let ttl = room_queries::room_ttl(&state, &room_id).await?;
    Ok(Json(RoomTtl { ttl }))
}

pub async fn delete_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RoomQuery>,
) -> Result<StatusCode, HttpError> {
    let member = require_member(&state, &headers, &query).await?;
    room_commands::delete_room(&state, &member).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stand-in for the room page once admission has let the caller through.
pub async fn room_page(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSummary>, HttpError> {
    let room_id = RoomId::parse(&room_id).map_err(|err| HttpError::BadRequest(err.to_string()))?;
    Ok(Json(room_queries::describe_room(&state, &room_id).await?))
}
