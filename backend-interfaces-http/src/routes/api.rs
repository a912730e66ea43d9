use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::Router;

use backend_application::AppState;

use crate::handlers::{message_handlers, ops_handlers, room_handlers, socket_handlers};
use crate::middleware::admit_room;

pub fn build_router(state: AppState) -> Router {
    let room_pages = Router::new()
        .route("/room/:room_id", get(room_handlers::room_page))
        .route_layer(from_fn_with_state(state.clone(), admit_room));

    Router::new()
        .route("/api/room/create", post(room_handlers::create_room))
        .route("/api/room/ttl", get(room_handlers::room_ttl))
        .route("/api/room", delete(room_handlers::delete_room))
        .route(
            "/api/messages",
            get(message_handlers::list_messages).post(message_handlers::post_message),
        )
        .route(&state.config.socket_path, get(socket_handlers::socket_upgrade))
        .route("/ops/health/live", get(ops_handlers::health_live))
        .route("/ops/health/ready", get(ops_handlers::health_ready))
        .route("/ops/metrics/prometheus", get(ops_handlers::metrics_prometheus))
        .merge(room_pages)
        .with_state(state)
}
