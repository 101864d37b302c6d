use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{services::live_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws/matches/{id}",
    tag = "live",
    params(("id" = Uuid, Path, description = "Match to watch or play")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a live match socket. The first frame must be an
/// identification message carrying a session token.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(match_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| live_service::handle_socket(state, match_id, socket))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/matches/{id}", get(ws_handler))
}
