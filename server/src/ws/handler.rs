use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /main — WebSocket upgrade endpoint.
///
/// The upgrade itself requires no credentials; authentication happens
/// afterwards over the socket via the `authenticate` event, so a connected
/// socket may sit unauthenticated indefinitely.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| actor::run_connection(socket, state))
}
