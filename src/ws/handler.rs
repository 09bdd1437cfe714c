use crate::api::handlers::AppState;
use crate::ws::connection::handle_connection;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use tracing::info;
use uuid::Uuid;

/// Handle WebSocket upgrade requests for the dashboard push channel.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let client_id = Uuid::new_v4().to_string();
    info!(client_id = %client_id, "WebSocket upgrade");

    let broadcast_rx = state.hub.subscribe();
    ws.on_upgrade(move |socket| handle_connection(socket, broadcast_rx, state, client_id))
}
