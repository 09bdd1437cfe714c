use crate::api::handlers::AppState;
use crate::error::AppError;
use crate::ws::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Handle one WebSocket connection. Hub broadcasts and call replies share a
/// single outgoing channel so the socket has exactly one writer.
pub async fn handle_connection(
    socket: WebSocket,
    mut broadcast_rx: broadcast::Receiver<ServerMessage>,
    state: AppState,
    client_id: String,
) {
    info!("WebSocket client connected: {}", client_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(64);

    let write_client_id = client_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    warn!("failed to serialize message: {e}");
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                debug!("send to client {} failed: {e}", write_client_id);
                break;
            }
        }
    });

    // Forward hub broadcasts. A lagging client just misses events and
    // re-fetches state on its next call.
    let forward_tx = out_tx.clone();
    let mut forward_task = tokio::spawn(async move {
        loop {
            match broadcast_rx.recv().await {
                Ok(msg) => {
                    if forward_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("client lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let recv_state = state.clone();
    let recv_client_id = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            let msg = match msg_result {
                Ok(m) => m,
                Err(e) => {
                    debug!("WebSocket error: {e}");
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(call) => handle_call(&recv_state, call).await,
                        Err(e) => {
                            warn!("unparseable client message from {}: {e}", recv_client_id);
                            ServerMessage::error(format!("unparseable message: {e}"), "badRequest")
                        }
                    };
                    if out_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    info!("client {} closed connection", recv_client_id);
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum answers pings automatically.
                }
                Message::Binary(_) => {
                    warn!("unexpected binary message from client {}", recv_client_id);
                }
            }
        }
    });

    tokio::select! {
        _ = &mut write_task => {
            recv_task.abort();
            forward_task.abort();
        }
        _ = &mut recv_task => {
            write_task.abort();
            forward_task.abort();
        }
        _ = &mut forward_task => {
            write_task.abort();
            recv_task.abort();
        }
    }

    info!("WebSocket client disconnected: {}", client_id);
}

/// Service one client call; errors become error events instead of dropping
/// the connection.
async fn handle_call(state: &AppState, call: ClientMessage) -> ServerMessage {
    match call {
        ClientMessage::GetCurrentReadings => match state.readings.current().await {
            Ok(readings) => ServerMessage::CurrentReadings { readings },
            Err(e) => error_event(e),
        },
        ClientMessage::GetDiscoveryStatus => ServerMessage::DiscoveryStatus {
            status: state.discovery.status(),
        },
        ClientMessage::SetupDiscovery { request } => {
            match state.discovery.setup(&request).await {
                Ok(()) => ServerMessage::DiscoveryStatus {
                    status: state.discovery.status(),
                },
                Err(e) => error_event(e),
            }
        }
        ClientMessage::TeardownDiscovery => match state.discovery.teardown().await {
            Ok(()) => ServerMessage::DiscoveryStatus {
                status: state.discovery.status(),
            },
            Err(e) => error_event(e),
        },
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

fn error_event(e: AppError) -> ServerMessage {
    let code = match &e {
        AppError::Validation(_) => "validation",
        AppError::NotFound(_) => "notFound",
        AppError::Conflict(_) => "conflict",
        AppError::Transport(_) => "transport",
        _ => "internal",
    };
    ServerMessage::error(e.to_string(), code)
}
