use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use pool_shared::protocol::{ClientMsg, GameEventMsg, ServerMsg};
use pool_shared::vec2::Vec2;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::game_loop::{JoinAccepted, RoomBroadcast, RoomCommand};
use crate::room::JoinError;
use crate::rooms::{RoomHandle, RoomRegistry};

/// Shared app state passed to each handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
}

/// `?id=..&secret=..` on the socket URL
#[derive(Debug, Deserialize)]
pub struct AuthParams {
    pub id: String,
    pub secret: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
}

/// `POST /rooms`
pub async fn create_room(State(app_state): State<AppState>) -> Result<Json<CreateRoomResponse>, StatusCode> {
    match app_state.registry.create_room() {
        Ok(room_id) => Ok(Json(CreateRoomResponse { room_id })),
        Err(e) => {
            tracing::warn!("Room creation refused: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

fn join_error_status(err: &JoinError) -> StatusCode {
    match err {
        JoinError::MissingCredentials => StatusCode::BAD_REQUEST,
        JoinError::SecretMismatch(_) => StatusCode::FORBIDDEN,
        JoinError::RoomFull => StatusCode::CONFLICT,
        JoinError::RoomClosed => StatusCode::NOT_FOUND,
    }
}

/// `GET /ws/{room_id}`: join the room, then upgrade.
/// Refusals are plain HTTP statuses so the client can tell them apart.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(auth): Query<AuthParams>,
    State(app_state): State<AppState>,
) -> Response {
    let Some(handle) = app_state.registry.get(&room_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // Subscribe before joining so nothing sent after the join is missed
    let broadcast_rx = handle.broadcast_tx.subscribe();

    let accepted = match join(&handle, &auth).await {
        Ok(accepted) => accepted,
        Err(e) => return join_error_status(&e).into_response(),
    };

    let limits = ConnectionLimits {
        max_message_bytes: app_state.registry.config().max_message_bytes,
        max_parse_errors: app_state.registry.config().max_parse_errors,
    };
    let seat = SeatGuard::new(handle.cmd_tx.clone(), auth.id);
    let player_id = seat.player_id.clone();
    ws.on_failed_upgrade(move |e| {
        tracing::warn!("Upgrade for player {} failed: {}", player_id, e);
    })
    .on_upgrade(move |socket| handle_socket(socket, handle, broadcast_rx, accepted, seat, limits))
}

/// Holds a joined seat until the socket task takes it over. Dropped while
/// still armed (the upgrade failed or never ran), it gives the seat back.
struct SeatGuard {
    cmd_tx: mpsc::Sender<RoomCommand>,
    player_id: String,
    armed: bool,
}

impl SeatGuard {
    fn new(cmd_tx: mpsc::Sender<RoomCommand>, player_id: String) -> Self {
        Self {
            cmd_tx,
            player_id,
            armed: true,
        }
    }

    /// The socket task now owns the `Leave`.
    fn disarm(mut self) -> String {
        self.armed = false;
        std::mem::take(&mut self.player_id)
    }
}

impl Drop for SeatGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let player_id = std::mem::take(&mut self.player_id);
        tracing::debug!("Releasing seat of player {} after unfinished upgrade", player_id);
        if let Err(e) = self.cmd_tx.try_send(RoomCommand::Leave { player_id }) {
            tracing::warn!("Could not release unused seat: {}", e);
        }
    }
}

async fn join(handle: &RoomHandle, auth: &AuthParams) -> Result<JoinAccepted, JoinError> {
    let (resp_tx, resp_rx) = oneshot::channel();
    handle
        .cmd_tx
        .send(RoomCommand::Join {
            player_id: auth.id.clone(),
            secret: auth.secret.clone(),
            response: resp_tx,
        })
        .await
        .map_err(|_| JoinError::RoomClosed)?;
    resp_rx.await.map_err(|_| JoinError::RoomClosed)?
}

#[derive(Debug, Clone, Copy)]
struct ConnectionLimits {
    max_message_bytes: usize,
    max_parse_errors: u32,
}

fn to_text(msg: &ServerMsg) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            None
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    handle: RoomHandle,
    mut broadcast_rx: broadcast::Receiver<RoomBroadcast>,
    accepted: JoinAccepted,
    seat: SeatGuard,
    limits: ConnectionLimits,
) {
    let my_id = seat.disarm();
    let (mut sink, mut stream) = socket.split();
    tracing::info!("Player {} connected", my_id);

    for msg in [
        ServerMsg::Welcome(accepted.welcome),
        ServerMsg::RoomUpdate(accepted.snapshot),
    ] {
        if let Some(frame) = to_text(&msg) {
            if sink.send(frame).await.is_err() {
                let _ = handle.cmd_tx.send(RoomCommand::Leave { player_id: my_id }).await;
                return;
            }
        }
    }

    let mut parse_errors: u32 = 0;

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > limits.max_message_bytes {
                            tracing::warn!("Player {} sent oversized message ({} bytes)", my_id, text.len());
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(client_msg) => {
                                let cmd = match client_msg {
                                    ClientMsg::CueShot { ball, shot } => RoomCommand::CueShot {
                                        player_id: my_id.clone(),
                                        ball,
                                        shot,
                                    },
                                    ClientMsg::PlaceCueBall { x, y } => RoomCommand::PlaceCueBall {
                                        player_id: my_id.clone(),
                                        position: Vec2::new(x, y),
                                    },
                                    ClientMsg::RequestSync => RoomCommand::RequestSync {
                                        player_id: my_id.clone(),
                                    },
                                };
                                if handle.cmd_tx.send(cmd).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                parse_errors += 1;
                                tracing::debug!("Player {} sent unparseable message: {}", my_id, e);
                                if parse_errors >= limits.max_parse_errors {
                                    tracing::warn!("Player {} exceeded parse error limit", my_id);
                                    let _ = sink.send(Message::Close(None)).await;
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if data.len() > limits.max_message_bytes {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Player {} socket error: {}", my_id, e);
                        break;
                    }
                    _ => {} // Ignore ping/pong
                }
            }

            // Server -> Client (broadcast)
            result = broadcast_rx.recv() => {
                match result {
                    Ok(broadcast) => {
                        let msg = match broadcast {
                            RoomBroadcast::Update(update) => ServerMsg::RoomUpdate(update),
                            RoomBroadcast::Shot { shooter_id, msg } => {
                                if shooter_id == my_id {
                                    continue; // Shooter already simulates locally
                                }
                                ServerMsg::ShotBroadcast(msg)
                            }
                            RoomBroadcast::Event(event) => ServerMsg::GameEvent(GameEventMsg { event }),
                            RoomBroadcast::SyncTo { player_id, msg } => {
                                if player_id != my_id {
                                    continue;
                                }
                                ServerMsg::RoomUpdate(msg)
                            }
                            RoomBroadcast::Closed => {
                                let _ = sink.send(Message::Close(None)).await;
                                break;
                            }
                        };

                        if let Some(frame) = to_text(&msg) {
                            if sink.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Player {} lagged by {} messages", my_id, n);
                        // A dropped shot relay would leave this client stale: ask for a full sync
                        let _ = handle.cmd_tx.send(RoomCommand::RequestSync {
                            player_id: my_id.clone(),
                        }).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Cleanup on disconnect
    let _ = handle
        .cmd_tx
        .send(RoomCommand::Leave {
            player_id: my_id.clone(),
        })
        .await;
    tracing::info!("Player {} disconnected", my_id);
}
