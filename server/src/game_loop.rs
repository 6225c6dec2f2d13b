use std::time::Duration;

use pool_shared::ball::BallKey;
use pool_shared::events::GameEvent;
use pool_shared::protocol::{RoomUpdateMsg, ShotBroadcastMsg, WelcomeMsg, PROTOCOL_VERSION};
use pool_shared::vec2::Vec2;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::config::ServerConfig;
use crate::room::{now_ms, JoinError, Room};

/// What a successful join hands back to the connection.
#[derive(Debug, Clone)]
pub struct JoinAccepted {
    pub welcome: WelcomeMsg,
    /// Full sync including table geometry
    pub snapshot: RoomUpdateMsg,
}

/// Commands from client connections to a room loop
pub enum RoomCommand {
    Join {
        player_id: String,
        secret: String,
        response: oneshot::Sender<Result<JoinAccepted, JoinError>>,
    },
    Leave {
        player_id: String,
    },
    CueShot {
        player_id: String,
        ball: BallKey,
        shot: Vec2,
    },
    PlaceCueBall {
        player_id: String,
        position: Vec2,
    },
    RequestSync {
        player_id: String,
    },
}

/// Broadcasts from a room loop to its connections
#[derive(Debug, Clone)]
pub enum RoomBroadcast {
    Update(RoomUpdateMsg),
    /// Delivered to everyone except the shooter
    Shot {
        shooter_id: String,
        msg: ShotBroadcastMsg,
    },
    Event(GameEvent),
    /// Delivered only to `player_id`
    SyncTo {
        player_id: String,
        msg: RoomUpdateMsg,
    },
    /// Lease expired; connections should close
    Closed,
}

/// Run one room until its lease expires or every command sender is gone.
/// Owns the room state.
pub async fn run_room_loop(
    mut room: Room,
    mut cmd_rx: mpsc::Receiver<RoomCommand>,
    broadcast_tx: broadcast::Sender<RoomBroadcast>,
    config: ServerConfig,
) {
    let tick_duration = Duration::from_secs_f64(1.0 / config.tick_rate_hz as f64);
    let broadcast_every_n = (config.tick_rate_hz / config.broadcast_rate_hz).max(1) as u64;
    let dt = 1.0 / config.tick_rate_hz as f32;
    let mut tick_count: u64 = 0;

    let mut tick_interval = tokio::time::interval(tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut lease_deadline = Instant::now() + config.room_lease;

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let events = room.tick(dt, now_ms());

                let mut changed = false;
                for event in events {
                    changed |= event.is_rule_event() || matches!(event, GameEvent::ShotEnd { .. });
                    if event.is_rule_event() {
                        let _ = broadcast_tx.send(RoomBroadcast::Event(event));
                    }
                }

                tick_count += 1;
                if changed || tick_count % broadcast_every_n == 0 {
                    let _ = broadcast_tx.send(RoomBroadcast::Update(room.snapshot(false)));
                }
            }

            _ = tokio::time::sleep_until(lease_deadline) => {
                tracing::info!(room = %room.id(), "room lease expired");
                let _ = broadcast_tx.send(RoomBroadcast::Closed);
                break;
            }

            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    RoomCommand::Join { player_id, secret, response } => {
                        let result = room.join(&player_id, &secret, now_ms()).map(|slot| {
                            lease_deadline = Instant::now() + config.room_lease;
                            JoinAccepted {
                                welcome: WelcomeMsg {
                                    protocol_version: PROTOCOL_VERSION,
                                    server_version: env!("CARGO_PKG_VERSION").to_string(),
                                    room_id: room.id().to_string(),
                                    self_id: player_id.clone(),
                                    slot,
                                },
                                snapshot: room.snapshot(true),
                            }
                        });
                        match &result {
                            Ok(accepted) => tracing::info!(
                                room = %room.id(), player = %player_id, slot = accepted.welcome.slot,
                                "player joined"
                            ),
                            Err(e) => tracing::info!(room = %room.id(), player = %player_id, "join refused: {e}"),
                        }
                        let joined = result.is_ok();
                        let _ = response.send(result);
                        if joined {
                            let _ = broadcast_tx.send(RoomBroadcast::Update(room.snapshot(false)));
                        }
                    }
                    RoomCommand::Leave { player_id } => {
                        room.leave(&player_id);
                        let _ = broadcast_tx.send(RoomBroadcast::Update(room.snapshot(false)));
                        tracing::info!(room = %room.id(), player = %player_id, "player left");
                    }
                    RoomCommand::CueShot { player_id, ball, shot } => {
                        match room.shoot(&player_id, ball, shot) {
                            Ok(msg) => {
                                lease_deadline = Instant::now() + config.room_lease;
                                let _ = broadcast_tx.send(RoomBroadcast::Shot {
                                    shooter_id: player_id,
                                    msg,
                                });
                                let _ = broadcast_tx.send(RoomBroadcast::Update(room.snapshot(false)));
                            }
                            Err(e) => {
                                tracing::debug!(room = %room.id(), player = %player_id, "shot ignored: {e}");
                            }
                        }
                    }
                    RoomCommand::PlaceCueBall { player_id, position } => {
                        match room.place_cue_ball(&player_id, position) {
                            Ok(()) => {
                                let _ = broadcast_tx.send(RoomBroadcast::Update(room.snapshot(false)));
                            }
                            Err(e) => {
                                tracing::debug!(room = %room.id(), player = %player_id, "placement ignored: {e}");
                            }
                        }
                    }
                    RoomCommand::RequestSync { player_id } => {
                        let _ = broadcast_tx.send(RoomBroadcast::SyncTo {
                            player_id,
                            msg: room.snapshot(true),
                        });
                    }
                }
            }

            else => break,
        }
    }

    tracing::info!(room = %room.id(), "room loop ended");
}
