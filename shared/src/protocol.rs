use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ball::{Ball, BallColor, BallKey, Group, BALL_RADIUS};
use crate::events::GameEvent;
use crate::game::GameState;
use crate::table::{Pocket, Rail};
use crate::vec2::Vec2;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "room-update")]
    RoomUpdate(RoomUpdateMsg),
    #[serde(rename = "shot-broadcast")]
    ShotBroadcast(ShotBroadcastMsg),
    #[serde(rename = "game-event")]
    GameEvent(GameEventMsg),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    pub room_id: String,
    pub self_id: String,
    pub slot: u8,
}

/// Room snapshot. Fixed geometry is only present on a full sync; `balls` is
/// omitted when the sender has nothing to say about positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdateMsg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub balls: Option<Vec<BallWire>>,
    pub players: Vec<PlayerWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub rails: Option<Vec<Rail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub pockets: Option<Vec<Pocket>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub table: Option<TableWire>,
    pub game_started: bool,
    pub shot_in_progress: bool,
    pub game_over: bool,
    pub turn: u8,
    pub winner: Option<u8>,
    #[ts(type = "number")]
    pub turn_start_time: i64,
    #[serde(default)]
    pub foul_committed: bool,
    #[serde(default)]
    pub ball_in_hand: bool,
}

/// Shot relay: the impulse plus the exact pre-shot positions it applies to.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "camelCase")]
pub struct ShotBroadcastMsg {
    pub visible_shot: VisibleShot,
    pub ball_positions: Vec<BallWire>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct VisibleShot {
    pub ball: BallKey,
    pub shot: Vec2,
    pub shooter: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct GameEventMsg {
    pub event: GameEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct BallWire {
    pub key: BallKey,
    #[ts(type = "string")]
    pub color: BallColor,
    pub x: f32,
    pub y: f32,
}

impl BallWire {
    /// Centimetre precision, for periodic snapshots.
    pub fn rounded(ball: &Ball) -> Self {
        Self {
            key: ball.key,
            color: ball.color,
            x: round2(ball.position.x),
            y: round2(ball.position.y),
        }
    }

    /// Full precision, for shot replay.
    pub fn exact(ball: &Ball) -> Self {
        Self {
            key: ball.key,
            color: ball.color,
            x: ball.position.x,
            y: ball.position.y,
        }
    }

    pub fn to_ball(&self) -> Ball {
        Ball {
            key: self.key,
            color: self.color,
            position: Vec2::new(self.x, self.y),
            radius: BALL_RADIUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerWire {
    pub id: String,
    pub slot: u8,
    pub group: Option<Group>,
    #[serde(default)]
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct TableWire {
    pub width: f32,
    pub height: f32,
}

impl RoomUpdateMsg {
    /// Snapshot of `state` with rounded ball positions. `full` adds the fixed
    /// table geometry.
    pub fn from_state(state: &GameState, full: bool) -> Self {
        Self {
            balls: Some(state.balls.iter().map(BallWire::rounded).collect()),
            players: state
                .players
                .iter()
                .map(|p| PlayerWire {
                    id: p.id.clone(),
                    slot: p.slot,
                    group: p.group,
                    connected: true,
                })
                .collect(),
            rails: full.then(|| state.table.rails.clone()),
            pockets: full.then(|| state.table.pockets.clone()),
            table: full.then(|| TableWire {
                width: state.table.width,
                height: state.table.height,
            }),
            game_started: state.game_started,
            shot_in_progress: state.shot_in_progress,
            game_over: state.game_over,
            turn: state.turn.current,
            winner: state.winner,
            turn_start_time: state.turn.turn_start_time,
            foul_committed: state.foul_committed,
            ball_in_hand: state.ball_in_hand,
        }
    }
}

// === Client -> Server ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "cue-shot")]
    CueShot { ball: BallKey, shot: Vec2 },
    #[serde(rename = "place-cue-ball")]
    PlaceCueBall { x: f32, y: f32 },
    #[serde(rename = "request-sync")]
    RequestSync,
}

// === Conversion helpers ===

/// Round to centimetres (2 decimal places of a metre)
#[inline]
pub fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ball::{rack, Hue};
    use crate::game::Player;
    use crate::table::Table;

    fn test_state() -> GameState {
        let table = Table::standard(0.9, 0.1);
        let balls = rack(table.head_spot(), table.foot_spot());
        let mut state = GameState::new(table, balls, 1_700_000_000_000);
        state.players = vec![Player::new("p1", 0), Player::new("p2", 1)];
        state.players[1].group = Some(Group::Stripe);
        state.game_started = true;
        state
    }

    #[test]
    fn server_msg_welcome_roundtrip() {
        let msg = ServerMsg::Welcome(WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            server_version: "0.1.0".to_string(),
            room_id: "k3x9q2".to_string(),
            self_id: "p1".to_string(),
            slot: 0,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"welcome\""));
        assert!(json.contains("\"protocolVersion\":1"));
        assert!(json.contains("\"selfId\":\"p1\""));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::Welcome(w) => {
                assert_eq!(w.protocol_version, PROTOCOL_VERSION);
                assert_eq!(w.room_id, "k3x9q2");
                assert_eq!(w.slot, 0);
            }
            _ => panic!("Expected Welcome"),
        }
    }

    #[test]
    fn room_update_full_sync_has_geometry() {
        let msg = RoomUpdateMsg::from_state(&test_state(), true);
        let json = serde_json::to_string(&ServerMsg::RoomUpdate(msg)).unwrap();
        assert!(json.contains("\"type\":\"room-update\""));
        assert!(json.contains("\"rails\":"));
        assert!(json.contains("\"pockets\":"));
        assert!(json.contains("\"turnStartTime\":1700000000000"));
        assert!(json.contains("\"group\":\"stripe\""));
    }

    #[test]
    fn room_update_omits_unchanged_fixed_fields() {
        let mut msg = RoomUpdateMsg::from_state(&test_state(), false);
        msg.balls = None;
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("\"rails\""));
        assert!(!json.contains("\"balls\""));
        assert!(!json.contains("\"table\""));
        let parsed: RoomUpdateMsg = serde_json::from_str(&json).unwrap();
        assert!(parsed.balls.is_none());
        assert!(parsed.rails.is_none());
        assert!(parsed.game_started);
    }

    #[test]
    fn snapshot_rounds_to_centimetres() {
        let ball = Ball::new(BallKey(4), BallColor::Solid(Hue::Purple), Vec2::new(0.12345, -0.56789));
        let wire = BallWire::rounded(&ball);
        assert!((wire.x - 0.12).abs() < 1e-6);
        assert!((wire.y + 0.57).abs() < 1e-6);
        let exact = BallWire::exact(&ball);
        assert_eq!(exact.to_ball(), ball);
    }

    #[test]
    fn shot_broadcast_roundtrip_keeps_precision() {
        let state = test_state();
        let msg = ServerMsg::ShotBroadcast(ShotBroadcastMsg {
            visible_shot: VisibleShot {
                ball: BallKey(0),
                shot: Vec2::new(0.73, -0.011),
                shooter: 0,
            },
            ball_positions: state.balls.iter().map(BallWire::exact).collect(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"shot-broadcast\""));
        assert!(json.contains("\"visibleShot\""));
        assert!(json.contains("\"ballPositions\""));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::ShotBroadcast(s) => {
                assert_eq!(s.ball_positions.len(), 16);
                for (wire, ball) in s.ball_positions.iter().zip(&state.balls) {
                    assert_eq!(wire.to_ball(), *ball);
                }
            }
            _ => panic!("Expected ShotBroadcast"),
        }
    }

    #[test]
    fn game_event_msg_nests_event() {
        let msg = ServerMsg::GameEvent(GameEventMsg {
            event: GameEvent::Foul,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"game-event","event":{"type":"foul"}}"#);
    }

    #[test]
    fn client_msg_cue_shot_roundtrip() {
        let json = r#"{"type":"cue-shot","ball":0,"shot":{"x":0.4,"y":-0.2}}"#;
        let parsed: ClientMsg = serde_json::from_str(json).unwrap();
        match parsed {
            ClientMsg::CueShot { ball, shot } => {
                assert_eq!(ball, BallKey(0));
                assert!((shot.x - 0.4).abs() < 1e-6);
                assert!((shot.y + 0.2).abs() < 1e-6);
            }
            _ => panic!("Expected CueShot"),
        }
    }

    #[test]
    fn client_msg_place_cue_ball_roundtrip() {
        let msg = ClientMsg::PlaceCueBall { x: -0.5, y: 0.1 };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"place-cue-ball\""));
        let parsed: ClientMsg = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ClientMsg::PlaceCueBall { .. }));
    }

    #[test]
    fn unknown_client_msg_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn round2_values() {
        assert_eq!(round2(0.0), 0.0);
        assert!((round2(1.005_1) - 1.01).abs() < 1e-6);
        assert!((round2(-0.333) + 0.33).abs() < 1e-6);
    }
}
