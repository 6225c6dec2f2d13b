//! Authoritative state of one room: the session plus who sits in which slot.

use pool_shared::ball::BallKey;
use pool_shared::events::GameEvent;
use pool_shared::game::Player;
use pool_shared::protocol::{BallWire, RoomUpdateMsg, ShotBroadcastMsg, VisibleShot};
use pool_shared::shot::ShotCommand;
use pool_shared::vec2::Vec2;
use pool_shared::{PlacementError, Session, ShotRejection};

use crate::config::ServerConfig;

/// Wall-clock milliseconds used for turn start times and the shot clock.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("Player id and secret are required")]
    MissingCredentials,

    #[error("Secret does not match player {0}")]
    SecretMismatch(String),

    #[error("Room is full")]
    RoomFull,

    #[error("Room is closed")]
    RoomClosed,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RoomError {
    #[error("Player not found in the room")]
    PlayerNotFound,

    #[error(transparent)]
    Shot(#[from] ShotRejection),

    #[error(transparent)]
    Placement(#[from] PlacementError),
}

struct Seat {
    id: String,
    secret: String,
    slot: u8,
    connections: u32,
}

pub struct Room {
    id: String,
    session: Session,
    seats: Vec<Seat>,
}

impl Room {
    pub fn new(id: impl Into<String>, config: &ServerConfig, now_ms: i64) -> Self {
        Self {
            id: id.into(),
            session: Session::new(config.physics, config.rules, now_ms),
            seats: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Seat a player, or re-admit a known id presenting the same secret.
    /// The game starts when the second seat fills.
    pub fn join(&mut self, player_id: &str, secret: &str, now_ms: i64) -> Result<u8, JoinError> {
        if player_id.is_empty() || secret.is_empty() {
            return Err(JoinError::MissingCredentials);
        }
        if let Some(seat) = self.seats.iter_mut().find(|s| s.id == player_id) {
            if seat.secret != secret {
                return Err(JoinError::SecretMismatch(player_id.to_string()));
            }
            seat.connections += 1;
            return Ok(seat.slot);
        }
        if self.seats.len() >= 2 {
            return Err(JoinError::RoomFull);
        }

        let slot = self.seats.len() as u8;
        self.seats.push(Seat {
            id: player_id.to_string(),
            secret: secret.to_string(),
            slot,
            connections: 1,
        });
        self.session.add_player(Player::new(player_id, slot));
        if self.seats.len() == 2 {
            self.session.start(now_ms);
            tracing::info!(room = %self.id, "game started");
        }
        Ok(slot)
    }

    /// One connection of `player_id` went away. The seat is kept for rejoin.
    pub fn leave(&mut self, player_id: &str) {
        if let Some(seat) = self.seats.iter_mut().find(|s| s.id == player_id) {
            seat.connections = seat.connections.saturating_sub(1);
        }
    }

    pub fn slot_of(&self, player_id: &str) -> Option<u8> {
        self.seats.iter().find(|s| s.id == player_id).map(|s| s.slot)
    }

    pub fn connected_count(&self) -> usize {
        self.seats.iter().filter(|s| s.connections > 0).count()
    }

    /// Apply a shot for `player_id` and build the relay for the other player.
    /// Positions are captured before the impulse so the peer can replay it.
    pub fn shoot(&mut self, player_id: &str, ball: BallKey, shot: Vec2) -> Result<ShotBroadcastMsg, RoomError> {
        let slot = self.slot_of(player_id).ok_or(RoomError::PlayerNotFound)?;
        let pre_shot = self.session.balls();
        self.session.shoot(slot, &ShotCommand { ball, impulse: shot })?;
        Ok(ShotBroadcastMsg {
            visible_shot: VisibleShot {
                ball,
                shot,
                shooter: slot,
            },
            ball_positions: pre_shot.iter().map(BallWire::exact).collect(),
        })
    }

    pub fn place_cue_ball(&mut self, player_id: &str, position: Vec2) -> Result<(), RoomError> {
        let slot = self.slot_of(player_id).ok_or(RoomError::PlayerNotFound)?;
        self.session.place_cue_ball(slot, position)?;
        Ok(())
    }

    pub fn tick(&mut self, dt: f32, now_ms: i64) -> Vec<GameEvent> {
        self.session.tick(dt, now_ms)
    }

    pub fn shot_in_progress(&self) -> bool {
        self.session.state().shot_in_progress
    }

    /// Snapshot for broadcast. `full` includes the fixed table geometry.
    pub fn snapshot(&self, full: bool) -> RoomUpdateMsg {
        let mut msg = RoomUpdateMsg::from_state(self.session.state(), full);
        for player in &mut msg.players {
            player.connected = self
                .seats
                .iter()
                .any(|s| s.id == player.id && s.connections > 0);
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_shared::CUE_BALL;

    fn test_room() -> Room {
        Room::new("abc123", &ServerConfig::default(), 0)
    }

    fn seated_room() -> Room {
        let mut room = test_room();
        room.join("alice", "s1", 0).unwrap();
        room.join("bob", "s2", 0).unwrap();
        room
    }

    #[test]
    fn first_two_players_get_slots() {
        let mut room = test_room();
        assert_eq!(room.join("alice", "s1", 0), Ok(0));
        assert!(!room.session().state().game_started);
        assert_eq!(room.join("bob", "s2", 5), Ok(1));
        assert!(room.session().state().game_started);
        assert_eq!(room.session().state().turn.turn_start_time, 5);
    }

    #[test]
    fn third_player_is_refused() {
        let mut room = seated_room();
        assert_eq!(room.join("carol", "s3", 0), Err(JoinError::RoomFull));
    }

    #[test]
    fn rejoin_needs_matching_secret() {
        let mut room = seated_room();
        assert_eq!(
            room.join("alice", "wrong", 0),
            Err(JoinError::SecretMismatch("alice".to_string()))
        );
        assert_eq!(room.join("alice", "s1", 0), Ok(0));
    }

    #[test]
    fn empty_credentials_refused() {
        let mut room = test_room();
        assert_eq!(room.join("", "s", 0), Err(JoinError::MissingCredentials));
        assert_eq!(room.join("a", "", 0), Err(JoinError::MissingCredentials));
    }

    #[test]
    fn leave_keeps_seat_but_marks_disconnected() {
        let mut room = seated_room();
        room.leave("bob");
        assert_eq!(room.connected_count(), 1);
        assert_eq!(room.slot_of("bob"), Some(1));
        let snapshot = room.snapshot(false);
        let bob = snapshot.players.iter().find(|p| p.id == "bob").unwrap();
        assert!(!bob.connected);
    }

    #[test]
    fn shot_relay_carries_pre_shot_positions() {
        let mut room = seated_room();
        let before = room.session().balls();
        let relay = room.shoot("alice", CUE_BALL, Vec2::new(0.8, 0.0)).unwrap();
        assert_eq!(relay.visible_shot.shooter, 0);
        assert_eq!(relay.ball_positions.len(), before.len());
        for (wire, ball) in relay.ball_positions.iter().zip(&before) {
            assert_eq!(wire.to_ball(), *ball);
        }
        assert!(room.shot_in_progress());
    }

    #[test]
    fn out_of_turn_shot_is_rejected() {
        let mut room = seated_room();
        let err = room.shoot("bob", CUE_BALL, Vec2::new(0.8, 0.0)).unwrap_err();
        assert_eq!(err, RoomError::Shot(ShotRejection::NotYourTurn));
        assert!(!room.shot_in_progress());
    }

    #[test]
    fn stranger_cannot_shoot() {
        let mut room = seated_room();
        let err = room.shoot("mallory", CUE_BALL, Vec2::new(0.8, 0.0)).unwrap_err();
        assert_eq!(err, RoomError::PlayerNotFound);
    }

    #[test]
    fn full_snapshot_has_geometry() {
        let room = seated_room();
        let full = room.snapshot(true);
        assert!(full.rails.is_some());
        assert!(full.table.is_some());
        assert_eq!(full.players.len(), 2);
        assert!(room.snapshot(false).rails.is_none());
    }
}
