//! Networked game mirror: a local physics world that predicts shots, plus
//! the server's view of turn, roster and flags.

use pool_shared::ball::rack;
use pool_shared::config::PhysicsConfig;
use pool_shared::error::{PlacementError, ShotRejection};
use pool_shared::events::GameEvent;
use pool_shared::protocol::{ClientMsg, ServerMsg};
use pool_shared::session::validate_placement;
use pool_shared::shot::ShotCommand;
use pool_shared::sync::{apply_room_update, replay_shot};
use pool_shared::table::Table;
use pool_shared::vec2::Vec2;
use pool_shared::{GameState, PhysicsWorld, CUE_BALL};
use tracing::{debug, info, warn};

pub struct NetworkGame {
    self_id: Option<String>,
    slot: Option<u8>,
    room_id: Option<String>,
    state: GameState,
    world: PhysicsWorld,
}

impl NetworkGame {
    /// Racked standard table until the first full sync replaces it.
    pub fn new(physics: PhysicsConfig) -> Self {
        let table = Table::standard(physics.rail_restitution, physics.rail_friction);
        let balls = rack(table.head_spot(), table.foot_spot());
        let world = PhysicsWorld::new(physics, table.clone(), &balls);
        Self {
            self_id: None,
            slot: None,
            room_id: None,
            state: GameState::new(table, balls, 0),
            world,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn slot(&self) -> Option<u8> {
        self.slot
    }

    pub fn self_id(&self) -> Option<&str> {
        self.self_id.as_deref()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn is_my_turn(&self) -> bool {
        self.slot == Some(self.state.turn.current)
    }

    /// Fold one server message into the mirror. Returns the game events it
    /// carried or caused locally.
    pub fn handle_message(&mut self, msg: ServerMsg) -> Vec<GameEvent> {
        match msg {
            ServerMsg::Welcome(welcome) => {
                info!(
                    room = %welcome.room_id, slot = welcome.slot,
                    server_version = %welcome.server_version, "joined room"
                );
                self.self_id = Some(welcome.self_id);
                self.slot = Some(welcome.slot);
                self.room_id = Some(welcome.room_id);
                Vec::new()
            }
            ServerMsg::RoomUpdate(update) => {
                apply_room_update(&mut self.state, &mut self.world, &update);
                Vec::new()
            }
            ServerMsg::ShotBroadcast(relay) => {
                if Some(relay.visible_shot.shooter) == self.slot {
                    // Already simulating our own shot
                    return Vec::new();
                }
                match replay_shot(&mut self.world, &relay) {
                    Some(event) => {
                        self.state.balls = self.world.balls();
                        self.state.shot_in_progress = true;
                        vec![event]
                    }
                    None => {
                        warn!(ball = %relay.visible_shot.ball, "could not replay peer shot");
                        Vec::new()
                    }
                }
            }
            ServerMsg::GameEvent(msg) => {
                if matches!(msg.event, GameEvent::GameOver { .. }) {
                    self.world.set_frozen(true);
                }
                vec![msg.event]
            }
        }
    }

    /// Advance local physics. Positions settle locally; turn and flags wait
    /// for the next server snapshot.
    pub fn tick(&mut self, dt: f32) -> Vec<GameEvent> {
        let events = self.world.step(dt);
        if events.is_empty() {
            return events;
        }
        self.state.balls = self.world.balls();
        if events.iter().any(|e| matches!(e, GameEvent::ShotEnd { .. })) {
            self.state.shot_in_progress = false;
        }
        events
    }

    /// Start a shot locally and produce the message for the server.
    pub fn try_shoot(&mut self, cmd: &ShotCommand) -> Result<ClientMsg, ShotRejection> {
        let slot = self.slot.ok_or(ShotRejection::NotStarted)?;
        self.state.can_shoot(slot)?;
        if self.world.is_shot_in_flight() {
            return Err(ShotRejection::ShotInProgress);
        }
        if cmd.ball != CUE_BALL {
            return Err(ShotRejection::NotCueBall(cmd.ball));
        }
        if !cmd.impulse.is_finite() {
            return Err(ShotRejection::InvalidImpulse);
        }

        // Same fresh world the server and the peer replay from
        self.world.rebuild();
        if self.world.apply_shot(cmd.ball, cmd.impulse).is_none() {
            return Err(ShotRejection::InvalidImpulse);
        }
        self.state.shot_in_progress = true;
        debug!(x = cmd.impulse.x, y = cmd.impulse.y, "local shot started");
        Ok(ClientMsg::CueShot {
            ball: cmd.ball,
            shot: cmd.impulse,
        })
    }

    /// Check a ball-in-hand placement locally. The cue ball appears when the
    /// server's next snapshot carries it.
    pub fn place_cue_ball(&self, position: Vec2) -> Result<ClientMsg, PlacementError> {
        if !self.state.ball_in_hand || self.state.game_over || self.state.shot_in_progress {
            return Err(PlacementError::NotBallInHand);
        }
        if !self.is_my_turn() {
            return Err(PlacementError::NotYourTurn);
        }
        validate_placement(&self.state, position)?;
        Ok(ClientMsg::PlaceCueBall {
            x: position.x,
            y: position.y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_shared::ball::BallKey;
    use pool_shared::events::GameOverReason;
    use pool_shared::game::Player;
    use pool_shared::protocol::{
        BallWire, GameEventMsg, RoomUpdateMsg, ShotBroadcastMsg, VisibleShot, WelcomeMsg,
    };

    const DT: f32 = 1.0 / 60.0;

    fn welcome(slot: u8) -> ServerMsg {
        ServerMsg::Welcome(WelcomeMsg {
            protocol_version: 1,
            server_version: "0.1.0".to_string(),
            room_id: "abc123".to_string(),
            self_id: format!("p{slot}"),
            slot,
        })
    }

    fn started_update(game: &NetworkGame, turn: u8) -> ServerMsg {
        let mut state = game.state().clone();
        state.players = vec![Player::new("p0", 0), Player::new("p1", 1)];
        state.game_started = true;
        state.turn.current = turn;
        let msg = RoomUpdateMsg::from_state(&state, true);
        ServerMsg::RoomUpdate(msg)
    }

    fn joined(slot: u8, turn: u8) -> NetworkGame {
        let mut game = NetworkGame::new(PhysicsConfig::default());
        game.handle_message(welcome(slot));
        let update = started_update(&game, turn);
        game.handle_message(update);
        game
    }

    fn break_shot() -> ShotCommand {
        ShotCommand {
            ball: CUE_BALL,
            impulse: Vec2::new(0.8, 0.0),
        }
    }

    fn run_until_rest(game: &mut NetworkGame) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..(60 * 60) {
            events.extend(game.tick(DT));
            if !game.world().is_shot_in_flight() {
                break;
            }
        }
        events
    }

    #[test]
    fn welcome_sets_identity() {
        let game = joined(1, 0);
        assert_eq!(game.slot(), Some(1));
        assert_eq!(game.self_id(), Some("p1"));
        assert_eq!(game.room_id(), Some("abc123"));
        assert!(!game.is_my_turn());
        assert!(game.state().game_started);
    }

    #[test]
    fn own_turn_shot_produces_cue_shot() {
        let mut game = joined(0, 0);
        let msg = game.try_shoot(&break_shot()).unwrap();
        match msg {
            ClientMsg::CueShot { ball, shot } => {
                assert_eq!(ball, CUE_BALL);
                assert_eq!(shot, Vec2::new(0.8, 0.0));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(game.state().shot_in_progress);
        assert!(game.world().is_shot_in_flight());
    }

    #[test]
    fn out_of_turn_shot_rejected_locally() {
        let mut game = joined(1, 0);
        assert_eq!(game.try_shoot(&break_shot()), Err(ShotRejection::NotYourTurn));
        assert!(!game.world().is_shot_in_flight());
    }

    #[test]
    fn shot_before_welcome_rejected() {
        let mut game = NetworkGame::new(PhysicsConfig::default());
        assert_eq!(game.try_shoot(&break_shot()), Err(ShotRejection::NotStarted));
    }

    #[test]
    fn object_ball_cannot_be_struck() {
        let mut game = joined(0, 0);
        let cmd = ShotCommand {
            ball: BallKey(3),
            impulse: Vec2::new(0.5, 0.0),
        };
        assert_eq!(game.try_shoot(&cmd), Err(ShotRejection::NotCueBall(BallKey(3))));
    }

    #[test]
    fn snapshot_balls_ignored_during_local_shot() {
        let mut game = joined(0, 0);
        game.try_shoot(&break_shot()).unwrap();
        game.tick(DT);
        let cue_now = game.world().ball(CUE_BALL).unwrap().position;

        let mut update = match started_update(&game, 0) {
            ServerMsg::RoomUpdate(msg) => msg,
            _ => unreachable!(),
        };
        update.balls = Some(vec![BallWire::exact(&pool_shared::Ball::cue(Vec2::new(-0.9, 0.3)))]);
        update.turn = 1;
        game.handle_message(ServerMsg::RoomUpdate(update));

        assert_eq!(game.world().ball(CUE_BALL).unwrap().position, cue_now);
        assert_eq!(game.world().balls().len(), 16);
        // Non-ball fields still apply
        assert_eq!(game.state().turn.current, 1);
        assert!(game.state().shot_in_progress);
    }

    #[test]
    fn peer_shot_is_replayed_and_settles() {
        let mut shooter = joined(0, 0);
        let mut peer = joined(1, 0);
        let before = shooter.world().balls();
        shooter.try_shoot(&break_shot()).unwrap();

        let relay = ShotBroadcastMsg {
            visible_shot: VisibleShot {
                ball: CUE_BALL,
                shot: Vec2::new(0.8, 0.0),
                shooter: 0,
            },
            ball_positions: before.iter().map(BallWire::exact).collect(),
        };
        let events = peer.handle_message(ServerMsg::ShotBroadcast(relay));
        assert!(matches!(events.as_slice(), [GameEvent::ShotStart { .. }]));
        assert!(peer.state().shot_in_progress);

        let shooter_events = run_until_rest(&mut shooter);
        let peer_events = run_until_rest(&mut peer);
        assert!(shooter_events.iter().any(|e| matches!(e, GameEvent::ShotEnd { .. })));
        assert!(peer_events.iter().any(|e| matches!(e, GameEvent::ShotEnd { .. })));
        assert!(!peer.state().shot_in_progress);

        for (a, b) in shooter.world().balls().iter().zip(peer.world().balls().iter()) {
            assert_eq!(a.key, b.key);
            assert!(pool_shared::vec2::distance(a.position, b.position) < 0.005);
        }
    }

    #[test]
    fn own_shot_relay_is_ignored() {
        let mut game = joined(0, 0);
        let relay = ShotBroadcastMsg {
            visible_shot: VisibleShot {
                ball: CUE_BALL,
                shot: Vec2::new(0.8, 0.0),
                shooter: 0,
            },
            ball_positions: game.world().balls().iter().map(BallWire::exact).collect(),
        };
        assert!(game.handle_message(ServerMsg::ShotBroadcast(relay)).is_empty());
        assert!(!game.world().is_shot_in_flight());
    }

    #[test]
    fn game_over_event_freezes_world() {
        let mut game = joined(1, 0);
        let events = game.handle_message(ServerMsg::GameEvent(GameEventMsg {
            event: GameEvent::GameOver {
                winner: 1,
                loser: 0,
                reason: GameOverReason::Early8Ball,
            },
        }));
        assert_eq!(events.len(), 1);
        assert!(game.world().is_frozen());
    }

    #[test]
    fn placement_needs_ball_in_hand_and_turn() {
        let mut game = joined(0, 0);
        assert_eq!(
            game.place_cue_ball(Vec2::new(-0.5, 0.0)),
            Err(PlacementError::NotBallInHand)
        );

        let mut update = match started_update(&game, 0) {
            ServerMsg::RoomUpdate(msg) => msg,
            _ => unreachable!(),
        };
        update.ball_in_hand = true;
        game.handle_message(ServerMsg::RoomUpdate(update.clone()));
        assert!(matches!(
            game.place_cue_ball(Vec2::new(-0.7, 0.2)),
            Ok(ClientMsg::PlaceCueBall { .. })
        ));
        assert_eq!(
            game.place_cue_ball(Vec2::new(5.0, 0.0)),
            Err(PlacementError::OutOfBounds)
        );

        update.turn = 1;
        game.handle_message(ServerMsg::RoomUpdate(update));
        assert_eq!(
            game.place_cue_ball(Vec2::new(-0.7, 0.2)),
            Err(PlacementError::NotYourTurn)
        );
    }
}
