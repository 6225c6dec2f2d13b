//! One game: a physics world plus the rule engine that judges it.
//!
//! Used directly for hot-seat play and by the server for each room.

use tracing::debug;

use crate::ball::{rack, Ball, CUE_BALL};
use crate::config::{PhysicsConfig, RuleConfig};
use crate::error::{PlacementError, ShotRejection};
use crate::events::GameEvent;
use crate::game::{GameState, Player};
use crate::physics::PhysicsWorld;
use crate::rules::{Phase, RuleEngine};
use crate::shot::ShotCommand;
use crate::table::Table;
use crate::vec2::{self, Vec2};

pub struct Session {
    physics: PhysicsWorld,
    rules: RuleEngine,
}

impl Session {
    /// Racked table, no players yet.
    pub fn new(physics: PhysicsConfig, rules: RuleConfig, now_ms: i64) -> Self {
        let table = Table::standard(physics.rail_restitution, physics.rail_friction);
        let balls = rack(table.head_spot(), table.foot_spot());
        Self::with_balls(physics, rules, table, balls, now_ms)
    }

    pub fn with_balls(
        physics: PhysicsConfig,
        rules: RuleConfig,
        table: Table,
        balls: Vec<Ball>,
        now_ms: i64,
    ) -> Self {
        let world = PhysicsWorld::new(physics, table.clone(), &balls);
        let state = GameState::new(table, world.balls(), now_ms);
        Self {
            physics: world,
            rules: RuleEngine::new(state, rules),
        }
    }

    /// Two local players sharing one screen, game already running.
    pub fn hot_seat(physics: PhysicsConfig, rules: RuleConfig, now_ms: i64) -> Self {
        let mut session = Self::new(physics, rules, now_ms);
        session.add_player(Player::new("player-1", 0));
        session.add_player(Player::new("player-2", 1));
        session.start(now_ms);
        session
    }

    pub fn add_player(&mut self, player: Player) {
        self.rules.state_mut().players.push(player);
    }

    pub fn start(&mut self, now_ms: i64) {
        self.rules.start(now_ms);
    }

    pub fn state(&self) -> &GameState {
        self.rules.state()
    }

    pub fn phase(&self) -> Phase {
        self.rules.phase()
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// Validate and apply a shot for `slot`. On success the world has been
    /// rebuilt from the current positions and the impulse applied.
    pub fn shoot(&mut self, slot: u8, cmd: &ShotCommand) -> Result<GameEvent, ShotRejection> {
        self.state().can_shoot(slot)?;
        if self.physics.is_shot_in_flight() {
            return Err(ShotRejection::ShotInProgress);
        }
        if cmd.ball != CUE_BALL {
            return Err(ShotRejection::NotCueBall(cmd.ball));
        }
        if !cmd.impulse.is_finite() || vec2::length(cmd.impulse) <= f32::EPSILON {
            return Err(ShotRejection::InvalidImpulse);
        }

        self.physics.rebuild();
        let event = self
            .physics
            .apply_shot(cmd.ball, cmd.impulse)
            .ok_or(ShotRejection::InvalidImpulse)?;
        self.rules.on_shot_start();
        Ok(event)
    }

    /// Step physics and feed the results to the rules.
    pub fn tick(&mut self, dt: f32, now_ms: i64) -> Vec<GameEvent> {
        let physics_events = self.physics.step(dt);
        self.rules.sync_balls(self.physics.balls());

        let mut out = Vec::with_capacity(physics_events.len());
        for event in physics_events {
            let pocketed = match &event {
                GameEvent::ShotEnd { pocketed } => Some(pocketed.clone()),
                _ => None,
            };
            out.push(event);
            if let Some(pocketed) = pocketed {
                out.extend(self.rules.on_shot_end(&pocketed, now_ms));
                if self.state().game_over {
                    self.physics.set_frozen(true);
                }
            }
        }
        out.extend(self.rules.check_shot_clock(now_ms));
        out
    }

    /// Put the cue ball back on the table for the player in hand.
    pub fn place_cue_ball(&mut self, slot: u8, position: Vec2) -> Result<(), PlacementError> {
        let state = self.state();
        if !state.ball_in_hand || state.game_over || state.shot_in_progress {
            return Err(PlacementError::NotBallInHand);
        }
        if state.turn.current != slot {
            return Err(PlacementError::NotYourTurn);
        }
        validate_placement(state, position)?;

        // A scratched cue ball was already removed by physics; clear any stale copy
        self.physics.remove_ball(CUE_BALL);
        self.physics.insert_ball(Ball::cue(position));
        self.rules.sync_balls(self.physics.balls());
        self.rules.on_cue_ball_placed();
        debug!(slot, x = position.x, y = position.y, "cue ball placed");
        Ok(())
    }

    /// Ball records as they stand right now.
    pub fn balls(&self) -> Vec<Ball> {
        self.physics.balls()
    }
}

/// Check a cue-ball position against the cloth, the pockets and other balls.
pub fn validate_placement(state: &GameState, position: Vec2) -> Result<(), PlacementError> {
    let radius = crate::ball::BALL_RADIUS;
    if !state.table.contains_ball(position, radius) {
        return Err(PlacementError::OutOfBounds);
    }
    if state.table.pocket_at(position).is_some() {
        return Err(PlacementError::OverPocket);
    }
    if let Some(hit) = state
        .balls
        .iter()
        .find(|b| !b.is_cue() && vec2::distance(b.position, position) < b.radius + radius)
    {
        return Err(PlacementError::Overlaps(hit.key));
    }
    Ok(())
}
