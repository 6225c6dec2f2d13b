//! Hot-seat play on one machine. The session runs its own clock, so the
//! shot clock counts simulated time rather than wall time.

use pool_shared::config::{PhysicsConfig, RuleConfig, ShotConfig};
use pool_shared::error::{PlacementError, ShotRejection};
use pool_shared::events::GameEvent;
use pool_shared::shot::{ShotCommand, ShotIntentResolver};
use pool_shared::vec2::Vec2;
use pool_shared::{GameState, Session, CUE_BALL};

pub struct OfflineGame {
    session: Session,
    resolver: ShotIntentResolver,
    clock_ms: f64,
}

impl OfflineGame {
    pub fn new(physics: PhysicsConfig, rules: RuleConfig, shot: ShotConfig) -> Self {
        Self {
            session: Session::hot_seat(physics, rules, 0),
            resolver: ShotIntentResolver::new(shot),
            clock_ms: 0.0,
        }
    }

    pub fn state(&self) -> &GameState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn resolver(&self) -> &ShotIntentResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut ShotIntentResolver {
        &mut self.resolver
    }

    /// Simulated milliseconds since the game began.
    pub fn now_ms(&self) -> i64 {
        self.clock_ms as i64
    }

    /// Slot of the player to move.
    pub fn current_slot(&self) -> u8 {
        self.state().turn.current
    }

    pub fn tick(&mut self, dt: f32) -> Vec<GameEvent> {
        self.clock_ms += f64::from(dt) * 1000.0;
        let events = self.session.tick(dt, self.now_ms());
        if events
            .iter()
            .any(|e| matches!(e, GameEvent::ShotEnd { .. } | GameEvent::PassTurn))
        {
            self.resolver.cancel();
        }
        events
    }

    /// Start aiming for whoever is to move.
    pub fn begin_aim(&mut self) -> Result<(), ShotRejection> {
        self.state().can_shoot(self.current_slot())?;
        self.resolver.begin(CUE_BALL);
        Ok(())
    }

    /// Release the stick held through `resolver_mut`. `Ok(None)` means the
    /// pull was too weak and the player keeps aiming.
    pub fn release(&mut self) -> Result<Option<GameEvent>, ShotRejection> {
        let slot = self.current_slot();
        match self.resolver.release(self.session.state(), slot)? {
            Some(cmd) => self.session.shoot(slot, &cmd).map(Some),
            None => Ok(None),
        }
    }

    /// Shoot directly for the player to move.
    pub fn shoot(&mut self, cmd: &ShotCommand) -> Result<GameEvent, ShotRejection> {
        let slot = self.current_slot();
        let event = self.session.shoot(slot, cmd)?;
        self.resolver.cancel();
        Ok(event)
    }

    pub fn place_cue_ball(&mut self, position: Vec2) -> Result<(), PlacementError> {
        let slot = self.current_slot();
        self.session.place_cue_ball(slot, position)
    }
}
