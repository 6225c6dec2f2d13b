use crate::ball::BallKey;
use crate::config::ShotConfig;
use crate::error::ShotRejection;
use crate::game::GameState;
use crate::vec2::{self, Vec2};

/// A resolved shot: the impulse to apply to `ball`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotCommand {
    pub ball: BallKey,
    pub impulse: Vec2,
}

/// Cue stick state for the player whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotIntent {
    pub ball: BallKey,
    /// Unit vector from the ball toward the stick handle
    pub aim: Vec2,
    /// 0..1
    pub power: f32,
    pub pulling: bool,
}

/// Turns aim and pull-back input into a single `ShotCommand`.
pub struct ShotIntentResolver {
    config: ShotConfig,
    intent: Option<ShotIntent>,
}

impl ShotIntentResolver {
    pub fn new(config: ShotConfig) -> Self {
        Self {
            config,
            intent: None,
        }
    }

    /// Called when the local player's turn starts.
    pub fn begin(&mut self, ball: BallKey) {
        self.intent = Some(ShotIntent {
            ball,
            aim: Vec2::new(-1.0, 0.0),
            power: 0.0,
            pulling: false,
        });
    }

    /// Drop the intent, e.g. when a shot starts from elsewhere.
    pub fn cancel(&mut self) {
        self.intent = None;
    }

    pub fn intent(&self) -> Option<&ShotIntent> {
        self.intent.as_ref()
    }

    /// Point the stick. `toward_handle` is the direction from the ball to the
    /// pointer. Frozen while pulling back.
    pub fn aim(&mut self, toward_handle: Vec2) {
        let Some(intent) = self.intent.as_mut() else {
            return;
        };
        if intent.pulling {
            return;
        }
        if let Some(dir) = vec2::normalize(toward_handle) {
            intent.aim = dir;
        }
    }

    /// Pull the stick back by `distance` metres.
    pub fn pull(&mut self, distance: f32) {
        let max_pull = self.config.max_pull;
        let Some(intent) = self.intent.as_mut() else {
            return;
        };
        if !distance.is_finite() {
            return;
        }
        intent.pulling = true;
        intent.power = (distance / max_pull).clamp(0.0, 1.0);
    }

    /// Let go of the stick. A weak release is discarded and the stick is
    /// returned to aiming; a real shot consumes the intent.
    pub fn release(&mut self, state: &GameState, slot: u8) -> Result<Option<ShotCommand>, ShotRejection> {
        state.can_shoot(slot)?;
        let Some(mut intent) = self.intent.take() else {
            return Ok(None);
        };

        let force = intent.power * self.config.max_force;
        if force <= self.config.min_force {
            intent.pulling = false;
            intent.power = 0.0;
            self.intent = Some(intent);
            return Ok(None);
        }

        // The stick pushes the ball away from the handle
        Ok(Some(ShotCommand {
            ball: intent.ball,
            impulse: vec2::scale(intent.aim, -force),
        }))
    }

    /// Shortcut for programmatic shooters: hit toward `direction` at `power`.
    pub fn command_toward(&self, ball: BallKey, direction: Vec2, power: f32) -> Option<ShotCommand> {
        let dir = vec2::normalize(direction)?;
        let force = power.clamp(0.0, 1.0) * self.config.max_force;
        if force <= self.config.min_force {
            return None;
        }
        Some(ShotCommand {
            ball,
            impulse: vec2::scale(dir, force),
        })
    }
}

/// Where the cue ball's centre must be at contact to send `target` toward `aim_point`.
pub fn ghost_ball(target: Vec2, aim_point: Vec2, radius: f32) -> Option<Vec2> {
    let dir = vec2::normalize(vec2::sub(aim_point, target))?;
    Some(vec2::sub(target, vec2::scale(dir, 2.0 * radius)))
}

/// Angle (radians) between the shot line cue→ghost and the line ghost→target.
/// Zero is a full hit; near ±π/2 is a glancing cut.
pub fn cut_angle(cue: Vec2, ghost: Vec2, target: Vec2) -> Option<f32> {
    let shot = vec2::normalize(vec2::sub(ghost, cue))?;
    let line = vec2::normalize(vec2::sub(target, ghost))?;
    Some(vec2::cross(shot, line).atan2(vec2::dot(shot, line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ball::{rack, CUE_BALL};
    use crate::game::Player;
    use crate::table::Table;
    use crate::vec2::vec2;

    const EPS: f32 = 1e-5;

    fn test_state() -> GameState {
        let table = Table::standard(0.9, 0.1);
        let balls = rack(table.head_spot(), table.foot_spot());
        let mut state = GameState::new(table, balls, 0);
        state.players = vec![Player::new("a", 0), Player::new("b", 1)];
        state.game_started = true;
        state
    }

    fn resolver() -> ShotIntentResolver {
        ShotIntentResolver::new(ShotConfig::default())
    }

    #[test]
    fn impulse_points_away_from_handle() {
        let state = test_state();
        let mut r = resolver();
        r.begin(CUE_BALL);
        r.aim(vec2(-2.0, 0.0));
        r.pull(0.15);
        let cmd = r.release(&state, 0).unwrap().unwrap();
        assert_eq!(cmd.ball, CUE_BALL);
        assert!((cmd.impulse.x - 0.5 * 1.2).abs() < EPS);
        assert!(cmd.impulse.y.abs() < EPS);
        assert!(r.intent().is_none());
    }

    #[test]
    fn power_clamps_at_max_pull() {
        let mut r = resolver();
        r.begin(CUE_BALL);
        r.pull(5.0);
        assert_eq!(r.intent().unwrap().power, 1.0);
        r.pull(-1.0);
        assert_eq!(r.intent().unwrap().power, 0.0);
    }

    #[test]
    fn aim_frozen_while_pulling() {
        let mut r = resolver();
        r.begin(CUE_BALL);
        r.aim(vec2(0.0, 1.0));
        r.pull(0.1);
        r.aim(vec2(1.0, 0.0));
        let aim = r.intent().unwrap().aim;
        assert!((aim.y - 1.0).abs() < EPS);
    }

    #[test]
    fn weak_release_is_discarded() {
        let state = test_state();
        let mut r = resolver();
        r.begin(CUE_BALL);
        r.pull(0.001);
        assert_eq!(r.release(&state, 0), Ok(None));
        let intent = r.intent().unwrap();
        assert!(!intent.pulling);
        assert_eq!(intent.power, 0.0);
    }

    #[test]
    fn release_at_exactly_min_force_is_discarded() {
        let state = test_state();
        let mut r = ShotIntentResolver::new(ShotConfig {
            max_pull: 1.0,
            max_force: 1.0,
            min_force: 0.25,
        });
        r.begin(CUE_BALL);
        r.pull(0.25);
        assert_eq!(r.release(&state, 0), Ok(None));
        assert!(r.command_toward(CUE_BALL, vec2(1.0, 0.0), 0.25).is_none());
        assert!(r.command_toward(CUE_BALL, vec2(1.0, 0.0), 0.26).is_some());
    }

    #[test]
    fn release_out_of_turn_rejected() {
        let state = test_state();
        let mut r = resolver();
        r.begin(CUE_BALL);
        r.pull(0.2);
        assert_eq!(r.release(&state, 1), Err(ShotRejection::NotYourTurn));
        // Intent survives a refused release
        assert!(r.intent().is_some());
    }

    #[test]
    fn release_during_shot_rejected() {
        let mut state = test_state();
        state.shot_in_progress = true;
        let mut r = resolver();
        r.begin(CUE_BALL);
        r.pull(0.2);
        assert_eq!(r.release(&state, 0), Err(ShotRejection::ShotInProgress));
    }

    #[test]
    fn ghost_ball_sits_behind_target() {
        let ghost = ghost_ball(vec2(1.0, 0.0), vec2(2.0, 0.0), 0.5).unwrap();
        assert!((ghost.x - 0.0).abs() < EPS);
        assert!(ghost.y.abs() < EPS);
    }

    #[test]
    fn full_hit_has_zero_cut() {
        let angle = cut_angle(vec2(-1.0, 0.0), vec2(0.0, 0.0), vec2(1.0, 0.0)).unwrap();
        assert!(angle.abs() < EPS);
    }

    #[test]
    fn right_angle_cut() {
        let angle = cut_angle(vec2(-1.0, 0.0), vec2(0.0, 0.0), vec2(0.0, 1.0)).unwrap();
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn command_toward_scales_by_power() {
        let r = resolver();
        let cmd = r.command_toward(CUE_BALL, vec2(0.0, 3.0), 0.5).unwrap();
        assert!((cmd.impulse.y - 0.6).abs() < EPS);
        assert!(r.command_toward(CUE_BALL, Vec2::ZERO, 1.0).is_none());
        assert!(r.command_toward(CUE_BALL, vec2(1.0, 0.0), 0.0).is_none());
    }
}
