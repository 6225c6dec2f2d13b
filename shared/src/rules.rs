//! Eight-ball rules as an explicit state machine over `GameState`.

use tracing::{debug, info};

use crate::ball::Ball;
use crate::config::RuleConfig;
use crate::events::{GameEvent, GameOverReason};
use crate::game::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingShot,
    ShotResolving,
    TurnDecision,
    /// Incoming player has the cue ball in hand
    FoulRecovery,
    GameOver,
}

pub struct RuleEngine {
    state: GameState,
    phase: Phase,
    config: RuleConfig,
}

impl RuleEngine {
    pub fn new(state: GameState, config: RuleConfig) -> Self {
        let phase = if state.game_over {
            Phase::GameOver
        } else if state.ball_in_hand {
            Phase::FoulRecovery
        } else {
            Phase::AwaitingShot
        };
        Self { state, phase, config }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Replace the ball records after physics moved or removed bodies.
    pub fn sync_balls(&mut self, balls: Vec<Ball>) {
        self.state.balls = balls;
    }

    pub fn start(&mut self, now_ms: i64) {
        self.state.game_started = true;
        self.state.turn.turn_start_time = now_ms;
    }

    pub fn on_shot_start(&mut self) {
        self.state.shot_in_progress = true;
        self.state.foul_committed = false;
        self.phase = Phase::ShotResolving;
    }

    /// Cue ball was put back on the table by the player in hand.
    pub fn on_cue_ball_placed(&mut self) {
        self.state.ball_in_hand = false;
        if self.phase == Phase::FoulRecovery {
            self.phase = Phase::AwaitingShot;
        }
    }

    /// Decide the outcome of a finished shot. `state.balls` must already
    /// reflect the table after the shot.
    pub fn on_shot_end(&mut self, pocketed: &[Ball], now_ms: i64) -> Vec<GameEvent> {
        self.phase = Phase::TurnDecision;
        self.state.shot_in_progress = false;

        let shooter = self.state.turn.current;
        let opponent = self.state.turn.next_after(shooter);

        // Colour assignment comes first so a potted black or scratch on the
        // same shot is judged with groups known
        if !self.state.groups_assigned() {
            if let Some(group) = pocketed.iter().find_map(|b| b.group()) {
                if let Some(p) = self.state.player_mut(shooter) {
                    p.group = Some(group);
                }
                if let Some(p) = self.state.player_mut(opponent) {
                    p.group = Some(group.opposite());
                }
                info!(slot = shooter, ?group, "groups assigned");
            }
        }

        let scratched = pocketed.iter().any(|b| b.is_cue());
        let own_group = self.state.group_of(shooter);

        if pocketed.iter().any(|b| b.is_black()) {
            let cleared = own_group.is_some_and(|g| self.state.remaining_in_group(g) == 0);
            let event = if cleared && !scratched {
                self.finish(shooter, opponent, GameOverReason::Legal8Ball)
            } else {
                self.finish(opponent, shooter, GameOverReason::Early8Ball)
            };
            return vec![event];
        }

        if scratched {
            self.state.foul_committed = true;
            self.state.ball_in_hand = true;
            self.state.turn.pass(now_ms);
            self.phase = Phase::FoulRecovery;
            debug!(next = self.state.turn.current, "scratch, ball in hand");
            return vec![GameEvent::Foul, GameEvent::PassTurn, GameEvent::BallInHand];
        }

        let potted_opponent = pocketed
            .iter()
            .any(|b| b.group().is_some() && b.group() != own_group);
        let potted_own = own_group.is_some() && pocketed.iter().any(|b| b.group() == own_group);

        self.phase = Phase::AwaitingShot;
        if potted_opponent || !potted_own {
            self.state.turn.pass(now_ms);
            vec![GameEvent::PassTurn]
        } else {
            self.state.turn.retain(now_ms);
            Vec::new()
        }
    }

    /// Pass the turn if the current player ran out of time.
    pub fn check_shot_clock(&mut self, now_ms: i64) -> Vec<GameEvent> {
        let s = &self.state;
        if !s.game_started || s.game_over || s.shot_in_progress {
            return Vec::new();
        }
        if now_ms - s.turn.turn_start_time < self.config.shot_clock_ms {
            return Vec::new();
        }
        self.state.turn.pass(now_ms);
        info!(next = self.state.turn.current, "shot clock expired");
        if self.state.ball_in_hand {
            vec![GameEvent::PassTurn, GameEvent::BallInHand]
        } else {
            vec![GameEvent::PassTurn]
        }
    }

    fn finish(&mut self, winner: u8, loser: u8, reason: GameOverReason) -> GameEvent {
        self.state.game_over = true;
        self.state.winner = Some(winner);
        self.phase = Phase::GameOver;
        info!(winner, ?reason, "game over");
        GameEvent::GameOver { winner, loser, reason }
    }
}
