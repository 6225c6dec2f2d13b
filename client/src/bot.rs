//! Autoplay bot: places the cue ball when it is in hand, otherwise picks
//! the easiest pot for its group and aims through the ghost ball.

use pool_shared::ball::{Ball, BALL_RADIUS};
use pool_shared::session::validate_placement;
use pool_shared::shot::{cut_angle, ghost_ball, ShotCommand, ShotIntentResolver};
use pool_shared::vec2::{self, Vec2};
use pool_shared::{GameState, CUE_BALL};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BotAction {
    PlaceCueBall(Vec2),
    Shoot(ShotCommand),
}

const THINK_TIME: f32 = 0.8;
/// Cuts steeper than this are not attempted (radians, ~75°)
const MAX_CUT: f32 = 1.31;
const MIN_POWER: f32 = 0.25;
const MAX_POWER: f32 = 0.9;
/// Power added per metre of cue→ghost plus ball→pocket travel
const POWER_PER_METRE: f32 = 0.22;
const POWER_JITTER: f32 = 0.05;
const PLACEMENT_ATTEMPTS: usize = 64;

#[derive(Debug)]
pub struct ClientBot {
    think: f32,
    seed: u32,
}

impl Default for ClientBot {
    fn default() -> Self {
        Self { think: 0.0, seed: 1 }
    }
}

impl ClientBot {
    pub fn with_seed(seed: u32) -> Self {
        Self {
            think: 0.0,
            seed: seed.max(1),
        }
    }

    fn next_random(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1664525).wrapping_add(1013904223) & 0x7fff_ffff;
        self.seed as f32 / 0x7fff_ffffu32 as f32
    }

    /// Call every frame. Returns an action once the bot has "thought" for a
    /// moment on its own turn.
    pub fn update(
        &mut self,
        dt: f32,
        state: &GameState,
        slot: u8,
        resolver: &ShotIntentResolver,
    ) -> Option<BotAction> {
        let my_move = state.game_started
            && !state.game_over
            && !state.shot_in_progress
            && state.turn.current == slot;
        if !my_move {
            self.think = 0.0;
            return None;
        }

        self.think += dt;
        if self.think < THINK_TIME {
            return None;
        }
        self.think = 0.0;

        if state.ball_in_hand {
            return self.choose_placement(state).map(BotAction::PlaceCueBall);
        }
        self.plan_shot(state, slot, resolver).map(BotAction::Shoot)
    }

    pub fn reset(&mut self) {
        self.think = 0.0;
    }

    /// Balls this player may legally aim at.
    fn targets<'a>(state: &'a GameState, slot: u8) -> Vec<&'a Ball> {
        let object_balls = state.balls.iter().filter(|b| !b.is_cue());
        match state.group_of(slot) {
            Some(group) if state.remaining_in_group(group) > 0 => {
                object_balls.filter(|b| b.group() == Some(group)).collect()
            }
            Some(_) => object_balls.filter(|b| b.is_black()).collect(),
            None => object_balls.filter(|b| !b.is_black()).collect(),
        }
    }

    pub fn plan_shot(
        &mut self,
        state: &GameState,
        slot: u8,
        resolver: &ShotIntentResolver,
    ) -> Option<ShotCommand> {
        let cue = state.balls.iter().find(|b| b.key == CUE_BALL)?.position;
        let targets = Self::targets(state, slot);

        // Lowest score wins: steep cuts and long travel are penalised
        let mut best: Option<(f32, Vec2, f32)> = None;
        for target in &targets {
            for pocket in &state.table.pockets {
                let Some(ghost) = ghost_ball(target.position, pocket.center, BALL_RADIUS) else {
                    continue;
                };
                let Some(cut) = cut_angle(cue, ghost, target.position) else {
                    continue;
                };
                if cut.abs() > MAX_CUT {
                    continue;
                }
                let travel =
                    vec2::distance(cue, ghost) + vec2::distance(target.position, pocket.center);
                let score = cut.abs() * 2.0 + travel;
                if best.is_none_or(|(s, _, _)| score < s) {
                    best = Some((score, vec2::sub(ghost, cue), travel));
                }
            }
        }

        let (direction, travel) = match best {
            Some((_, direction, travel)) => (direction, travel),
            None => {
                // No pot on: hit the nearest legal ball full in the face
                let nearest = targets.iter().min_by(|a, b| {
                    vec2::distance(cue, a.position).total_cmp(&vec2::distance(cue, b.position))
                })?;
                let direction = vec2::sub(nearest.position, cue);
                (direction, vec2::length(direction))
            }
        };

        let jitter = (self.next_random() - 0.5) * 2.0 * POWER_JITTER;
        let power = (MIN_POWER + travel * POWER_PER_METRE + jitter).clamp(MIN_POWER, MAX_POWER);
        resolver.command_toward(CUE_BALL, direction, power)
    }

    /// First legal spot: the head spot, then random spots in the head half.
    pub fn choose_placement(&mut self, state: &GameState) -> Option<Vec2> {
        let head = state.table.head_spot();
        if validate_placement(state, head).is_ok() {
            return Some(head);
        }
        let half_w = state.table.width / 2.0 - 2.0 * BALL_RADIUS;
        let half_h = state.table.height / 2.0 - 2.0 * BALL_RADIUS;
        for _ in 0..PLACEMENT_ATTEMPTS {
            let x = -half_w + self.next_random() * half_w;
            let y = (self.next_random() * 2.0 - 1.0) * half_h;
            let candidate = Vec2::new(x, y);
            if validate_placement(state, candidate).is_ok() {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_shared::ball::{rack, BallKey};
    use pool_shared::config::ShotConfig;
    use pool_shared::game::Player;
    use pool_shared::table::Table;
    use pool_shared::{BallColor, Group};

    const DT: f32 = 1.0 / 60.0;

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

    fn think(bot: &mut ClientBot, state: &GameState, slot: u8) -> Option<BotAction> {
        for _ in 0..120 {
            if let Some(action) = bot.update(DT, state, slot, &resolver()) {
                return Some(action);
            }
        }
        None
    }

    #[test]
    fn bot_waits_before_acting() {
        let mut bot = ClientBot::default();
        let state = test_state();
        assert!(bot.update(DT, &state, 0, &resolver()).is_none());
        assert!(matches!(think(&mut bot, &state, 0), Some(BotAction::Shoot(_))));
    }

    #[test]
    fn bot_idles_off_turn() {
        let mut bot = ClientBot::default();
        let state = test_state();
        assert!(think(&mut bot, &state, 1).is_none());
    }

    #[test]
    fn bot_shoots_the_cue_ball_toward_the_rack() {
        let mut bot = ClientBot::default();
        let state = test_state();
        let cmd = bot.plan_shot(&state, 0, &resolver()).unwrap();
        assert_eq!(cmd.ball, CUE_BALL);
        assert!(cmd.impulse.x > 0.0);
        let force = vec2::length(cmd.impulse);
        let max = ShotConfig::default().max_force;
        assert!(force >= MIN_POWER * max - 1e-4 && force <= MAX_POWER * max + 1e-4);
    }

    #[test]
    fn bot_aims_at_the_ghost_ball_for_an_easy_pot() {
        let table = Table::standard(0.9, 0.1);
        let pocket = table.pockets[2].center;
        let target = Vec2::new(pocket.x - 0.3, pocket.y - 0.15);
        let cue_pos = Vec2::new(target.x - 0.6, target.y - 0.3);
        let balls = vec![
            Ball::cue(cue_pos),
            Ball::new(BallKey(3), BallColor::for_key(BallKey(3)).unwrap(), target),
        ];
        let mut state = GameState::new(table, balls, 0);
        state.players = vec![Player::new("a", 0), Player::new("b", 1)];
        state.game_started = true;

        let mut bot = ClientBot::default();
        let cmd = bot.plan_shot(&state, 0, &resolver()).unwrap();
        let ghost = ghost_ball(target, pocket, BALL_RADIUS).unwrap();
        let want = vec2::normalize(vec2::sub(ghost, cue_pos)).unwrap();
        let got = vec2::normalize(cmd.impulse).unwrap();
        assert!(vec2::dot(want, got) > 0.9999);
    }

    #[test]
    fn assigned_bot_only_targets_its_group() {
        let mut state = test_state();
        state.players[0].group = Some(Group::Stripe);
        let targets = ClientBot::targets(&state, 0);
        assert!(!targets.is_empty());
        assert!(targets.iter().all(|b| b.group() == Some(Group::Stripe)));
    }

    #[test]
    fn cleared_group_targets_the_black() {
        let mut state = test_state();
        state.players[0].group = Some(Group::Solid);
        state.balls.retain(|b| b.group() != Some(Group::Solid));
        let targets = ClientBot::targets(&state, 0);
        assert_eq!(targets.len(), 1);
        assert!(targets[0].is_black());
    }

    #[test]
    fn ball_in_hand_places_on_free_spot() {
        let mut state = test_state();
        state.ball_in_hand = true;
        state.balls.retain(|b| !b.is_cue());
        let mut bot = ClientBot::with_seed(42);
        match think(&mut bot, &state, 0) {
            Some(BotAction::PlaceCueBall(pos)) => {
                assert!(validate_placement(&state, pos).is_ok());
            }
            other => panic!("expected placement, got {other:?}"),
        }
    }

    #[test]
    fn occupied_head_spot_falls_back_to_random_spot() {
        let mut state = test_state();
        state.ball_in_hand = true;
        state.balls.retain(|b| !b.is_cue());
        let head = state.table.head_spot();
        if let Some(one) = state.balls.iter_mut().find(|b| b.key == BallKey(1)) {
            one.position = head;
        }
        let mut bot = ClientBot::with_seed(7);
        let pos = bot.choose_placement(&state).unwrap();
        assert!(pos.x <= 0.0);
        assert!(validate_placement(&state, pos).is_ok());
    }
}
