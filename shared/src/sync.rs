//! Client-side reconciliation against server snapshots and shot relays.
//!
//! While a local shot is in flight, local physics owns ball positions. Once
//! everything is at rest, snapshots are merged ball by ball so drift heals
//! without replacing the whole table.

use tracing::debug;

use crate::ball::{Ball, BallKey};
use crate::events::GameEvent;
use crate::game::{GameState, Player};
use crate::physics::PhysicsWorld;
use crate::protocol::{RoomUpdateMsg, ShotBroadcastMsg};
use crate::vec2;

/// Positions closer than this to the snapshot are left alone. Larger than
/// the centimetre rounding of snapshots so exact local positions never snap.
pub const DRIFT_TOLERANCE: f32 = 0.01;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MergeReport {
    pub removed: Vec<BallKey>,
    pub moved: Vec<BallKey>,
    pub added: Vec<BallKey>,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.moved.is_empty() && self.added.is_empty()
    }
}

/// Bring `world` in line with `remote`, keyed by ball.
pub fn merge_balls(world: &mut PhysicsWorld, remote: &[Ball]) -> MergeReport {
    let mut report = MergeReport::default();
    let local = world.balls();

    for ball in &local {
        if !remote.iter().any(|r| r.key == ball.key) {
            world.remove_ball(ball.key);
            report.removed.push(ball.key);
        }
    }

    for target in remote {
        match local.iter().find(|b| b.key == target.key) {
            Some(ball) => {
                if vec2::distance(ball.position, target.position) > DRIFT_TOLERANCE {
                    world.set_ball_position(target.key, target.position);
                    report.moved.push(target.key);
                }
            }
            None => {
                if world.insert_ball(*target) {
                    report.added.push(target.key);
                }
            }
        }
    }

    if !report.is_empty() {
        debug!(
            removed = report.removed.len(),
            moved = report.moved.len(),
            added = report.added.len(),
            "merged remote ball state"
        );
    }
    report
}

/// Apply a room snapshot to the local mirror. Ball positions are skipped
/// while either side still has a shot running, since a mid-shot snapshot is
/// rounded and stale; every other field is taken from the server as-is.
pub fn apply_room_update(
    state: &mut GameState,
    world: &mut PhysicsWorld,
    msg: &RoomUpdateMsg,
) -> Option<MergeReport> {
    let mut geometry_changed = false;
    if let Some(table) = &msg.table {
        geometry_changed |= state.table.width != table.width || state.table.height != table.height;
        state.table.width = table.width;
        state.table.height = table.height;
    }
    if let Some(rails) = &msg.rails {
        geometry_changed |= state.table.rails != *rails;
        state.table.rails = rails.clone();
    }
    if let Some(pockets) = &msg.pockets {
        geometry_changed |= state.table.pockets != *pockets;
        state.table.pockets = pockets.clone();
    }
    if geometry_changed && !world.is_shot_in_flight() {
        let balls = world.balls();
        *world = PhysicsWorld::new(*world.config(), state.table.clone(), &balls);
    }

    let report = match &msg.balls {
        Some(balls) if !msg.shot_in_progress && !world.is_shot_in_flight() => {
            let remote: Vec<Ball> = balls.iter().map(|b| b.to_ball()).collect();
            Some(merge_balls(world, &remote))
        }
        _ => None,
    };
    state.balls = world.balls();

    state.players = msg
        .players
        .iter()
        .map(|p| Player {
            id: p.id.clone(),
            slot: p.slot,
            group: p.group,
        })
        .collect();
    state.turn.current = msg.turn;
    state.turn.turn_start_time = msg.turn_start_time;
    state.game_started = msg.game_started;
    state.game_over = msg.game_over;
    state.winner = msg.winner;
    state.foul_committed = msg.foul_committed;
    state.ball_in_hand = msg.ball_in_hand;
    state.shot_in_progress = msg.shot_in_progress || world.is_shot_in_flight();
    world.set_frozen(msg.game_over);

    report
}

/// Replay a peer's shot from the exact positions the server captured.
pub fn replay_shot(world: &mut PhysicsWorld, msg: &ShotBroadcastMsg) -> Option<GameEvent> {
    let balls: Vec<Ball> = msg.ball_positions.iter().map(|b| b.to_ball()).collect();
    world.reset_balls(&balls);
    world.apply_shot(msg.visible_shot.ball, msg.visible_shot.shot)
}
