//! Static table geometry: playing surface, cushions and pockets.

use crate::ball::BALL_RADIUS;
use crate::vec2::{distance, vec2, Vec2};

/// Playing-surface width (m), measured cushion nose to cushion nose
pub const TABLE_WIDTH: f32 = 2.24;
/// Playing-surface height (m)
pub const TABLE_HEIGHT: f32 = 1.12;
/// Cushion depth behind the nose line
pub const RAIL_DEPTH: f32 = 0.05;
/// Distance from the table corner to where a cushion nose begins
const CORNER_MOUTH: f32 = 0.09;
/// Half-width of the side pocket opening along the nose line
const SIDE_MOUTH: f32 = 0.065;
/// Horizontal run of the angled pocket jaw
const JAW: f32 = 0.03;

const CORNER_POCKET_RADIUS: f32 = 0.06;
const SIDE_POCKET_RADIUS: f32 = 0.055;

/// Cushion segment. `points` describe a convex polygon in table coordinates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct Rail {
    pub points: Vec<Vec2>,
    pub restitution: f32,
    pub friction: f32,
}

/// Circular pocket sensor.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct Pocket {
    pub id: u8,
    pub center: Vec2,
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub width: f32,
    pub height: f32,
    pub rails: Vec<Rail>,
    pub pockets: Vec<Pocket>,
}

impl Table {
    /// Seven-foot-ish table with six pockets, centred on the origin.
    pub fn standard(rail_restitution: f32, rail_friction: f32) -> Self {
        let hx = TABLE_WIDTH / 2.0;
        let hy = TABLE_HEIGHT / 2.0;

        let mut rails = Vec::with_capacity(6);
        let mut push_rail = |points: [Vec2; 4]| {
            rails.push(Rail {
                points: points.to_vec(),
                restitution: rail_restitution,
                friction: rail_friction,
            });
        };

        // Long cushions: two per side, split by the side pocket
        for sign in [1.0_f32, -1.0] {
            let nose = sign * hy;
            let back = sign * (hy + RAIL_DEPTH);
            let (a, b) = (-hx + CORNER_MOUTH, -SIDE_MOUTH);
            push_rail([
                vec2(a - JAW, back),
                vec2(a, nose),
                vec2(b, nose),
                vec2(b + JAW / 2.0, back),
            ]);
            let (a, b) = (SIDE_MOUTH, hx - CORNER_MOUTH);
            push_rail([
                vec2(a - JAW / 2.0, back),
                vec2(a, nose),
                vec2(b, nose),
                vec2(b + JAW, back),
            ]);
        }
        // Short cushions
        for sign in [1.0_f32, -1.0] {
            let nose = sign * hx;
            let back = sign * (hx + RAIL_DEPTH);
            let (a, b) = (-hy + CORNER_MOUTH, hy - CORNER_MOUTH);
            push_rail([
                vec2(back, a - JAW),
                vec2(nose, a),
                vec2(nose, b),
                vec2(back, b + JAW),
            ]);
        }

        let corner = 0.015;
        let pockets = vec![
            pocket(0, vec2(-hx - corner, hy + corner), CORNER_POCKET_RADIUS),
            pocket(1, vec2(0.0, hy + 0.035), SIDE_POCKET_RADIUS),
            pocket(2, vec2(hx + corner, hy + corner), CORNER_POCKET_RADIUS),
            pocket(3, vec2(hx + corner, -hy - corner), CORNER_POCKET_RADIUS),
            pocket(4, vec2(0.0, -hy - 0.035), SIDE_POCKET_RADIUS),
            pocket(5, vec2(-hx - corner, -hy - corner), CORNER_POCKET_RADIUS),
        ];

        Self {
            width: TABLE_WIDTH,
            height: TABLE_HEIGHT,
            rails,
            pockets,
        }
    }

    /// Where the cue ball starts and is suggested for ball-in-hand.
    pub fn head_spot(&self) -> Vec2 {
        vec2(-self.width / 4.0, 0.0)
    }

    /// Apex of the rack.
    pub fn foot_spot(&self) -> Vec2 {
        vec2(self.width / 4.0, 0.0)
    }

    /// True when a ball of `radius` centred at `pos` lies fully on the cloth.
    pub fn contains_ball(&self, pos: Vec2, radius: f32) -> bool {
        pos.is_finite()
            && pos.x.abs() <= self.width / 2.0 - radius
            && pos.y.abs() <= self.height / 2.0 - radius
    }

    /// Pocket whose sensor a ball at `pos` would overlap, if any.
    pub fn pocket_at(&self, pos: Vec2) -> Option<&Pocket> {
        self.pockets
            .iter()
            .find(|p| distance(p.center, pos) < p.radius + BALL_RADIUS)
    }
}

fn pocket(id: u8, center: Vec2, radius: f32) -> Pocket {
    Pocket { id, center, radius }
}
