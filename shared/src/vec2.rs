/// 2D vector utilities for table-plane coordinates.
/// Units are metres; the origin is the centre of the playing surface.

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize, PartialEq, ts_rs::TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Shorthand constructor
pub fn vec2(x: f32, y: f32) -> Vec2 {
    Vec2::new(x, y)
}

/// Dot product
pub fn dot(a: Vec2, b: Vec2) -> f32 {
    a.x * b.x + a.y * b.y
}

/// 2D cross product (z component of the 3D cross)
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Vector length
pub fn length(v: Vec2) -> f32 {
    (v.x * v.x + v.y * v.y).sqrt()
}

/// Normalize vector to unit length. Degenerate input yields None.
pub fn normalize(v: Vec2) -> Option<Vec2> {
    let len = length(v);
    if !len.is_finite() || len < 1e-6 {
        return None;
    }
    Some(Vec2::new(v.x / len, v.y / len))
}

/// Scale vector by scalar
pub fn scale(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(v.x * s, v.y * s)
}

/// Add two vectors
pub fn add(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x + b.x, a.y + b.y)
}

/// Subtract vectors (a - b)
pub fn sub(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x - b.x, a.y - b.y)
}

pub fn distance(a: Vec2, b: Vec2) -> f32 {
    length(sub(a, b))
}
