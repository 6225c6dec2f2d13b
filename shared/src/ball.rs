use std::fmt;
use std::str::FromStr;

use crate::vec2::Vec2;

/// Regulation ball radius (m)
pub const BALL_RADIUS: f32 = 0.028575;

pub const CUE_BALL: BallKey = BallKey(0);
pub const EIGHT_BALL: BallKey = BallKey(8);

/// Stable ball identifier: 0 is the cue ball, 8 the black, 1-7 solids, 9-15 stripes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, ts_rs::TS,
)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(transparent)]
pub struct BallKey(pub u8);

impl fmt::Display for BallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hue {
    Yellow,
    Blue,
    Red,
    Purple,
    Orange,
    Green,
    Maroon,
}

impl Hue {
    pub const ALL: [Hue; 7] = [
        Hue::Yellow,
        Hue::Blue,
        Hue::Red,
        Hue::Purple,
        Hue::Orange,
        Hue::Green,
        Hue::Maroon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Hue::Yellow => "yellow",
            Hue::Blue => "blue",
            Hue::Red => "red",
            Hue::Purple => "purple",
            Hue::Orange => "orange",
            Hue::Green => "green",
            Hue::Maroon => "maroon",
        }
    }
}

/// Which half of the object balls a player is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Solid,
    Stripe,
}

impl Group {
    pub fn opposite(self) -> Group {
        match self {
            Group::Solid => Group::Stripe,
            Group::Stripe => Group::Solid,
        }
    }
}

/// Ball colour, serialized as `white`, `black`, `<hue>-solid` or `<hue>-stripe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BallColor {
    White,
    Black,
    Solid(Hue),
    Stripe(Hue),
}

impl BallColor {
    pub fn group(self) -> Option<Group> {
        match self {
            BallColor::Solid(_) => Some(Group::Solid),
            BallColor::Stripe(_) => Some(Group::Stripe),
            BallColor::White | BallColor::Black => None,
        }
    }

    /// Colour of the ball with the given key in a standard set.
    pub fn for_key(key: BallKey) -> Option<BallColor> {
        match key.0 {
            0 => Some(BallColor::White),
            8 => Some(BallColor::Black),
            n @ 1..=7 => Some(BallColor::Solid(Hue::ALL[n as usize - 1])),
            n @ 9..=15 => Some(BallColor::Stripe(Hue::ALL[n as usize - 9])),
            _ => None,
        }
    }
}

impl fmt::Display for BallColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BallColor::White => f.write_str("white"),
            BallColor::Black => f.write_str("black"),
            BallColor::Solid(hue) => write!(f, "{}-solid", hue.as_str()),
            BallColor::Stripe(hue) => write!(f, "{}-stripe", hue.as_str()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown ball color: {0}")]
pub struct UnknownColor(String);

impl FromStr for BallColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" => return Ok(BallColor::White),
            "black" => return Ok(BallColor::Black),
            _ => {}
        }
        let (hue, kind) = s.split_once('-').ok_or_else(|| UnknownColor(s.to_string()))?;
        let hue = Hue::ALL
            .into_iter()
            .find(|h| h.as_str() == hue)
            .ok_or_else(|| UnknownColor(s.to_string()))?;
        match kind {
            "solid" => Ok(BallColor::Solid(hue)),
            "stripe" => Ok(BallColor::Stripe(hue)),
            _ => Err(UnknownColor(s.to_string())),
        }
    }
}

impl TryFrom<String> for BallColor {
    type Error = UnknownColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BallColor> for String {
    fn from(color: BallColor) -> Self {
        color.to_string()
    }
}

/// Semantic ball record. Physics bodies are looked up by `key`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "camelCase")]
pub struct Ball {
    pub key: BallKey,
    #[ts(type = "string")]
    pub color: BallColor,
    pub position: Vec2,
    pub radius: f32,
}

impl Ball {
    pub fn new(key: BallKey, color: BallColor, position: Vec2) -> Self {
        Self {
            key,
            color,
            position,
            radius: BALL_RADIUS,
        }
    }

    pub fn cue(position: Vec2) -> Self {
        Self::new(CUE_BALL, BallColor::White, position)
    }

    pub fn group(&self) -> Option<Group> {
        self.color.group()
    }

    pub fn is_cue(&self) -> bool {
        self.color == BallColor::White
    }

    pub fn is_black(&self) -> bool {
        self.color == BallColor::Black
    }
}

/// Rack rows from the apex backward. The black sits in the middle of the
/// third row and the back corners hold one solid and one stripe.
const RACK_ROWS: [&[u8]; 5] = [
    &[1],
    &[9, 2],
    &[3, 8, 10],
    &[11, 4, 5, 12],
    &[6, 13, 14, 7, 15],
];

/// Full set of sixteen balls: cue ball on `head_spot`, triangle apex on
/// `foot_spot`, rows growing away from the head spot along +x.
pub fn rack(head_spot: Vec2, foot_spot: Vec2) -> Vec<Ball> {
    // Small gap so neighbouring balls start just apart rather than overlapping
    let gap = BALL_RADIUS * 2.0 + 0.0005;
    let row_offset = gap * 0.866_025_4;

    let mut balls = vec![Ball::cue(head_spot)];
    for (row, keys) in RACK_ROWS.iter().enumerate() {
        let x = foot_spot.x + row as f32 * row_offset;
        let first_y = foot_spot.y - (keys.len() as f32 - 1.0) * gap / 2.0;
        for (i, &n) in keys.iter().enumerate() {
            let key = BallKey(n);
            if let Some(color) = BallColor::for_key(key) {
                balls.push(Ball::new(key, color, Vec2::new(x, first_y + i as f32 * gap)));
            }
        }
    }
    balls.sort_by_key(|b| b.key);
    balls
}
