//! Table physics, eight-ball rules and the room wire protocol shared by the
//! server and the client.

pub mod ball;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod physics;
pub mod protocol;
pub mod rules;
pub mod session;
pub mod shot;
pub mod sync;
pub mod table;
pub mod vec2;

pub use ball::{Ball, BallColor, BallKey, Group, CUE_BALL, EIGHT_BALL};
pub use config::{PhysicsConfig, RuleConfig, ShotConfig};
pub use error::{PlacementError, ShotRejection};
pub use events::{GameEvent, GameOverReason};
pub use game::{GameState, Player, TurnState};
pub use physics::PhysicsWorld;
pub use rules::{Phase, RuleEngine};
pub use session::Session;
pub use shot::{ShotCommand, ShotIntentResolver};
pub use vec2::Vec2;
