use crate::ball::{Ball, BallKey};

/// Why the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/generated/")]
pub enum GameOverReason {
    /// Shooter cleared their group, then potted the black
    #[serde(rename = "legal-8ball")]
    Legal8Ball,
    /// Black went down before the shooter's group was cleared, or with a scratch
    #[serde(rename = "early-8ball")]
    Early8Ball,
}

/// Everything the simulation and the rules announce. Physics emits the first
/// five kinds; the rule engine emits the rest.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GameEvent {
    ShotStart {
        ball: BallKey,
    },
    BallCollision {
        ball1: BallKey,
        ball2: BallKey,
        #[serde(rename = "impactSpeed")]
        impact_speed: f32,
    },
    RailCollision {
        ball: BallKey,
        speed: f32,
    },
    BallPocketed {
        ball: BallKey,
        pocket: u8,
    },
    /// All balls came to rest. Carries every ball pocketed during the shot.
    ShotEnd {
        pocketed: Vec<Ball>,
    },
    Foul,
    GameOver {
        winner: u8,
        loser: u8,
        reason: GameOverReason,
    },
    PassTurn,
    BallInHand,
}

impl GameEvent {
    /// Rule outcomes are relayed to every participant; physics events are
    /// reproduced locally by each simulation.
    pub fn is_rule_event(&self) -> bool {
        matches!(
            self,
            GameEvent::Foul | GameEvent::GameOver { .. } | GameEvent::PassTurn | GameEvent::BallInHand
        )
    }
}
