use crate::ball::BallKey;

/// Why a shot command was refused. A refused shot leaves the game untouched.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotRejection {
    #[error("Game has not started")]
    NotStarted,

    #[error("Game is over")]
    GameOver,

    #[error("Not this player's turn")]
    NotYourTurn,

    #[error("Balls are still moving")]
    ShotInProgress,

    #[error("Cue ball must be placed first")]
    BallInHand,

    #[error("Only the cue ball can be struck, not {0}")]
    NotCueBall(BallKey),

    #[error("Impulse is zero or not finite")]
    InvalidImpulse,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementError {
    #[error("Cue ball is not in hand")]
    NotBallInHand,

    #[error("Not this player's turn")]
    NotYourTurn,

    #[error("Position is off the playing surface")]
    OutOfBounds,

    #[error("Position overlaps ball {0}")]
    Overlaps(BallKey),

    #[error("Position is over a pocket")]
    OverPocket,
}
