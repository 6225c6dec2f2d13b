use crate::ball::{Ball, Group};
use crate::error::ShotRejection;
use crate::table::Table;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub slot: u8,
    pub group: Option<Group>,
}

impl Player {
    pub fn new(id: impl Into<String>, slot: u8) -> Self {
        Self {
            id: id.into(),
            slot,
            group: None,
        }
    }
}

/// Whose turn it is and since when (unix ms).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnState {
    pub current: u8,
    pub turn_start_time: i64,
    pub slots: Vec<u8>,
}

impl TurnState {
    pub fn new(now_ms: i64) -> Self {
        Self {
            current: 0,
            turn_start_time: now_ms,
            slots: vec![0, 1],
        }
    }

    /// Slot that would play after `slot`.
    pub fn next_after(&self, slot: u8) -> u8 {
        match self.slots.iter().position(|s| *s == slot) {
            Some(i) => self.slots[(i + 1) % self.slots.len()],
            None => slot,
        }
    }

    pub fn pass(&mut self, now_ms: i64) {
        self.current = self.next_after(self.current);
        self.turn_start_time = now_ms;
    }

    /// Same player goes again; the shot clock restarts.
    pub fn retain(&mut self, now_ms: i64) {
        self.turn_start_time = now_ms;
    }
}

/// The rule-relevant view of a game. Physics owns the bodies; `balls` mirrors
/// their positions after each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub balls: Vec<Ball>,
    pub table: Table,
    pub players: Vec<Player>,
    pub turn: TurnState,
    pub game_started: bool,
    pub game_over: bool,
    pub shot_in_progress: bool,
    pub foul_committed: bool,
    pub ball_in_hand: bool,
    pub winner: Option<u8>,
}

impl GameState {
    pub fn new(table: Table, balls: Vec<Ball>, now_ms: i64) -> Self {
        Self {
            balls,
            table,
            players: Vec::new(),
            turn: TurnState::new(now_ms),
            game_started: false,
            game_over: false,
            shot_in_progress: false,
            foul_committed: false,
            ball_in_hand: false,
            winner: None,
        }
    }

    pub fn player(&self, slot: u8) -> Option<&Player> {
        self.players.iter().find(|p| p.slot == slot)
    }

    pub fn player_mut(&mut self, slot: u8) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.slot == slot)
    }

    pub fn player_by_id(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn group_of(&self, slot: u8) -> Option<Group> {
        self.player(slot).and_then(|p| p.group)
    }

    pub fn groups_assigned(&self) -> bool {
        self.players.iter().any(|p| p.group.is_some())
    }

    /// Object balls of `group` still on the table.
    pub fn remaining_in_group(&self, group: Group) -> usize {
        self.balls.iter().filter(|b| b.group() == Some(group)).count()
    }

    pub fn cue_ball(&self) -> Option<&Ball> {
        self.balls.iter().find(|b| b.is_cue())
    }

    /// Whether `slot` may shoot right now.
    pub fn can_shoot(&self, slot: u8) -> Result<(), ShotRejection> {
        if !self.game_started {
            return Err(ShotRejection::NotStarted);
        }
        if self.game_over {
            return Err(ShotRejection::GameOver);
        }
        if self.turn.current != slot {
            return Err(ShotRejection::NotYourTurn);
        }
        if self.shot_in_progress {
            return Err(ShotRejection::ShotInProgress);
        }
        if self.ball_in_hand {
            return Err(ShotRejection::BallInHand);
        }
        Ok(())
    }
}
