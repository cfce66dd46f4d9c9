//! Statement definitions.
//!
//! A statement is one instruction of a behaviour script. The set of kinds is
//! closed; every consumer matches exhaustively over [`StatementKind`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the block a statement was produced from.
///
/// The runner reports it on every transition so the editing surface can
/// highlight the block that is currently executing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementId(String);

impl StatementId {
    /// Create a new statement id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner value.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StatementId {
    fn from(val: &str) -> Self {
        Self(val.to_string())
    }
}

impl From<String> for StatementId {
    fn from(val: String) -> Self {
        Self(val)
    }
}

impl fmt::Display for StatementId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drive direction of a `move` statement.
///
/// The editor's dropdown codes (`W`/`S`) are accepted when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    #[serde(alias = "W", alias = "w")]
    Forward,
    #[serde(alias = "S", alias = "s")]
    Backward,
}

/// Turn direction of a `turn` statement (`A`/`D` in the editor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    #[serde(alias = "A", alias = "a")]
    Left,
    #[serde(alias = "D", alias = "d")]
    Right,
}

fn quarter_turn() -> f64 {
    90.0
}

/// The kind of a statement together with its typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementKind {
    /// Drive straight for `distance` centimetres.
    Move {
        direction: MoveDirection,
        distance: f64,
    },
    /// Turn on the spot.
    Turn {
        direction: TurnDirection,
        #[serde(default = "quarter_turn")]
        degrees: f64,
    },
    /// Pause the script.
    Wait { seconds: f64 },
    /// Text-to-speech on the robot.
    Speak { text: String },
    /// Move one servo to a position.
    Servo { servo: String, value: f64 },
    /// Play a sound clip by name.
    Audio { clip: String },
    /// Halt the drive motors.
    Stop,
}

impl StatementKind {
    /// Keyword used for this kind in scripts and logs.
    pub fn keyword(&self) -> &'static str {
        match self {
            StatementKind::Move { .. } => "move",
            StatementKind::Turn { .. } => "turn",
            StatementKind::Wait { .. } => "wait",
            StatementKind::Speak { .. } => "speak",
            StatementKind::Servo { .. } => "servo",
            StatementKind::Audio { .. } => "audio",
            StatementKind::Stop => "stop",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            StatementKind::Move {
                direction,
                distance,
            } => {
                let dir = match direction {
                    MoveDirection::Forward => "forward",
                    MoveDirection::Backward => "backward",
                };
                write!(f, "move {} {}", dir, distance)
            }
            StatementKind::Turn { direction, degrees } => {
                let dir = match direction {
                    TurnDirection::Left => "left",
                    TurnDirection::Right => "right",
                };
                write!(f, "turn {} {}", dir, degrees)
            }
            StatementKind::Wait { seconds } => write!(f, "wait {}", seconds),
            StatementKind::Speak { text } => write!(f, "speak {:?}", text),
            StatementKind::Servo { servo, value } => write!(f, "servo {} {}", servo, value),
            StatementKind::Audio { clip } => write!(f, "audio {}", clip),
            StatementKind::Stop => f.write_str("stop"),
        }
    }
}

/// One instruction of a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Originating block.
    pub id: StatementId,
    /// What to do.
    #[serde(flatten)]
    pub kind: StatementKind,
}

impl Statement {
    /// Create a statement.
    pub fn new(
        id: impl Into<StatementId>,
        kind: StatementKind,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}
