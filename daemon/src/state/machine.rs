//! Run states of the robot
//!
//! Asleep listens only for the wake phrase. Awake accepts every command.
//! MovingContinuously behaves like Awake while the motors keep driving.

use serde::{Deserialize, Serialize};

use crate::intent::{Direction, ListenMode};

/// The three possible states of the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Waiting for the wake phrase, motors stopped
    #[default]
    Asleep,
    /// Accepting commands, motors stopped
    Awake,
    /// Accepting commands while driving until told otherwise
    MovingContinuously(Direction),
}

impl RunState {
    /// How the recognizer should listen in this state
    pub fn listen_mode(self) -> ListenMode {
        match self {
            RunState::Asleep => ListenMode::Wake,
            RunState::Awake | RunState::MovingContinuously(_) => ListenMode::Command,
        }
    }

    pub fn is_moving(self) -> bool {
        matches!(self, RunState::MovingContinuously(_))
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Asleep => write!(f, "Asleep"),
            RunState::Awake => write!(f, "Awake"),
            RunState::MovingContinuously(direction) => {
                write!(f, "MovingContinuously({})", direction)
            }
        }
    }
}
