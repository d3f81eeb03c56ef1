//! Events module for dispatcher activity
//!
//! Provides structured event types for state transitions, motor commands,
//! and chat outcomes, broadcast to whoever is listening (the daemon logs
//! them).

use serde::{Deserialize, Serialize};

use crate::intent::Direction;
use crate::state::RunState;

/// Events emitted by the command dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobotEvent {
    /// Run state changed
    StateChanged {
        from: RunState,
        to: RunState,
        /// Time spent in the previous state
        duration_ms: u64,
    },

    /// Motors engaged
    DriveStarted {
        direction: Direction,
        continuous: bool,
    },

    /// All motor outputs released
    MotorsStopped,

    /// Brain replied and the reply was spoken
    ChatAnswered {
        /// Round-trip time of the brain request
        duration_ms: u64,
    },

    /// Brain request failed; an apology was spoken
    ChatFailed { reason: String },

    /// Utterance could not be understood
    NotUnderstood,
}

impl std::fmt::Display for RobotEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RobotEvent::StateChanged { from, to, duration_ms } => {
                write!(f, "STATE_CHANGED {} -> {} ({}ms)", from, to, duration_ms)
            }
            RobotEvent::DriveStarted { direction, continuous: true } => {
                write!(f, "DRIVE_STARTED {} (continuous)", direction)
            }
            RobotEvent::DriveStarted { direction, continuous: false } => {
                write!(f, "DRIVE_STARTED {}", direction)
            }
            RobotEvent::MotorsStopped => write!(f, "MOTORS_STOPPED"),
            RobotEvent::ChatAnswered { duration_ms } => {
                write!(f, "CHAT_ANSWERED ({}ms)", duration_ms)
            }
            RobotEvent::ChatFailed { reason } => write!(f, "CHAT_FAILED: {}", reason),
            RobotEvent::NotUnderstood => write!(f, "NOT_UNDERSTOOD"),
        }
    }
}
