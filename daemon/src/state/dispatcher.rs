//! Command dispatcher
//!
//! Applies one [`Intent`] at a time to the current [`RunState`]. Every
//! motor command is preceded by a stop so two directions are never engaged
//! together, and every spoken acknowledgement is picked at random from the
//! configured pool.

use std::sync::Arc;
use std::time::Instant;

use rand::seq::SliceRandom;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::brain::Brain;
use crate::config::{MotionConfig, Responses};
use crate::events::RobotEvent;
use crate::intent::{Direction, Intent};
use crate::motor::{Actuator, MotorError, Travel};
use crate::voice::Synthesizer;

use super::machine::RunState;

/// Errors that abort a dispatch. Brain and speech failures never do.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("actuator fault: {0}")]
    Actuator(#[from] MotorError),
}

/// Everything the dispatcher acts through
pub struct Collaborators {
    pub actuator: Arc<dyn Actuator>,
    pub voice: Arc<dyn Synthesizer>,
    pub brain: Arc<dyn Brain>,
}

/// Owns the run state and turns intents into effects
pub struct CommandDispatcher {
    /// Current state
    state: RunState,
    /// Time when the current state was entered
    state_entered_at: Instant,
    actuator: Arc<dyn Actuator>,
    voice: Arc<dyn Synthesizer>,
    brain: Arc<dyn Brain>,
    responses: Responses,
    motion: MotionConfig,
    /// Channel for emitting robot events
    event_tx: broadcast::Sender<RobotEvent>,
}

impl CommandDispatcher {
    pub fn new(
        collaborators: Collaborators,
        responses: Responses,
        motion: MotionConfig,
        event_tx: broadcast::Sender<RobotEvent>,
    ) -> Self {
        Self {
            state: RunState::Asleep,
            state_entered_at: Instant::now(),
            actuator: collaborators.actuator,
            voice: collaborators.voice,
            brain: collaborators.brain,
            responses,
            motion,
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Speak the startup greeting
    pub async fn greet(&self) {
        if !self.responses.greeting.is_empty() {
            self.voice.say(&self.responses.greeting).await;
        }
    }

    /// Apply one intent and return the resulting state.
    ///
    /// On error the state is left unchanged; the caller decides how to
    /// recover (see [`CommandDispatcher::emergency_stop`]).
    pub async fn dispatch(&mut self, intent: Intent) -> Result<RunState, DispatchError> {
        debug!(state = %self.state, %intent, "dispatching");

        let next = match (self.state, intent) {
            (_, Intent::Sleep) => {
                self.halt().await?;
                self.say_one(&self.responses.sleep).await;
                RunState::Asleep
            }
            (RunState::Asleep, Intent::Wake) => {
                self.say_one(&self.responses.wake).await;
                RunState::Awake
            }
            (RunState::Asleep, other) => {
                debug!(intent = %other, "ignored while asleep");
                RunState::Asleep
            }
            (state, Intent::Wake) => {
                self.say_one(&self.responses.already_awake).await;
                state
            }
            (_, Intent::Move { direction, continuous }) => {
                self.drive(direction, continuous).await?
            }
            (_, Intent::Stop) => {
                self.halt().await?;
                self.say_one(&self.responses.stop).await;
                RunState::Awake
            }
            (state, Intent::Chat(text)) => {
                self.chat(&text).await;
                state
            }
            (state, Intent::Unknown) => {
                self.emit(RobotEvent::NotUnderstood);
                self.say_one(&self.responses.not_understood).await;
                state
            }
        };

        self.transition_to(next);
        Ok(next)
    }

    /// Stop the motors after a failed dispatch.
    ///
    /// A robot that was moving continuously falls back to Awake; any other
    /// state is kept.
    pub async fn emergency_stop(&mut self) -> Result<(), MotorError> {
        warn!(state = %self.state, "emergency stop");
        self.halt().await?;
        if self.state.is_moving() {
            self.transition_to(RunState::Awake);
        }
        Ok(())
    }

    /// Stop the motors for process shutdown
    pub async fn shutdown(&mut self) -> Result<(), MotorError> {
        info!(state = %self.state, "stopping motors for shutdown");
        self.halt().await?;
        self.transition_to(RunState::Asleep);
        Ok(())
    }

    async fn drive(&self, direction: Direction, continuous: bool) -> Result<RunState, MotorError> {
        self.halt().await?;
        self.say_one(self.responses.moves.for_direction(direction)).await;
        self.emit(RobotEvent::DriveStarted {
            direction,
            continuous,
        });

        if continuous {
            self.actuator.drive(direction, Travel::Indefinite).await?;
            Ok(RunState::MovingContinuously(direction))
        } else {
            let step = self.motion.step(direction);
            info!(%direction, ?step, "driving one step");
            self.actuator.drive(direction, Travel::Timed(step)).await?;
            Ok(RunState::Awake)
        }
    }

    async fn halt(&self) -> Result<(), MotorError> {
        self.actuator.stop().await?;
        self.emit(RobotEvent::MotorsStopped);
        Ok(())
    }

    async fn chat(&self, text: &str) {
        info!(prompt = %text, "asking brain");
        let started = Instant::now();

        match self.brain.ask(text).await {
            Ok(reply) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(duration_ms, "brain replied");
                self.emit(RobotEvent::ChatAnswered { duration_ms });
                self.voice.say(&reply).await;
            }
            Err(e) => {
                warn!(error = %e, "brain request failed");
                self.emit(RobotEvent::ChatFailed {
                    reason: e.to_string(),
                });
                self.say_one(&self.responses.brain_failure).await;
            }
        }
    }

    async fn say_one(&self, pool: &[String]) {
        if let Some(line) = pick(pool) {
            self.voice.say(line).await;
        }
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: RunState) {
        let old_state = self.state;
        if new_state == old_state {
            return;
        }

        let duration_ms = self.state_entered_at.elapsed().as_millis() as u64;
        info!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );

        self.state = new_state;
        self.state_entered_at = Instant::now();
        self.emit(RobotEvent::StateChanged {
            from: old_state,
            to: new_state,
            duration_ms,
        });
    }

    fn emit(&self, event: RobotEvent) {
        debug!(%event, "emitting event");
        let _ = self.event_tx.send(event);
    }
}

fn pick(pool: &[String]) -> Option<&str> {
    pool.choose(&mut rand::thread_rng()).map(String::as_str)
}
