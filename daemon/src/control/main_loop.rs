//! Listen, classify, dispatch
//!
//! One iteration listens in the mode the current state calls for, turns
//! whatever was heard into an intent, and hands it to the dispatcher.
//! Silence and unrecognized wake attempts simply loop.

use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::ListeningConfig;
use crate::intent::{ListenMode, PhraseBook, Utterance};
use crate::motor::MotorError;
use crate::state::{CommandDispatcher, DispatchError, RunState};
use crate::voice::Recognizer;

/// Consecutive actuator faults after which the loop gives up
const MAX_ACTUATOR_FAULTS: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("actuator failed {faults} times in a row")]
    ActuatorFault {
        faults: u32,
        #[source]
        source: MotorError,
    },
}

/// Drives the robot from recognized speech
pub struct MainLoop {
    recognizer: Box<dyn Recognizer>,
    dispatcher: CommandDispatcher,
    phrases: PhraseBook,
    listening: ListeningConfig,
    actuator_faults: u32,
}

impl MainLoop {
    pub fn new(
        recognizer: Box<dyn Recognizer>,
        dispatcher: CommandDispatcher,
        phrases: PhraseBook,
        listening: ListeningConfig,
    ) -> Self {
        Self {
            recognizer,
            dispatcher,
            phrases,
            listening,
            actuator_faults: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.dispatcher.state()
    }

    /// Greet, then loop until the actuator gives up
    pub async fn run(&mut self) -> Result<(), ControlError> {
        self.dispatcher.greet().await;
        info!(state = %self.state(), "main loop started");

        loop {
            self.step().await?;
        }
    }

    /// One listen, classify, dispatch cycle
    pub async fn step(&mut self) -> Result<(), ControlError> {
        let mode = self.state().listen_mode();
        let (timeout, restrict) = match mode {
            ListenMode::Wake => (
                self.listening.wake_timeout(),
                Some(self.phrases.wake_phrases()),
            ),
            ListenMode::Command => (self.listening.command_timeout(), None),
        };

        debug!(%mode, ?timeout, "listening");
        let Some(heard) = self.recognizer.listen(timeout, restrict).await else {
            return Ok(());
        };
        self.handle(&heard, mode, timeout).await
    }

    async fn handle(
        &mut self,
        heard: &str,
        mode: ListenMode,
        timeout: Duration,
    ) -> Result<(), ControlError> {
        let Some(utterance) = Utterance::new(heard, mode, timeout) else {
            return Ok(());
        };
        let Some(intent) = self.phrases.interpret(&utterance) else {
            debug!(heard = %utterance.text, "no wake phrase");
            return Ok(());
        };

        info!(heard = %utterance.text, %intent, "intent classified");
        match self.dispatcher.dispatch(intent).await {
            Ok(_) => {
                self.actuator_faults = 0;
                Ok(())
            }
            Err(DispatchError::Actuator(e)) => self.recover(e).await,
        }
    }

    /// Force the motors off after a fault, giving up on the second in a row
    async fn recover(&mut self, fault: MotorError) -> Result<(), ControlError> {
        self.actuator_faults += 1;
        error!(error = %fault, faults = self.actuator_faults, "actuator fault");

        if self.actuator_faults >= MAX_ACTUATOR_FAULTS {
            return Err(ControlError::ActuatorFault {
                faults: self.actuator_faults,
                source: fault,
            });
        }

        if let Err(e) = self.dispatcher.emergency_stop().await {
            self.actuator_faults += 1;
            error!(error = %e, "forced stop failed");
            return Err(ControlError::ActuatorFault {
                faults: self.actuator_faults,
                source: e,
            });
        }
        Ok(())
    }

    /// Leave the motors stopped; called on every exit path
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.dispatcher.shutdown().await {
            error!(error = %e, "failed to stop motors on shutdown");
        }
    }
}
