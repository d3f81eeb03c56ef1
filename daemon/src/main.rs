//! sonu-daemon: voice control for a small two-wheeled robot
//!
//! This daemon runs on the robot and provides:
//! - Wake-phrase gated speech recognition over a live microphone stream
//! - Intent classification and a run-state machine (Asleep, Awake, Moving)
//! - Motor control through a GPIO H-bridge
//! - Free-form chat answered by a remote language model
//! - An idle purr while nothing is being said

mod brain;
mod config;
mod control;
mod events;
mod intent;
mod lifecycle;
mod motor;
mod state;
#[cfg(test)]
mod testing;
mod voice;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::brain::{Brain, OllamaBrain};
use crate::config::{Config, MotorBackend};
use crate::control::{ControlError, MainLoop};
use crate::events::RobotEvent;
use crate::intent::PhraseBook;
use crate::lifecycle::ShutdownSignal;
use crate::motor::{Actuator, GpioMotor, LogMotor};
use crate::state::{Collaborators, CommandDispatcher};
use crate::voice::{
    AudioCapture, CommandPlayer, Espeak, HttpTranscriber, HushedSynthesizer, IdleAmbience,
    StreamingRecognizer, Synthesizer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "sonu-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(
        brain = %config.brain.base_url(),
        model = %config.brain.model,
        recognizer = %config.recognizer.endpoint,
        motor = ?config.motor.backend,
        "configuration loaded"
    );

    // Create shutdown signal handler
    let mut shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;

    // Dispatcher -> event logger
    let (event_tx, mut event_rx) = broadcast::channel::<RobotEvent>(64);

    let actuator: Arc<dyn Actuator> = match config.motor.backend {
        MotorBackend::Gpio => Arc::new(
            GpioMotor::open(&config.motor.gpio_root, config.motor.pins)
                .context("failed to open GPIO motor driver")?,
        ),
        MotorBackend::Log => {
            warn!("no motor driver configured, motor commands are only logged");
            Arc::new(LogMotor::new())
        }
    };

    let ambience = Arc::new(if config.ambience.enabled {
        let player = CommandPlayer::new(&config.ambience.player, &config.ambience.sound);
        IdleAmbience::start(Arc::new(player), Duration::from_millis(config.ambience.gap_ms))
    } else {
        IdleAmbience::disabled()
    });

    let voice: Arc<dyn Synthesizer> = Arc::new(HushedSynthesizer::new(
        Arc::new(Espeak::from_config(&config.speech)),
        Arc::clone(&ambience),
    ));

    let brain: Arc<dyn Brain> = Arc::new(
        OllamaBrain::from_config(&config.brain).context("failed to create brain client")?,
    );

    let transcriber = HttpTranscriber::from_config(&config.recognizer)
        .context("failed to create transcription client")?;
    let (recognizer, sink) = StreamingRecognizer::new(&config.recognizer, Arc::new(transcriber));

    // Start the microphone (runs on dedicated thread)
    let capture = AudioCapture::new();
    capture
        .start(&config.recognizer, move |samples| sink.push(samples))
        .context("failed to start audio capture")?;

    let dispatcher = CommandDispatcher::new(
        Collaborators {
            actuator,
            voice,
            brain,
        },
        config.responses.clone(),
        config.motion.clone(),
        event_tx.clone(),
    );

    let mut main_loop = MainLoop::new(
        Box::new(recognizer),
        dispatcher,
        PhraseBook::from_config(&config.phrases),
        config.listening.clone(),
    );

    info!("daemon initialized, entering main loop");

    let outcome = tokio::select! {
        // Listen, classify, dispatch
        result = main_loop.run() => {
            if let Err(ControlError::ActuatorFault { faults, .. }) = &result {
                error!(faults, "actuator keeps failing, halting");
            }
            result.context("main loop stopped")
        }

        // Log robot events
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "robot event");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("event logger exited");
            Ok(())
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    // Cleanup
    info!("shutting down...");

    main_loop.shutdown().await;
    ambience.stop().await;
    capture.stop();

    info!("sonu-daemon stopped");

    outcome
}
