//! Idle ambience: a purring sound looped while the robot has nothing to say
//!
//! Both flags are polled between playback cycles only, so a pause or stop
//! request lets the clip already playing run to its end.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::speaker::Synthesizer;

/// Poll interval while paused
const PAUSE_POLL: Duration = Duration::from_millis(50);

/// Back-off after a failed playback, so a missing file does not spin
const FAILURE_BACKOFF: Duration = Duration::from_secs(2);

/// Longest wait for the loop to notice a stop request before aborting it
const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("failed to run player: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("player exited with {0}")]
    Exit(std::process::ExitStatus),
}

/// Plays one full cycle of the idle sound
#[async_trait]
pub trait SoundPlayer: Send + Sync {
    async fn play(&self) -> Result<(), PlaybackError>;
}

/// Plays a sound file through an external player (`aplay -q <file>`)
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    sound: PathBuf,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, sound: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            sound: sound.into(),
        }
    }
}

#[async_trait]
impl SoundPlayer for CommandPlayer {
    async fn play(&self) -> Result<(), PlaybackError> {
        let status = Command::new(&self.program)
            .arg("-q")
            .arg(&self.sound)
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(PlaybackError::Exit(status))
        }
    }
}

/// Handle to the background ambience task
pub struct IdleAmbience {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IdleAmbience {
    /// Spawn the playback loop
    pub fn start(player: Arc<dyn SoundPlayer>, gap: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let paused = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_loop(
            player,
            Arc::clone(&running),
            Arc::clone(&paused),
            gap,
        ));
        info!("idle ambience started");

        Self {
            running,
            paused,
            task: Mutex::new(Some(task)),
        }
    }

    /// A handle with no background task, for when ambience is turned off
    pub fn disabled() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Pause until the returned guard is dropped
    pub fn hush(&self) -> Hush<'_> {
        self.pause();
        Hush { ambience: self }
    }

    /// Ask the loop to exit and wait for it
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);

        let task = self.task.lock().ok().and_then(|mut task| task.take());
        let Some(mut task) = task else {
            return;
        };

        if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
            warn!("idle ambience did not stop in time, aborting");
            task.abort();
        }
        info!("idle ambience stopped");
    }
}

/// Keeps the ambience paused while alive
pub struct Hush<'a> {
    ambience: &'a IdleAmbience,
}

impl Drop for Hush<'_> {
    fn drop(&mut self) {
        self.ambience.resume();
    }
}

async fn run_loop(
    player: Arc<dyn SoundPlayer>,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    gap: Duration,
) {
    while running.load(Ordering::SeqCst) {
        if paused.load(Ordering::SeqCst) {
            tokio::time::sleep(PAUSE_POLL).await;
            continue;
        }

        if let Err(e) = player.play().await {
            warn!(error = %e, "idle sound playback failed");
            tokio::time::sleep(FAILURE_BACKOFF).await;
        }
        tokio::time::sleep(gap).await;
    }
    debug!("idle ambience loop exited");
}

/// Synthesizer wrapper that hushes the ambience for the duration of speech
pub struct HushedSynthesizer {
    inner: Arc<dyn Synthesizer>,
    ambience: Arc<IdleAmbience>,
}

impl HushedSynthesizer {
    pub fn new(inner: Arc<dyn Synthesizer>, ambience: Arc<IdleAmbience>) -> Self {
        Self { inner, ambience }
    }
}

#[async_trait]
impl Synthesizer for HushedSynthesizer {
    async fn say(&self, text: &str) {
        let _hush = self.ambience.hush();
        self.inner.say(text).await;
    }
}
