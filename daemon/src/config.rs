//! Configuration loading and management
//!
//! Everything the robot says, hears, and drives with lives here so the
//! state machine never hardcodes a phrase, a pin, or a step duration.
//! Values come from a TOML file (`SONU_CONFIG`, else
//! `~/.config/sonu/config.toml`) layered over the defaults below, then a
//! handful of environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};

use crate::intent::Direction;

/// Longest timeout or step duration accepted from the file
const MAX_DURATION: Duration = Duration::from_secs(3600);

/// Daemon configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub phrases: PhraseConfig,
    pub responses: Responses,
    pub listening: ListeningConfig,
    pub motion: MotionConfig,
    pub motor: MotorConfig,
    pub recognizer: RecognizerConfig,
    pub brain: BrainConfig,
    pub speech: SpeechConfig,
    pub ambience: AmbienceConfig,
}

impl Config {
    /// Load configuration from file, environment and defaults
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) if std::env::var_os("SONU_CONFIG").is_some() => {
                bail!("config file {} does not exist", path.display())
            }
            _ => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse TOML text, filling unspecified fields with defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os("SONU_CONFIG") {
            return Some(PathBuf::from(path));
        }
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("sonu")
                .join("config.toml"),
        )
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("SONU_BRAIN_HOST") {
            self.brain.host = host;
        }
        if let Ok(port) = std::env::var("SONU_BRAIN_PORT") {
            self.brain.port = port
                .parse()
                .with_context(|| format!("SONU_BRAIN_PORT is not a port: {port}"))?;
        }
        if let Ok(model) = std::env::var("SONU_BRAIN_MODEL") {
            self.brain.model = model;
        }
        if let Ok(endpoint) = std::env::var("SONU_RECOGNIZER_ENDPOINT") {
            self.recognizer.endpoint = endpoint;
        }
        if let Ok(backend) = std::env::var("SONU_MOTOR_BACKEND") {
            self.motor.backend = match backend.as_str() {
                "gpio" => MotorBackend::Gpio,
                "log" => MotorBackend::Log,
                other => bail!("unknown SONU_MOTOR_BACKEND: {other}"),
            };
        }
        Ok(())
    }

    /// Reject configurations the state machine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.phrases.wake.iter().all(|p| p.trim().is_empty()) {
            bail!("at least one wake phrase is required");
        }
        if self.phrases.sleep.iter().all(|p| p.trim().is_empty()) {
            bail!("at least one sleep phrase is required");
        }

        let seconds = [
            ("listening.wake_timeout_secs", self.listening.wake_timeout_secs),
            ("listening.command_timeout_secs", self.listening.command_timeout_secs),
            ("motion.step_forward_secs", self.motion.step_forward_secs),
            ("motion.step_backward_secs", self.motion.step_backward_secs),
            ("motion.step_left_secs", self.motion.step_left_secs),
            ("motion.step_right_secs", self.motion.step_right_secs),
            ("brain.timeout_secs", self.brain.timeout_secs),
        ];
        for (name, value) in seconds {
            match Duration::try_from_secs_f64(value) {
                Ok(duration) if !duration.is_zero() && duration <= MAX_DURATION => {}
                _ => bail!(
                    "{name} must be between 0 and {} seconds, got {value}",
                    MAX_DURATION.as_secs()
                ),
            }
        }

        if self.recognizer.sample_rate == 0 || self.recognizer.block_size == 0 {
            bail!("recognizer sample_rate and block_size must be non-zero");
        }
        Ok(())
    }
}

/// Phrases per direction
#[derive(Debug, Clone)]
pub struct DirectionWords {
    pub forward: Vec<String>,
    pub backward: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
}

/// A `DirectionWords` table as written in the file; missing directions keep their defaults
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DirectionOverrides {
    forward: Option<Vec<String>>,
    backward: Option<Vec<String>>,
    left: Option<Vec<String>>,
    right: Option<Vec<String>>,
}

impl DirectionOverrides {
    fn over(self, defaults: DirectionWords) -> DirectionWords {
        DirectionWords {
            forward: self.forward.unwrap_or(defaults.forward),
            backward: self.backward.unwrap_or(defaults.backward),
            left: self.left.unwrap_or(defaults.left),
            right: self.right.unwrap_or(defaults.right),
        }
    }
}

fn move_words<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DirectionWords, D::Error> {
    Ok(DirectionOverrides::deserialize(deserializer)?.over(default_move_words()))
}

fn continuous_words<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DirectionWords, D::Error> {
    Ok(DirectionOverrides::deserialize(deserializer)?.over(default_continuous_words()))
}

fn move_responses<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DirectionWords, D::Error> {
    Ok(DirectionOverrides::deserialize(deserializer)?.over(default_move_responses()))
}

impl DirectionWords {
    pub fn for_direction(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }
}

/// Phrase lists matched against recognized speech
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhraseConfig {
    pub wake: Vec<String>,
    pub sleep: Vec<String>,
    pub stop: Vec<String>,
    /// Recognizer filler tokens; an utterance of only these is not understood
    pub noise: Vec<String>,
    /// Single-step movement keywords
    #[serde(deserialize_with = "move_words")]
    pub moves: DirectionWords,
    /// Phrases that start an indefinite drive
    #[serde(deserialize_with = "continuous_words")]
    pub continuous: DirectionWords,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            wake: strings(&["hey sonu", "hey sono", "hey soonu", "hey so new", "hey son"]),
            sleep: strings(&[
                "you can sleep now",
                "go to sleep",
                "go sleep",
                "sleep now",
                "take rest",
                "sonu sleep",
            ]),
            stop: strings(&["stop"]),
            noise: strings(&["unk", "huh", "hmm", "um", "uh"]),
            moves: default_move_words(),
            continuous: default_continuous_words(),
        }
    }
}

fn default_move_words() -> DirectionWords {
    DirectionWords {
        forward: strings(&["forward"]),
        backward: strings(&["backward", "back"]),
        left: strings(&["left"]),
        right: strings(&["right"]),
    }
}

fn default_continuous_words() -> DirectionWords {
    DirectionWords {
        forward: strings(&["continue moving forward", "continue forward"]),
        backward: strings(&["continue moving back", "continue backward"]),
        left: strings(&["continue moving left", "continue left"]),
        right: strings(&["continue moving right", "continue right"]),
    }
}

/// Pools of spoken replies; one entry is picked at random per use
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Responses {
    pub greeting: String,
    pub wake: Vec<String>,
    pub already_awake: Vec<String>,
    pub sleep: Vec<String>,
    pub stop: Vec<String>,
    pub not_understood: Vec<String>,
    pub brain_failure: Vec<String>,
    #[serde(deserialize_with = "move_responses")]
    pub moves: DirectionWords,
}

impl Default for Responses {
    fn default() -> Self {
        Self {
            greeting: "Voice control online. Say Hey Sonu to wake me.".to_string(),
            wake: strings(&["Standing by.", "Yes, I'm here.", "Ready.", "Listening."]),
            already_awake: strings(&["Yes?"]),
            sleep: strings(&["Going to sleep.", "Okay, sleeping."]),
            stop: strings(&["Stopping.", "Hold position."]),
            not_understood: strings(&["I didn't understand.", "Please repeat."]),
            brain_failure: strings(&["I had a problem thinking."]),
            moves: default_move_responses(),
        }
    }
}

fn default_move_responses() -> DirectionWords {
    DirectionWords {
        forward: strings(&["Moving forward.", "Advancing."]),
        backward: strings(&["Moving back.", "Retreating."]),
        left: strings(&["Turning left."]),
        right: strings(&["Turning right."]),
    }
}

/// Capture timeouts for the two listening modes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListeningConfig {
    pub wake_timeout_secs: f64,
    pub command_timeout_secs: f64,
}

impl ListeningConfig {
    pub fn wake_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.wake_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.command_timeout_secs)
    }
}

impl Default for ListeningConfig {
    fn default() -> Self {
        Self {
            wake_timeout_secs: 6.0,
            command_timeout_secs: 7.0,
        }
    }
}

/// How long a single step drives in each direction
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub step_forward_secs: f64,
    pub step_backward_secs: f64,
    pub step_left_secs: f64,
    pub step_right_secs: f64,
}

impl MotionConfig {
    pub fn step(&self, direction: Direction) -> Duration {
        let secs = match direction {
            Direction::Forward => self.step_forward_secs,
            Direction::Backward => self.step_backward_secs,
            Direction::Left => self.step_left_secs,
            Direction::Right => self.step_right_secs,
        };
        Duration::from_secs_f64(secs)
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            step_forward_secs: 1.0,
            step_backward_secs: 1.0,
            step_left_secs: 0.7,
            step_right_secs: 0.7,
        }
    }
}

/// Which actuator implementation drives the wheels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorBackend {
    /// H-bridge on Linux sysfs GPIO
    Gpio,
    /// Log commands only, for running without hardware
    Log,
}

/// Where microphone samples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureBackend {
    /// Native input stream through cpal
    Cpal,
    /// `arecord` child process writing raw PCM to stdout
    Arecord,
}

/// H-bridge input pins (BCM numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PinMap {
    pub ain1: u32,
    pub ain2: u32,
    pub bin1: u32,
    pub bin2: u32,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            ain1: 17,
            ain2: 18,
            bin1: 22,
            bin2: 23,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub backend: MotorBackend,
    pub gpio_root: PathBuf,
    pub pins: PinMap,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            backend: MotorBackend::Gpio,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            pins: PinMap::default(),
        }
    }
}

/// Microphone capture and transcription endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Whisper-compatible endpoint accepting a multipart WAV upload
    pub endpoint: String,
    pub model: String,
    pub capture: CaptureBackend,
    /// Input device name, or "default" for the system default
    pub device: String,
    pub sample_rate: u32,
    /// Frames per capture callback
    pub block_size: usize,
    /// RMS level above which a block counts as speech
    pub energy_threshold: f32,
    pub min_speech_ms: u64,
    pub trailing_silence_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/inference".to_string(),
            model: "base.en".to_string(),
            capture: CaptureBackend::Cpal,
            device: "default".to_string(),
            sample_rate: 16_000,
            block_size: 4000,
            energy_threshold: 0.02,
            min_speech_ms: 250,
            trailing_silence_ms: 600,
            request_timeout_secs: 15,
        }
    }
}

/// Language model server (Ollama chat API)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_secs: f64,
    /// Prepended to every question
    pub persona: String,
    /// Past exchanges kept in memory and resent with each question
    pub history_turns: usize,
}

impl BrainConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.8".to_string(),
            port: 11434,
            model: "phi3:mini".to_string(),
            timeout_secs: 60.0,
            persona: "You are Sonu, a small cute cat-like exploration robot. \
                      Answer briefly in one or two short sentences. User said: "
                .to_string(),
            history_turns: 3,
        }
    }
}

/// Text-to-speech program
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub program: String,
    /// Words per minute
    pub speed: u32,
    pub voice: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: "espeak".to_string(),
            speed: 160,
            voice: None,
        }
    }
}

/// Idle breathing/purring sound
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmbienceConfig {
    pub enabled: bool,
    pub sound: PathBuf,
    pub player: String,
    pub gap_ms: u64,
}

impl Default for AmbienceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: PathBuf::from("voice/sounds/purr.wav"),
            player: "aplay".to_string(),
            gap_ms: 100,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
