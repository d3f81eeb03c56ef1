//! Recording fakes for the robot's collaborators
//!
//! Every fake appends to one shared [`Journal`] so tests can assert the
//! relative order of motor, speech, and brain calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::brain::{Brain, BrainError};
use crate::config::{MotionConfig, Responses};
use crate::events::RobotEvent;
use crate::intent::Direction;
use crate::motor::{Actuator, MotorError, Travel};
use crate::state::{Collaborators, CommandDispatcher};
use crate::voice::{Recognizer, Synthesizer};

/// One observable side effect
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Stop,
    Drive(Direction, Travel),
    Say(String),
    Ask(String),
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Effect>>>);

impl Journal {
    pub fn record(&self, effect: Effect) {
        self.0.lock().unwrap().push(effect);
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.0.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Say(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Motor that records calls and can be told to fail
pub struct FakeMotor {
    journal: Journal,
    driving: Mutex<Option<Direction>>,
    failing_drives: AtomicUsize,
    failing_stops: AtomicUsize,
}

impl FakeMotor {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            driving: Mutex::new(None),
            failing_drives: AtomicUsize::new(0),
            failing_stops: AtomicUsize::new(0),
        }
    }

    pub fn driving(&self) -> Option<Direction> {
        *self.driving.lock().unwrap()
    }

    /// Fail the next `count` drive calls
    pub fn fail_drives(&self, count: usize) {
        self.failing_drives.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` stop calls
    pub fn fail_stops(&self, count: usize) {
        self.failing_stops.store(count, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Actuator for FakeMotor {
    async fn drive(&self, direction: Direction, travel: Travel) -> Result<(), MotorError> {
        self.journal.record(Effect::Drive(direction, travel));
        if Self::take_failure(&self.failing_drives) {
            return Err(MotorError::Unavailable("injected drive failure".to_string()));
        }
        *self.driving.lock().unwrap() = Some(direction);
        if let Travel::Timed(duration) = travel {
            tokio::time::sleep(duration).await;
            *self.driving.lock().unwrap() = None;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), MotorError> {
        self.journal.record(Effect::Stop);
        if Self::take_failure(&self.failing_stops) {
            return Err(MotorError::Unavailable("injected stop failure".to_string()));
        }
        *self.driving.lock().unwrap() = None;
        Ok(())
    }
}

pub struct FakeSpeaker {
    journal: Journal,
}

impl FakeSpeaker {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

#[async_trait]
impl Synthesizer for FakeSpeaker {
    async fn say(&self, text: &str) {
        self.journal.record(Effect::Say(text.to_string()));
    }
}

/// Brain answering from a script; an exhausted script answers "ok"
pub struct ScriptedBrain {
    journal: Journal,
    replies: Mutex<VecDeque<Result<String, BrainError>>>,
}

impl ScriptedBrain {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            replies: Mutex::new(VecDeque::new()),
        }
    }

    pub fn reply(&self, reply: Result<String, BrainError>) {
        self.replies.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl Brain for ScriptedBrain {
    async fn ask(&self, prompt: &str) -> Result<String, BrainError> {
        self.journal.record(Effect::Ask(prompt.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }
}

/// One recorded `listen` call
#[derive(Debug, Clone, PartialEq)]
pub struct ListenCall {
    pub timeout: Duration,
    pub restricted: bool,
}

/// Recognizer replaying a fixed list of results, then timing out on silence
pub struct ScriptedRecognizer {
    heard: VecDeque<Option<String>>,
    calls: Arc<Mutex<Vec<ListenCall>>>,
}

impl ScriptedRecognizer {
    pub fn new(heard: &[Option<&str>]) -> Self {
        Self {
            heard: heard.iter().map(|h| h.map(str::to_string)).collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle for inspecting calls after the recognizer has been boxed
    pub fn calls(&self) -> Arc<Mutex<Vec<ListenCall>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn listen(&mut self, timeout: Duration, restrict: Option<&[String]>) -> Option<String> {
        self.calls.lock().unwrap().push(ListenCall {
            timeout,
            restricted: restrict.is_some(),
        });
        match self.heard.pop_front() {
            Some(heard) => heard,
            None => {
                tokio::time::sleep(timeout).await;
                None
            }
        }
    }
}

/// A dispatcher wired to recording fakes
pub struct Rig {
    pub dispatcher: CommandDispatcher,
    pub journal: Journal,
    pub motor: Arc<FakeMotor>,
    pub brain: Arc<ScriptedBrain>,
    pub events: broadcast::Receiver<RobotEvent>,
}

/// Build a dispatcher with single-entry response pools so replies are predictable
pub fn rig() -> Rig {
    let journal = Journal::default();
    let motor = Arc::new(FakeMotor::new(journal.clone()));
    let brain = Arc::new(ScriptedBrain::new(journal.clone()));
    let (event_tx, events) = broadcast::channel(64);

    let dispatcher = CommandDispatcher::new(
        Collaborators {
            actuator: motor.clone(),
            voice: Arc::new(FakeSpeaker::new(journal.clone())),
            brain: brain.clone(),
        },
        predictable_responses(),
        MotionConfig::default(),
        event_tx,
    );

    Rig {
        dispatcher,
        journal,
        motor,
        brain,
        events,
    }
}

fn predictable_responses() -> Responses {
    let mut responses = Responses::default();
    responses.wake = vec!["Ready.".to_string()];
    responses.sleep = vec!["Going to sleep.".to_string()];
    responses.stop = vec!["Stopping.".to_string()];
    responses.not_understood = vec!["I didn't understand.".to_string()];
    responses.moves.forward = vec!["Moving forward.".to_string()];
    responses.moves.backward = vec!["Moving back.".to_string()];
    responses
}

pub fn drain(events: &mut broadcast::Receiver<RobotEvent>) -> Vec<RobotEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
