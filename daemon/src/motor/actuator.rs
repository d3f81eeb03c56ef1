//! Actuator contract shared by all motor backends

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::intent::Direction;

/// How long a drive command lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Travel {
    /// Drive, wait, then stop. The caller awaits the whole step.
    Timed(Duration),
    /// Drive until the next `stop()`; returns as soon as the motors are engaged
    Indefinite,
}

/// Errors raised by a motor backend
#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    #[error("failed to write GPIO {pin}: {source}")]
    Gpio {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("motor driver unavailable: {0}")]
    Unavailable(String),
}

/// Directional drive primitives
///
/// `stop()` must be idempotent and safe to call when already stopped.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Engage the motors in `direction` for the given travel mode
    async fn drive(&self, direction: Direction, travel: Travel) -> Result<(), MotorError>;

    /// Release all motor outputs
    async fn stop(&self) -> Result<(), MotorError>;
}

/// Actuator that only logs, used when no H-bridge is attached
#[derive(Debug, Default)]
pub struct LogMotor {
    driving: Mutex<Option<Direction>>,
}

impl LogMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direction currently being driven, if any
    pub fn driving(&self) -> Option<Direction> {
        self.driving.lock().map(|d| *d).unwrap_or(None)
    }

    fn set_driving(&self, direction: Option<Direction>) {
        if let Ok(mut driving) = self.driving.lock() {
            *driving = direction;
        }
    }
}

#[async_trait]
impl Actuator for LogMotor {
    async fn drive(&self, direction: Direction, travel: Travel) -> Result<(), MotorError> {
        info!(%direction, ?travel, "motors engaged (log backend)");
        self.set_driving(Some(direction));

        if let Travel::Timed(duration) = travel {
            tokio::time::sleep(duration).await;
            self.stop().await?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), MotorError> {
        if self.driving().is_some() {
            info!("motors stopped (log backend)");
        }
        self.set_driving(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timed_drive_stops_after_duration() {
        let motor = LogMotor::new();
        let started = tokio::time::Instant::now();

        motor
            .drive(Direction::Left, Travel::Timed(Duration::from_millis(700)))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(700));
        assert_eq!(motor.driving(), None);
    }

    #[tokio::test]
    async fn test_indefinite_drive_returns_immediately() {
        let motor = LogMotor::new();
        motor.drive(Direction::Forward, Travel::Indefinite).await.unwrap();
        assert_eq!(motor.driving(), Some(Direction::Forward));

        motor.stop().await.unwrap();
        motor.stop().await.unwrap();
        assert_eq!(motor.driving(), None);
    }
}
