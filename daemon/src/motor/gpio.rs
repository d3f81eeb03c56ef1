//! Dual H-bridge over Linux sysfs GPIO
//!
//! Pin levels per direction (AIN1, AIN2, BIN1, BIN2):
//!
//! | direction | AIN1 | AIN2 | BIN1 | BIN2 |
//! |-----------|------|------|------|------|
//! | forward   | 1    | 0    | 1    | 0    |
//! | backward  | 0    | 1    | 0    | 1    |
//! | left      | 0    | 1    | 1    | 0    |
//! | right     | 1    | 0    | 0    | 1    |
//! | stop      | 0    | 0    | 0    | 0    |

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::PinMap;
use crate::intent::Direction;

use super::actuator::{Actuator, MotorError, Travel};

/// Output levels for the four bridge inputs
type Levels = [bool; 4];

const STOPPED: Levels = [false, false, false, false];

fn levels(direction: Direction) -> Levels {
    match direction {
        Direction::Forward => [true, false, true, false],
        Direction::Backward => [false, true, false, true],
        Direction::Left => [false, true, true, false],
        Direction::Right => [true, false, false, true],
    }
}

/// H-bridge motor driver writing sysfs GPIO value files
#[derive(Debug)]
pub struct GpioMotor {
    root: PathBuf,
    pins: [u32; 4],
}

impl GpioMotor {
    /// Export the pins, configure them as outputs, and make sure the motors are off
    pub fn open(root: &Path, pins: PinMap) -> Result<Self, MotorError> {
        if !root.is_dir() {
            return Err(MotorError::Unavailable(format!(
                "GPIO root {} not found",
                root.display()
            )));
        }

        let motor = Self {
            root: root.to_owned(),
            pins: [pins.ain1, pins.ain2, pins.bin1, pins.bin2],
        };

        for pin in motor.pins {
            let pin_dir = motor.pin_dir(pin);
            if !pin_dir.exists() {
                std::fs::write(root.join("export"), pin.to_string())
                    .map_err(|source| MotorError::Gpio { pin, source })?;
            }
            std::fs::write(pin_dir.join("direction"), "out")
                .map_err(|source| MotorError::Gpio { pin, source })?;
            std::fs::write(pin_dir.join("value"), "0")
                .map_err(|source| MotorError::Gpio { pin, source })?;
        }

        info!(root = %root.display(), pins = ?motor.pins, "GPIO motor driver ready");
        Ok(motor)
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    /// Blocking writes: a cancelled drive must never leave a write in flight
    /// that lands after the next stop
    fn write_levels(&self, levels: Levels) -> Result<(), MotorError> {
        for (pin, high) in self.pins.into_iter().zip(levels) {
            let value = if high { "1" } else { "0" };
            std::fs::write(self.pin_dir(pin).join("value"), value)
                .map_err(|source| MotorError::Gpio { pin, source })?;
        }
        Ok(())
    }
}

#[async_trait]
impl Actuator for GpioMotor {
    async fn drive(&self, direction: Direction, travel: Travel) -> Result<(), MotorError> {
        debug!(%direction, ?travel, "driving");
        self.write_levels(levels(direction))?;

        if let Travel::Timed(duration) = travel {
            tokio::time::sleep(duration).await;
            self.stop().await?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), MotorError> {
        self.write_levels(STOPPED)
    }
}
