//! Motor actuation
//!
//! The dispatcher only sees the [`Actuator`] trait. Two backends:
//! - `GpioMotor`: dual H-bridge driven through Linux sysfs GPIO
//! - `LogMotor`: logs commands, for running on a desk without wheels

mod actuator;
mod gpio;

pub use actuator::{Actuator, LogMotor, MotorError, Travel};
pub use gpio::GpioMotor;
