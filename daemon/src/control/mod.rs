//! Main control loop

mod main_loop;

pub use main_loop::{ControlError, MainLoop};
