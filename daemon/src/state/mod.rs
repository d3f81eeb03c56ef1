//! Run state and command dispatch
//!
//! Three states:
//! - Asleep: listening for the wake phrase only, motors stopped
//! - Awake: accepting commands, motors stopped
//! - MovingContinuously: accepting commands while driving in one direction

mod dispatcher;
mod machine;

pub use dispatcher::{Collaborators, CommandDispatcher, DispatchError};
pub use machine::RunState;
