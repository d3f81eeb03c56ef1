//! Language model client for open-ended chat

mod client;

pub use client::{Brain, OllamaBrain};
#[cfg(test)]
pub use client::BrainError;
