//! Command mode definitions.
//!
//! This module defines the session states of the device, their prompt
//! patterns and the commands moving between them.

mod command_mode;
mod graph;
pub mod vyos;

pub use command_mode::CommandMode;
pub use graph::{ModeGraph, Transition};
