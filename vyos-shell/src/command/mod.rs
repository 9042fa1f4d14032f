//! Command templates and their execution.
//!
//! A [`CommandTemplate`] is a command line with placeholders and the error
//! patterns it can report. The [`CommandTemplateExecutor`] sends it over a
//! [`ScopedSession`](crate::handler::ScopedSession), answers prompts from an
//! [`ActionMap`] and returns a [`Response`] once the mode prompt comes back.

mod action_map;
mod executor;
mod response;
mod template;

pub use action_map::{Action, ActionMap, ActionMatch};
pub use executor::{ActionLoopDetector, CommandTemplateExecutor};
pub use response::Response;
pub use template::{CommandTemplate, ErrorMap};
