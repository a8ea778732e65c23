//! Tool execution loop
//!
//! One action = one bot session: goal → tool calls → results → ... → done.
//! The runner owns tool execution and the deadline; the bot only asks.

mod config;
mod engine;
mod title;

pub use config::{DEFAULT_MAX_TURNS, RunnerConfig};
pub use engine::{ActionReport, ActionRunner, RunOutcome};
pub use title::{MAX_TITLE_CHARS, commit_title};
