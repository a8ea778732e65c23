//! Action runner settings

use std::time::Duration;

use tracing::debug;

/// Default cap on bot turns per action
pub const DEFAULT_MAX_TURNS: u32 = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Turns (bot replies asking for tools) allowed before the action fails
    pub max_turns: u32,

    /// Wall-clock budget for the whole action; `None` waits forever
    pub timeout: Option<Duration>,
}

impl RunnerConfig {
    pub fn new(max_turns: u32, timeout: Option<Duration>) -> Self {
        debug!(max_turns, ?timeout, "RunnerConfig::new: called");
        Self { max_turns, timeout }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            timeout: None,
        }
    }
}
