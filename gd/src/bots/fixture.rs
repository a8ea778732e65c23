//! Scripted bot with deterministic behavior
//!
//! Configured inline in YAML:
//!
//! ```yaml
//! bots:
//!   - name: scripted
//!     provider: fixture
//!     fixture:
//!       summary: Add greeting
//!       steps:
//!         - op: write
//!           path: hello.txt
//!           contents: "hello\n"
//!         - op: sleep
//!           ms: 50
//! ```
//!
//! Consecutive `read`/`write` steps are requested in a single turn.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Bot, BotError, BotSession, BotTurn, ToolOutcome};
use crate::llm::{ToolCall, ToolDefinition};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum FixtureStep {
    Read { path: String },
    Write { path: String, contents: String },
    Sleep { ms: u64 },
    Fail { message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureScript {
    pub steps: Vec<FixtureStep>,
    pub summary: Option<String>,
}

pub struct FixtureBot {
    name: String,
    script: FixtureScript,
}

impl FixtureBot {
    pub fn new(name: impl Into<String>, script: FixtureScript) -> Self {
        let name = name.into();
        debug!(%name, step_count = script.steps.len(), "FixtureBot::new: called");
        Self { name, script }
    }
}

impl Bot for FixtureBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, goal: &str, _manifest: &[ToolDefinition]) -> Box<dyn BotSession> {
        debug!(bot = %self.name, %goal, "FixtureBot::start: called");
        Box::new(FixtureSession {
            steps: self.script.steps.iter().cloned().collect(),
            summary: self.script.summary.clone(),
            next_id: 0,
        })
    }
}

struct FixtureSession {
    steps: VecDeque<FixtureStep>,
    summary: Option<String>,
    next_id: u32,
}

impl FixtureSession {
    fn call(&mut self, name: &str, input: serde_json::Value) -> ToolCall {
        self.next_id += 1;
        ToolCall {
            id: format!("fixture_{}", self.next_id),
            name: name.to_string(),
            input,
        }
    }
}

#[async_trait]
impl BotSession for FixtureSession {
    async fn next(&mut self, results: Vec<ToolOutcome>) -> Result<BotTurn, BotError> {
        debug!(result_count = results.len(), remaining = self.steps.len(), "FixtureSession::next: called");
        let mut calls = Vec::new();

        while let Some(step) = self.steps.front() {
            match step {
                FixtureStep::Read { path } => {
                    let input = serde_json::json!({ "path": path });
                    self.steps.pop_front();
                    calls.push(self.call("read_file", input));
                }
                FixtureStep::Write { path, contents } => {
                    let input = serde_json::json!({ "path": path, "contents": contents });
                    self.steps.pop_front();
                    calls.push(self.call("write_file", input));
                }
                // Pending calls go out first; sleep or fail on the following turn
                _ if !calls.is_empty() => break,
                FixtureStep::Sleep { ms } => {
                    let delay = Duration::from_millis(*ms);
                    self.steps.pop_front();
                    debug!(?delay, "FixtureSession::next: sleeping");
                    tokio::time::sleep(delay).await;
                }
                FixtureStep::Fail { message } => {
                    let message = message.clone();
                    self.steps.pop_front();
                    debug!(%message, "FixtureSession::next: scripted failure");
                    return Err(BotError::Script(message));
                }
            }
        }

        if calls.is_empty() {
            Ok(BotTurn::Done {
                summary: self.summary.clone(),
            })
        } else {
            Ok(BotTurn::ToolCalls(calls))
        }
    }
}
