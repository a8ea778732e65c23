//! ActionRunner - drives one bot session against the working tree

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::RunnerConfig;
use crate::bots::{Bot, BotSession, BotTurn, SessionUsage, ToolOutcome};
use crate::domain::{Operation, OperationKind};
use crate::llm::ToolCall;
use crate::tools::{ToolContext, ToolExecutor};

/// How an action ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success { summary: Option<String> },
    Timeout,
    Failure { error: String },
}

/// Everything an action did, whatever its outcome
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub outcome: RunOutcome,

    /// Recorded operations in execution order
    pub operations: Vec<Operation>,

    /// Bot replies received
    pub turn_count: u32,

    /// Model requests and tokens the session spent
    pub usage: SessionUsage,

    pub walltime: Duration,
}

impl ActionReport {
    /// Paths written during the action, first write order, deduplicated
    pub fn written_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for op in self.operations.iter().filter(|op| op.kind == OperationKind::Write) {
            if !paths.contains(&op.path) {
                paths.push(op.path.clone());
            }
        }
        paths
    }
}

/// Mediates between a bot session and the tools
///
/// Tool calls run one at a time in the order requested. The deadline is
/// enforced while waiting on the bot (the pending request is dropped) and
/// between tool calls, never during one.
pub struct ActionRunner {
    config: RunnerConfig,
    executor: ToolExecutor,
}

impl ActionRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self::with_executor(config, ToolExecutor::standard())
    }

    pub fn with_executor(config: RunnerConfig, executor: ToolExecutor) -> Self {
        debug!(?config, "ActionRunner::with_executor: called");
        Self { config, executor }
    }

    pub async fn run(&self, bot: &dyn Bot, goal: &str, ctx: &ToolContext) -> ActionReport {
        debug!(bot = %bot.name(), "ActionRunner::run: called");
        let started = Instant::now();
        let deadline = self.config.timeout.map(|t| tokio::time::Instant::now() + t);

        let mut session = bot.start(goal, &self.executor.definitions());
        let mut operations = Vec::new();
        let mut turn_count = 0;
        let mut results = Vec::new();

        let outcome = loop {
            let turn = match next_turn(session.as_mut(), std::mem::take(&mut results), deadline).await {
                Some(turn) => turn,
                None => {
                    info!(bot = %bot.name(), turn_count, "ActionRunner::run: deadline reached waiting on bot");
                    break RunOutcome::Timeout;
                }
            };
            turn_count += 1;

            let calls = match turn {
                Ok(BotTurn::Done { summary }) => {
                    debug!(?summary, "ActionRunner::run: bot done");
                    break RunOutcome::Success { summary };
                }
                Ok(BotTurn::ToolCalls(calls)) => calls,
                Err(e) => {
                    warn!(bot = %bot.name(), error = %e, "ActionRunner::run: bot failed");
                    break RunOutcome::Failure { error: e.to_string() };
                }
            };

            if turn_count > self.config.max_turns {
                warn!(max_turns = self.config.max_turns, "ActionRunner::run: max turns exceeded");
                break RunOutcome::Failure {
                    error: format!("Bot exceeded max turns ({})", self.config.max_turns),
                };
            }

            match self.execute_calls(&calls, ctx, deadline, &mut operations).await {
                Some(outcomes) => results = outcomes,
                None => {
                    info!(bot = %bot.name(), turn_count, "ActionRunner::run: deadline reached between tool calls");
                    break RunOutcome::Timeout;
                }
            }
        };

        let walltime = started.elapsed();
        let usage = session.usage();
        info!(
            bot = %bot.name(),
            ?outcome,
            turn_count,
            request_count = usage.request_count,
            token_count = usage.token_count,
            operation_count = operations.len(),
            walltime_ms = walltime.as_millis() as u64,
            "ActionRunner::run: action finished"
        );
        ActionReport {
            outcome,
            operations,
            turn_count,
            usage,
            walltime,
        }
    }

    /// Execute calls in order; `None` once the deadline has passed
    async fn execute_calls(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
        deadline: Option<tokio::time::Instant>,
        operations: &mut Vec<Operation>,
    ) -> Option<Vec<ToolOutcome>> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                return None;
            }

            let result = self.executor.execute(call, ctx).await;
            if let Some(touched) = &result.touched {
                operations.push(Operation {
                    seq: operations.len() as u32,
                    kind: touched.kind,
                    path: touched.path.clone(),
                    size: touched.size,
                });
            }
            outcomes.push(ToolOutcome {
                call_id: call.id.clone(),
                content: result.content,
                is_error: result.is_error,
            });
        }
        Some(outcomes)
    }
}

/// Wait for the session's next turn; `None` if the deadline fires first
async fn next_turn(
    session: &mut dyn BotSession,
    results: Vec<ToolOutcome>,
    deadline: Option<tokio::time::Instant>,
) -> Option<Result<BotTurn, crate::bots::BotError>> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, session.next(results)).await.ok(),
        None => Some(session.next(results).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::{FixtureBot, FixtureScript, FixtureStep};
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &str, contents: &str) -> FixtureStep {
        FixtureStep::Write {
            path: path.to_string(),
            contents: contents.to_string(),
        }
    }

    fn read(path: &str) -> FixtureStep {
        FixtureStep::Read { path: path.to_string() }
    }

    fn bot(steps: Vec<FixtureStep>, summary: Option<&str>) -> FixtureBot {
        FixtureBot::new(
            "fixture",
            FixtureScript {
                steps,
                summary: summary.map(str::to_string),
            },
        )
    }

    #[tokio::test]
    async fn test_success_records_operations_in_order() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("existing.txt"), "old").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());
        let runner = ActionRunner::new(RunnerConfig::default());

        let bot = bot(
            vec![read("existing.txt"), read("missing.txt"), write("new.txt", "hello")],
            Some("Added new.txt"),
        );
        let report = runner.run(&bot, "goal", &ctx).await;

        assert_eq!(
            report.outcome,
            RunOutcome::Success {
                summary: Some("Added new.txt".to_string())
            }
        );
        assert_eq!(report.turn_count, 2);
        let ops: Vec<(u32, OperationKind, &str, Option<u64>)> = report
            .operations
            .iter()
            .map(|op| (op.seq, op.kind, op.path.as_str(), op.size))
            .collect();
        assert_eq!(
            ops,
            vec![
                (0, OperationKind::Read, "existing.txt", Some(3)),
                (1, OperationKind::Read, "missing.txt", None),
                (2, OperationKind::Write, "new.txt", Some(5)),
            ]
        );
        assert_eq!(report.written_paths(), vec!["new.txt".to_string()]);
        assert_eq!(fs::read_to_string(temp.path().join("new.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_rejected_calls_are_not_recorded() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());
        let runner = ActionRunner::new(RunnerConfig::default());

        let bot = bot(vec![write("../escape.txt", "x"), write("ok.txt", "ok")], None);
        let report = runner.run(&bot, "goal", &ctx).await;

        assert!(matches!(report.outcome, RunOutcome::Success { summary: None }));
        assert_eq!(report.operations.len(), 1);
        assert_eq!(report.operations[0].seq, 0);
        assert_eq!(report.operations[0].path, "ok.txt");
    }

    #[tokio::test]
    async fn test_timeout_while_waiting_on_bot() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());
        let runner = ActionRunner::new(RunnerConfig::new(32, Some(Duration::from_millis(200))));

        let bot = bot(
            vec![write("first.txt", "1"), FixtureStep::Sleep { ms: 10_000 }, write("second.txt", "2")],
            None,
        );
        let report = runner.run(&bot, "goal", &ctx).await;

        assert_eq!(report.outcome, RunOutcome::Timeout);
        assert_eq!(report.written_paths(), vec!["first.txt".to_string()]);
        assert!(temp.path().join("first.txt").exists());
        assert!(!temp.path().join("second.txt").exists());
        assert!(report.walltime < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_bot_failure() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());
        let runner = ActionRunner::new(RunnerConfig::default());

        let bot = bot(
            vec![
                write("partial.txt", "x"),
                FixtureStep::Fail {
                    message: "model refused".to_string(),
                },
            ],
            None,
        );
        let report = runner.run(&bot, "goal", &ctx).await;

        assert!(matches!(&report.outcome, RunOutcome::Failure { error } if error.contains("model refused")));
        assert_eq!(report.operations.len(), 1);
    }

    #[tokio::test]
    async fn test_max_turns_exceeded() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());
        let runner = ActionRunner::new(RunnerConfig::new(1, None));

        let bot = bot(
            vec![
                write("a.txt", "a"),
                FixtureStep::Sleep { ms: 1 },
                write("b.txt", "b"),
            ],
            None,
        );
        let report = runner.run(&bot, "goal", &ctx).await;

        assert!(matches!(&report.outcome, RunOutcome::Failure { error } if error.contains("max turns")));
        assert!(!temp.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn test_binary_read_is_recorded() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("logo.bin"), [0xff, 0xfe, 0x00, 0x81]).unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());
        let runner = ActionRunner::new(RunnerConfig::default());

        let report = runner.run(&bot(vec![read("logo.bin")], None), "goal", &ctx).await;

        assert_eq!(report.outcome, RunOutcome::Success { summary: None });
        assert_eq!(report.operations.len(), 1);
        assert_eq!(report.operations[0].path, "logo.bin");
        assert_eq!(report.operations[0].size, Some(4));
    }

    #[tokio::test]
    async fn test_report_carries_model_usage() {
        use crate::bots::LlmBot;
        use crate::llm::client::mock::MockLlmClient;
        use crate::llm::{CompletionResponse, StopReason, TokenUsage};
        use std::sync::Arc;

        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());
        let reply = |content: &str, calls: Vec<ToolCall>, stop_reason| CompletionResponse {
            content: Some(content.to_string()),
            tool_calls: calls,
            stop_reason,
            usage: TokenUsage {
                input_tokens: 40,
                output_tokens: 10,
            },
        };
        let call = ToolCall {
            id: "toolu_1".to_string(),
            name: "read_file".to_string(),
            input: serde_json::json!({"path": "a.txt"}),
        };
        let client = Arc::new(MockLlmClient::new(vec![
            reply("Looking", vec![call], StopReason::ToolUse),
            reply("Nothing there", vec![], StopReason::EndTurn),
        ]));
        let llm_bot = LlmBot::new("claude", client, 1024);

        let report = ActionRunner::new(RunnerConfig::default())
            .run(&llm_bot, "goal", &ctx)
            .await;

        assert!(matches!(report.outcome, RunOutcome::Success { .. }));
        assert_eq!(
            report.usage,
            SessionUsage {
                request_count: 2,
                token_count: 100,
            }
        );

        let scripted = ActionRunner::new(RunnerConfig::default())
            .run(&bot(vec![], Some("noop")), "goal", &ctx)
            .await;
        assert_eq!(scripted.usage, SessionUsage::default());
    }
}
