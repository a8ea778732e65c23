//! git-draft - AI-assisted drafts layered on git branches
//!
//! A draft is a `draft/<suffix>` branch forked in place from the branch the
//! user was on. Each prompt runs a bot through a tool-calling loop against the
//! live working tree; its edits become a prompt commit, optionally merged with
//! whatever the user changed meanwhile, and finally carried back to the
//! origin branch as uncommitted changes.
//!
//! # Modules
//!
//! - [`draft`] - Draft lifecycle engine
//! - [`r#loop`] - Tool execution loop driving one bot action
//! - [`bots`] - Bot gateway (LLM-backed and scripted bots)
//! - [`llm`] - LLM client trait and Anthropic implementation
//! - [`tools`] - Sandboxed `read_file` / `write_file` tools
//! - [`history`] - SQLite history of drafts, prompts, actions and operations
//! - [`vcs`] - Version-control adapter over the `git` executable
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod bots;
pub mod cli;
pub mod config;
pub mod domain;
pub mod draft;
pub mod history;
pub mod llm;
pub mod tools;
pub mod vcs;

// Note: 'loop' is a reserved keyword, so we use r#loop
#[path = "loop/mod.rs"]
pub mod r#loop;

// Re-export commonly used types
pub use bots::{Bot, BotError, BotSession, BotTurn, FixtureBot, FixtureScript, FixtureStep, LlmBot, create_bot};
pub use config::{BotConfig, Config};
pub use domain::{Action, ActionOutcome, Draft, DraftSummary, Operation, OperationKind, Prompt};
pub use draft::{
    AbortPolicy, AcceptLevel, AcceptResult, DraftError, Drafter, FinalizeResult, GenerateRequest, GenerateResult,
};
pub use history::{HistoryStore, PersistenceError};
pub use llm::{AnthropicClient, LlmClient, LlmError};
pub use r#loop::{ActionReport, ActionRunner, RunOutcome, RunnerConfig};
pub use tools::{Tool, ToolContext, ToolError, ToolExecutor, ToolResult};
pub use vcs::{GitCli, MergeOutcome, MergePolicy, Sha, Vcs, VcsError};
