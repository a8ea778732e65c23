//! Bot gateway
//!
//! A `Bot` is a factory for sessions. Each action starts a fresh
//! `BotSession` that owns the whole conversation, so dropping a session
//! mid-request (deadline) leaves the bot untouched for the next action.
//! Bots only ask for tool calls; the action runner executes them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

mod error;
mod fixture;
mod llm_bot;

pub use error::BotError;
pub use fixture::{FixtureBot, FixtureScript, FixtureStep};
pub use llm_bot::LlmBot;

use crate::config::BotConfig;
use crate::llm::{ToolCall, ToolDefinition, create_client};

/// Result of one tool call, fed back to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

/// What a session wants next
#[derive(Debug, Clone, PartialEq)]
pub enum BotTurn {
    /// Execute these calls in order, then call `next` with their outcomes
    ToolCalls(Vec<ToolCall>),
    /// The goal is met
    Done { summary: Option<String> },
}

/// Model traffic of a session so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionUsage {
    /// Completed model requests
    pub request_count: u32,
    /// Input plus output tokens over all requests
    pub token_count: u64,
}

pub trait Bot: Send + Sync {
    fn name(&self) -> &str;

    /// Begin a new conversation toward `goal` with the given tool manifest
    fn start(&self, goal: &str, manifest: &[ToolDefinition]) -> Box<dyn BotSession>;
}

#[async_trait]
pub trait BotSession: Send {
    /// Deliver the outcomes of the previous turn's calls (empty on the first
    /// call) and wait for the next turn
    async fn next(&mut self, results: Vec<ToolOutcome>) -> Result<BotTurn, BotError>;

    /// Requests and tokens spent so far; sessions without a model report zero
    fn usage(&self) -> SessionUsage {
        SessionUsage::default()
    }
}

/// Build the bot described by a config entry
pub fn create_bot(config: &BotConfig) -> Result<Arc<dyn Bot>, BotError> {
    debug!(name = %config.name, provider = %config.provider, "create_bot: called");
    match config.provider.as_str() {
        "anthropic" => {
            let client = create_client(config)?;
            Ok(Arc::new(LlmBot::new(&config.name, client, config.max_tokens)))
        }
        "fixture" => match &config.fixture {
            Some(script) => Ok(Arc::new(FixtureBot::new(&config.name, script.clone()))),
            None => {
                debug!("create_bot: fixture provider without script");
                Err(BotError::MissingFixture(config.name.clone()))
            }
        },
        other => {
            debug!(provider = %other, "create_bot: unknown provider");
            Err(BotError::UnknownProvider(other.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_fixture_bot() {
        let config = BotConfig {
            name: "scripted".to_string(),
            provider: "fixture".to_string(),
            fixture: Some(FixtureScript::default()),
            ..BotConfig::default()
        };
        let bot = create_bot(&config).unwrap();
        assert_eq!(bot.name(), "scripted");
    }

    #[test]
    fn test_create_fixture_bot_requires_script() {
        let config = BotConfig {
            provider: "fixture".to_string(),
            ..BotConfig::default()
        };
        assert!(matches!(create_bot(&config), Err(BotError::MissingFixture(_))));
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = BotConfig {
            provider: "openai".to_string(),
            ..BotConfig::default()
        };
        assert!(matches!(create_bot(&config), Err(BotError::UnknownProvider(p)) if p == "openai"));
    }
}
