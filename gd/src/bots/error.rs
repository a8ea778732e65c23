//! Bot gateway errors

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Bot gave up: {0}")]
    Script(String),

    #[error("Unknown bot provider '{0}'. Supported: anthropic, fixture")]
    UnknownProvider(String),

    #[error("Bot '{0}' uses the fixture provider but has no fixture script")]
    MissingFixture(String),
}
