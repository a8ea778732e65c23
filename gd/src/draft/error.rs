//! Draft lifecycle errors

use std::time::Duration;

use thiserror::Error;

use crate::bots::BotError;
use crate::history::PersistenceError;
use crate::vcs::VcsError;

#[derive(Debug, Error)]
pub enum DraftError {
    /// The repository is not in a state the operation can start from
    #[error("Repository state error: {0}")]
    RepositoryState(String),

    /// The origin branch changed paths the draft also changed
    #[error("Origin branch '{branch}' moved and touches paths changed in the draft: {}", paths.join(", "))]
    OriginMoved { branch: String, paths: Vec<String> },

    #[error("Bot failed: {0}")]
    BotGateway(String),

    #[error("Bot did not finish within {0:?}")]
    Timeout(Duration),

    /// Only logged by lifecycle operations, never returned from them
    #[error("History error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Git error: {0}")]
    Vcs(#[from] VcsError),

    #[error("Unknown bot '{0}'")]
    UnknownBot(String),

    #[error("Cannot create bot: {0}")]
    Bot(#[from] BotError),
}
