//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::draft::AcceptLevel;

/// git-draft - AI-assisted drafts on git branches
#[derive(Parser)]
#[command(
    name = "git-draft",
    about = "Let a bot edit your working tree on a draft branch, then keep or discard the result",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a prompt on the current draft, creating one if needed
    Generate {
        /// What the bot should do; read from stdin when omitted
        prompt: Option<String>,

        /// Bot to use (a `name` from the config's `bots` list)
        #[arg(short, long)]
        bot: Option<String>,

        /// Accept level: 0/manual, 1/merge, 2/merge-theirs, 3/finalize
        #[arg(short, long)]
        accept: Option<AcceptLevel>,

        /// Give up after this many seconds
        #[arg(short, long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Template name to record with the prompt
        #[arg(long)]
        template: Option<String>,

        /// Keep unstaged changes out of the sync commit
        #[arg(short, long)]
        preserve_unstaged: bool,
    },

    /// Start a draft from the current branch without running a bot
    New,

    /// Commit pending changes on the current draft
    Sync {
        /// Keep unstaged changes out of the sync commit
        #[arg(short, long)]
        preserve_unstaged: bool,
    },

    /// Return to the origin branch, keeping the draft's changes uncommitted
    Finalize {
        /// Keep the draft branch instead of deleting it
        #[arg(short, long)]
        keep_branch: bool,
    },

    /// Discard the draft and restore the origin branch
    Quit,

    /// List drafts created in this repository
    Drafts {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List prompts of a draft (the current one by default)
    Prompts {
        /// Draft suffix
        suffix: Option<String>,

        /// Print only the latest prompt's contents
        #[arg(long)]
        latest: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the log file location
    LogPath,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("git-draft")
        .join("logs")
        .join("git-draft.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Output format for listing commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
