//! git-draft configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bots::FixtureScript;
use crate::draft::{AbortPolicy, AcceptLevel};
use crate::history::HistoryStore;
use crate::r#loop::{DEFAULT_MAX_TURNS, RunnerConfig};

/// Repository-local config file name, looked up in the repository root
pub const LOCAL_CONFIG_FILE: &str = ".git-draft.yml";

/// Main git-draft configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Bot used when `--bot` is not given; the first entry of `bots` otherwise
    #[serde(rename = "default-bot")]
    pub default_bot: Option<String>,

    /// Accept level when `--accept` is not given
    pub accept: AcceptLevel,

    /// Action deadline in seconds; unset means no deadline
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    #[serde(rename = "max-turns")]
    pub max_turns: u32,

    /// Fate of a failed action's writes
    #[serde(rename = "on-abort")]
    pub on_abort: AbortPolicy,

    /// History database location
    #[serde(rename = "history-path")]
    pub history_path: Option<PathBuf>,

    pub bots: Vec<BotConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            default_bot: None,
            accept: AcceptLevel::default(),
            timeout_secs: None,
            max_turns: DEFAULT_MAX_TURNS,
            on_abort: AbortPolicy::default(),
            history_path: None,
            bots: vec![BotConfig::default()],
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// `--config` path, then `.git-draft.yml` in the repository root, then
    /// `<config_dir>/git-draft/git-draft.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>, repo_root: Option<&Path>) -> Result<Self> {
        debug!(?config_path, ?repo_root, "Config::load: called");
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates(repo_root) {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {:#}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Just the log level, read before logging is set up; never fails
    pub fn load_log_level(config_path: Option<&PathBuf>, repo_root: Option<&Path>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::candidates(repo_root),
        };
        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn candidates(repo_root: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(root) = repo_root {
            paths.push(root.join(LOCAL_CONFIG_FILE));
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("git-draft").join("git-draft.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Bot entry by name, else `default-bot`, else the first entry
    pub fn find_bot(&self, name: Option<&str>) -> Option<&BotConfig> {
        debug!(?name, default_bot = ?self.default_bot, "Config::find_bot: called");
        match name.or(self.default_bot.as_deref()) {
            Some(name) => self.bots.iter().find(|b| b.name == name),
            None => self.bots.first(),
        }
    }

    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_path.clone().or_else(HistoryStore::default_path)
    }

    /// Runner settings; `timeout_secs` overrides the configured deadline
    pub fn runner_config(&self, timeout_secs: Option<u64>) -> RunnerConfig {
        let timeout = timeout_secs.or(self.timeout_secs).map(Duration::from_secs);
        RunnerConfig::new(self.max_turns, timeout)
    }
}

/// One bot the user can select with `--bot`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub name: String,

    /// `anthropic` or `fixture`
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Script for the `fixture` provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture: Option<FixtureScript>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "claude".to_string(),
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 16384,
            timeout_ms: 300_000,
            fixture: None,
        }
    }
}
