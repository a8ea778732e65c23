//! git-draft - AI-assisted drafts on git branches
//!
//! CLI entry point.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use gitdraft::cli::{Cli, Command, OutputFormat, get_log_path};
use gitdraft::config::Config;
use gitdraft::draft::{AcceptResult, Drafter, GenerateRequest};
use gitdraft::history::HistoryStore;
use gitdraft::vcs::{GitCli, Vcs};

fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => parse_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// History database; falls back to an in-memory store if the file can't be opened
fn open_history(config: &Config) -> Result<Arc<HistoryStore>> {
    if let Some(path) = config.history_path() {
        match HistoryStore::open_or_create(&path) {
            Ok(store) => return Ok(Arc::new(store)),
            Err(e) => warn!(?path, error = %e, "open_history: history unavailable, using in-memory store"),
        }
    }
    let store = HistoryStore::open_in_memory().context("Failed to open in-memory history")?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let repo = GitCli::open(&cwd).await;
    let repo_root: Option<PathBuf> = repo.as_ref().ok().map(|r| r.repo_root().to_path_buf());

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref(), repo_root.as_deref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    if let Command::LogPath = cli.command {
        debug!("main: matched LogPath command");
        println!("{}", get_log_path().display());
        return Ok(());
    }

    let config = Config::load(cli.config.as_ref(), repo_root.as_deref()).context("Failed to load configuration")?;
    let repo = repo.context("git-draft must be run inside a git repository")?;
    info!(root = ?repo.repo_root(), "git-draft starting");

    let history = open_history(&config)?;
    let drafter = Drafter::new(Arc::new(repo), history, config);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Generate {
            prompt,
            bot,
            accept,
            timeout,
            template,
            preserve_unstaged,
        } => {
            debug!(?bot, ?accept, ?timeout, "main: matched Generate command");
            let prompt = match prompt {
                Some(prompt) => prompt,
                None => {
                    debug!("main: reading prompt from stdin");
                    std::io::read_to_string(std::io::stdin()).context("Failed to read prompt from stdin")?
                }
            };
            let request = GenerateRequest {
                prompt,
                template,
                bot,
                accept,
                timeout_secs: timeout,
                preserve_unstaged,
            };
            cmd_generate(&drafter, &request).await
        }
        Command::New => {
            debug!("main: matched New command");
            let draft = drafter.resolve_or_create().await?;
            println!("{} on {}", "Draft".green().bold(), draft.branch_name().bold());
            Ok(())
        }
        Command::Sync { preserve_unstaged } => {
            debug!(preserve_unstaged, "main: matched Sync command");
            match drafter.sync(preserve_unstaged).await? {
                Some(commit) => println!("{} {}", "Synced".green().bold(), commit.short()),
                None => println!("Nothing to sync"),
            }
            Ok(())
        }
        Command::Finalize { keep_branch } => {
            debug!(keep_branch, "main: matched Finalize command");
            let result = drafter.finalize(!keep_branch).await?;
            println!(
                "{} {} onto {} as uncommitted changes",
                "Finalized".green().bold(),
                result.draft.branch_name(),
                result.origin_branch.bold()
            );
            Ok(())
        }
        Command::Quit => {
            debug!("main: matched Quit command");
            let draft = drafter.quit().await?;
            println!(
                "{} {}, back on {}",
                "Discarded".yellow().bold(),
                draft.branch_name(),
                draft.origin_branch.bold()
            );
            Ok(())
        }
        Command::Drafts { format } => {
            debug!(?format, "main: matched Drafts command");
            cmd_drafts(&drafter, format)
        }
        Command::Prompts { suffix, latest, format } => {
            debug!(?suffix, latest, ?format, "main: matched Prompts command");
            cmd_prompts(&drafter, suffix.as_deref(), latest, format).await
        }
        Command::LogPath => Ok(()),
    }
}

async fn cmd_generate(drafter: &Drafter, request: &GenerateRequest) -> Result<()> {
    debug!("cmd_generate: called");
    let result = drafter.generate(request).await?;

    if let Some(sync) = &result.sync_commit {
        println!("{} {}", "Synced".dimmed(), sync.short());
    }
    println!(
        "{} {} {} ({} operations, {:.1}s)",
        "Generated".green().bold(),
        result.prompt_commit.short(),
        result.title,
        result.operations.len(),
        result.walltime.as_secs_f64()
    );
    println!("  {} {}", "history".dimmed(), result.history_ref);

    match &result.accept {
        AcceptResult::Manual | AcceptResult::NothingToMerge => {}
        AcceptResult::Merged(commit) => println!("{} {}", "Merged".green(), commit.short()),
        AcceptResult::Conflicted(paths) => {
            println!("{} resolve and commit, or run `git-draft quit`:", "Conflicts".red().bold());
            for path in paths {
                println!("  {}", path);
            }
        }
        AcceptResult::Finalized { origin_branch } => {
            println!("{} onto {}", "Finalized".green().bold(), origin_branch.bold());
        }
    }
    Ok(())
}

fn cmd_drafts(drafter: &Drafter, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_drafts: called");
    let drafts = drafter.list_drafts()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&drafts)?),
        OutputFormat::Text => {
            if drafts.is_empty() {
                println!("No drafts");
            }
            for draft in drafts {
                let state = match draft.retired_at {
                    Some(_) => "retired".dimmed(),
                    None => "active".green(),
                };
                println!(
                    "{}  {:<8} {:<20} {:>3} prompts  {}",
                    draft.suffix.bold(),
                    state,
                    draft.origin_branch,
                    draft.prompt_count,
                    draft.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
    Ok(())
}

async fn cmd_prompts(drafter: &Drafter, suffix: Option<&str>, latest: bool, format: OutputFormat) -> Result<()> {
    debug!(?suffix, latest, "cmd_prompts: called");
    if latest && suffix.is_none() {
        match drafter.latest_prompt().await? {
            Some(prompt) => println!("{}", prompt),
            None => eyre::bail!("No prompt recorded for the current draft"),
        }
        return Ok(());
    }

    let mut prompts = drafter.list_prompts(suffix).await?;
    if latest {
        prompts.truncate(1);
    }
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&prompts)?),
        OutputFormat::Text => {
            for prompt in prompts {
                println!(
                    "{} {}",
                    format!("#{}", prompt.id).bold(),
                    prompt.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
                );
                println!("  {}", prompt.contents.trim().replace('\n', "\n  "));
            }
        }
    }
    Ok(())
}
