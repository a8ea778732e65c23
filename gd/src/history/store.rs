//! SQLite-backed history store

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use tracing::debug;

use crate::domain::{Action, ActionOutcome, Draft, DraftSummary, Operation, OperationKind, Prompt};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS branches (
    suffix TEXT PRIMARY KEY,
    repo_path TEXT NOT NULL,
    repo_uuid TEXT NOT NULL,
    origin_branch TEXT NOT NULL,
    origin_sha TEXT NOT NULL,
    created_at TEXT NOT NULL,
    retired_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_branches_repo ON branches(repo_path, created_at DESC);

CREATE TABLE IF NOT EXISTS prompts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    branch_suffix TEXT NOT NULL,
    template TEXT,
    contents TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_prompts_branch ON prompts(branch_suffix, created_at DESC);

CREATE TABLE IF NOT EXISTS actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    prompt_id INTEGER NOT NULL REFERENCES prompts(id),
    bot_name TEXT NOT NULL,
    walltime REAL NOT NULL,
    outcome TEXT NOT NULL,
    commit_sha TEXT,
    error TEXT,
    turn_count INTEGER NOT NULL DEFAULT 0,
    request_count INTEGER NOT NULL DEFAULT 0,
    token_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_actions_prompt ON actions(prompt_id);

CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action_id INTEGER NOT NULL REFERENCES actions(id),
    action_commit_sha TEXT,
    seq INTEGER NOT NULL,
    kind TEXT NOT NULL,
    path TEXT NOT NULL,
    size INTEGER
);

CREATE INDEX IF NOT EXISTS idx_operations_action ON operations(action_id, seq);
";

/// History store failures. Lifecycle operations log these and carry on.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt history row: {0}")]
    Corrupt(String),

    #[error("History store lock poisoned")]
    Poisoned,
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Append-only history database
pub struct HistoryStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore").field("path", &self.path).finish()
    }
}

impl HistoryStore {
    /// Default database location under the user's data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("git-draft").join("history.db"))
    }

    /// Open the database at `path`, creating it and its schema if needed
    pub fn open_or_create(path: &Path) -> PersistenceResult<Self> {
        debug!(?path, "HistoryStore::open_or_create: called");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Throwaway database, used by tests
    pub fn open_in_memory() -> PersistenceResult<Self> {
        debug!("HistoryStore::open_in_memory: called");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> PersistenceResult<T>) -> PersistenceResult<T> {
        let conn = self.conn.lock().map_err(|_| PersistenceError::Poisoned)?;
        f(&conn)
    }

    pub fn record_branch(&self, repo_path: &Path, repo_uuid: &str, draft: &Draft) -> PersistenceResult<()> {
        debug!(suffix = %draft.suffix, ?repo_path, "HistoryStore::record_branch: called");
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO branches (suffix, repo_path, repo_uuid, origin_branch, origin_sha, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    draft.suffix,
                    repo_path.to_string_lossy(),
                    repo_uuid,
                    draft.origin_branch,
                    draft.origin_sha,
                    stamp(draft.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn mark_retired(&self, suffix: &str) -> PersistenceResult<()> {
        debug!(%suffix, "HistoryStore::mark_retired: called");
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE branches SET retired_at = ?1 WHERE suffix = ?2 AND retired_at IS NULL",
                params![stamp(Utc::now()), suffix],
            )?;
            Ok(())
        })
    }

    /// Returns the new prompt id
    pub fn record_prompt(&self, suffix: &str, template: Option<&str>, contents: &str) -> PersistenceResult<i64> {
        debug!(%suffix, ?template, "HistoryStore::record_prompt: called");
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO prompts (branch_suffix, template, contents, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![suffix, template, contents, stamp(Utc::now())],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Returns the new action id
    pub fn record_action(&self, action: &Action) -> PersistenceResult<i64> {
        debug!(prompt_id = action.prompt_id, outcome = %action.outcome, "HistoryStore::record_action: called");
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO actions (prompt_id, bot_name, walltime, outcome, commit_sha, error, turn_count,
                                      request_count, token_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    action.prompt_id,
                    action.bot_name,
                    action.walltime,
                    action.outcome.as_str(),
                    action.commit_sha,
                    action.error,
                    action.turn_count,
                    action.request_count,
                    action.token_count as i64,
                    stamp(Utc::now()),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn record_operation(&self, action_id: i64, commit_sha: Option<&str>, op: &Operation) -> PersistenceResult<()> {
        debug!(action_id, seq = op.seq, "HistoryStore::record_operation: called");
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO operations (action_id, action_commit_sha, seq, kind, path, size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![action_id, commit_sha, op.seq, op.kind.as_str(), op.path, op.size.map(|s| s as i64)],
            )?;
            Ok(())
        })
    }

    /// Prompts of one draft, newest first
    ///
    /// A draft whose branch row was never recorded still lists its prompts.
    pub fn list_prompts(&self, repo_path: &Path, suffix: &str) -> PersistenceResult<Vec<Prompt>> {
        debug!(?repo_path, %suffix, "HistoryStore::list_prompts: called");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.branch_suffix, p.template, p.contents, p.created_at
                 FROM prompts p LEFT JOIN branches b ON b.suffix = p.branch_suffix
                 WHERE p.branch_suffix = ?2 AND (b.suffix IS NULL OR b.repo_path = ?1)
                 ORDER BY p.created_at DESC, p.id DESC",
            )?;
            let rows = stmt.query_map(params![repo_path.to_string_lossy(), suffix], row_to_prompt)?;
            rows.map(|r| r?).collect()
        })
    }

    /// Drafts of one repository, newest first, with prompt counts
    pub fn list_drafts(&self, repo_path: &Path) -> PersistenceResult<Vec<DraftSummary>> {
        debug!(?repo_path, "HistoryStore::list_drafts: called");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT b.suffix, b.origin_branch, b.origin_sha, b.created_at, b.retired_at,
                        (SELECT COUNT(*) FROM prompts p WHERE p.branch_suffix = b.suffix)
                 FROM branches b
                 WHERE b.repo_path = ?1
                 ORDER BY b.created_at DESC, b.rowid DESC",
            )?;
            let rows = stmt.query_map(params![repo_path.to_string_lossy()], row_to_draft_summary)?;
            rows.map(|r| r?).collect()
        })
    }

    /// Contents of the most recent prompt of a draft
    pub fn latest_prompt(&self, repo_path: &Path, suffix: &str) -> PersistenceResult<Option<String>> {
        debug!(?repo_path, %suffix, "HistoryStore::latest_prompt: called");
        self.with_conn(|conn| {
            let contents = conn
                .query_row(
                    "SELECT p.contents
                     FROM prompts p LEFT JOIN branches b ON b.suffix = p.branch_suffix
                     WHERE p.branch_suffix = ?2 AND (b.suffix IS NULL OR b.repo_path = ?1)
                     ORDER BY p.created_at DESC, p.id DESC
                     LIMIT 1",
                    params![repo_path.to_string_lossy(), suffix],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(contents)
        })
    }

    /// Actions recorded for a prompt, oldest first
    pub fn list_actions(&self, prompt_id: i64) -> PersistenceResult<Vec<(i64, Action)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, prompt_id, bot_name, walltime, outcome, commit_sha, error, turn_count,
                        request_count, token_count
                 FROM actions WHERE prompt_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![prompt_id], row_to_action)?;
            rows.map(|r| r?).collect()
        })
    }

    /// Operations of an action in execution order
    pub fn list_operations(&self, action_id: i64) -> PersistenceResult<Vec<Operation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, kind, path, size FROM operations WHERE action_id = ?1 ORDER BY seq, id",
            )?;
            let rows = stmt.query_map(params![action_id], row_to_operation)?;
            rows.map(|r| r?).collect()
        })
    }
}

fn stamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> PersistenceResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Corrupt(format!("timestamp {raw}: {e}")))
}

fn row_to_prompt(row: &Row) -> rusqlite::Result<PersistenceResult<Prompt>> {
    let id: i64 = row.get(0)?;
    let draft_suffix: String = row.get(1)?;
    let template: Option<String> = row.get(2)?;
    let contents: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(parse_time(&created_at).map(|created_at| Prompt {
        id,
        draft_suffix,
        template,
        contents,
        created_at,
    }))
}

fn row_to_draft_summary(row: &Row) -> rusqlite::Result<PersistenceResult<DraftSummary>> {
    let suffix: String = row.get(0)?;
    let origin_branch: String = row.get(1)?;
    let origin_sha: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let retired_at: Option<String> = row.get(4)?;
    let prompt_count: i64 = row.get(5)?;

    let summary = || -> PersistenceResult<DraftSummary> {
        Ok(DraftSummary {
            suffix,
            origin_branch,
            origin_sha,
            created_at: parse_time(&created_at)?,
            retired_at: retired_at.as_deref().map(parse_time).transpose()?,
            prompt_count: prompt_count.max(0) as u64,
        })
    };
    Ok(summary())
}

fn row_to_action(row: &Row) -> rusqlite::Result<PersistenceResult<(i64, Action)>> {
    let id: i64 = row.get(0)?;
    let outcome: String = row.get(4)?;
    let token_count: i64 = row.get(9)?;
    let action = Action {
        prompt_id: row.get(1)?,
        bot_name: row.get(2)?,
        walltime: row.get(3)?,
        outcome: ActionOutcome::Failure,
        commit_sha: row.get(5)?,
        error: row.get(6)?,
        turn_count: row.get(7)?,
        request_count: row.get(8)?,
        token_count: token_count.max(0) as u64,
    };
    Ok(outcome
        .parse::<ActionOutcome>()
        .map(|outcome| (id, Action { outcome, ..action }))
        .map_err(PersistenceError::Corrupt))
}

fn row_to_operation(row: &Row) -> rusqlite::Result<PersistenceResult<Operation>> {
    let seq: u32 = row.get(0)?;
    let kind: String = row.get(1)?;
    let path: String = row.get(2)?;
    let size: Option<i64> = row.get(3)?;
    Ok(kind
        .parse::<OperationKind>()
        .map(|kind| Operation {
            seq,
            kind,
            path,
            size: size.map(|s| s.max(0) as u64),
        })
        .map_err(PersistenceError::Corrupt))
}
