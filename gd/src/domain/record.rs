//! Prompt, action and operation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user instruction submitted to a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: i64,
    pub draft_suffix: String,
    pub template: Option<String>,
    pub contents: String,
    pub created_at: DateTime<Utc>,
}

/// How a bot action ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    Success,
    Failure,
    Timeout,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "timeout" => Ok(Self::Timeout),
            other => Err(format!("unknown action outcome: {other}")),
        }
    }
}

/// One execution of a bot against a prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub prompt_id: i64,
    pub bot_name: String,
    /// Wall-clock duration in seconds
    pub walltime: f64,
    pub outcome: ActionOutcome,
    /// Prompt commit, present only for successful actions
    pub commit_sha: Option<String>,
    pub error: Option<String>,
    pub turn_count: u32,
    /// Model requests made; zero for bots without a model
    pub request_count: u32,
    /// Input plus output tokens over those requests
    pub token_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Write,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(format!("unknown operation kind: {other}")),
        }
    }
}

/// A single tool call executed during an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Position within the action, from 0
    pub seq: u32,
    pub kind: OperationKind,
    pub path: String,
    /// Bytes read or written; `None` for a read of a missing file
    pub size: Option<u64>,
}

/// A row of `git-draft drafts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSummary {
    pub suffix: String,
    pub origin_branch: String,
    pub origin_sha: String,
    pub created_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
    pub prompt_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_strings() {
        for outcome in [ActionOutcome::Success, ActionOutcome::Failure, ActionOutcome::Timeout] {
            assert_eq!(outcome.as_str().parse::<ActionOutcome>().unwrap(), outcome);
        }
        assert!("cancelled".parse::<ActionOutcome>().is_err());
    }

    #[test]
    fn test_operation_serializes_lowercase_kind() {
        let op = Operation {
            seq: 0,
            kind: OperationKind::Write,
            path: "src/lib.rs".to_string(),
            size: Some(12),
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"write\""));
    }
}
