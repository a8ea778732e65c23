//! Accept levels and abort policy

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::vcs::MergePolicy;

/// What happens to a successful prompt commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "RawAcceptLevel")]
pub enum AcceptLevel {
    /// Leave the prompt commit checked out for review
    #[default]
    Manual,
    /// Merge with concurrent user edits, stopping on conflicts
    Merge,
    /// Merge with concurrent user edits, conflicts resolved to the bot's side
    MergeTheirs,
    /// `MergeTheirs`, then finalize and delete the draft
    Finalize,
}

impl AcceptLevel {
    pub fn level(&self) -> u8 {
        match self {
            Self::Manual => 0,
            Self::Merge => 1,
            Self::MergeTheirs => 2,
            Self::Finalize => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Merge => "merge",
            Self::MergeTheirs => "merge-theirs",
            Self::Finalize => "finalize",
        }
    }

    /// Conflict policy for levels that merge
    pub fn merge_policy(&self) -> Option<MergePolicy> {
        match self {
            Self::Manual => None,
            Self::Merge => Some(MergePolicy::Conservative),
            Self::MergeTheirs | Self::Finalize => Some(MergePolicy::PreferTheirs),
        }
    }
}

impl fmt::Display for AcceptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcceptLevel {
    type Err = String;

    /// Accepts names or numeric levels 0-3
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "manual" => Ok(Self::Manual),
            "1" | "merge" => Ok(Self::Merge),
            "2" | "merge-theirs" => Ok(Self::MergeTheirs),
            "3" | "finalize" => Ok(Self::Finalize),
            other => Err(format!(
                "unknown accept level '{other}' (expected 0-3, manual, merge, merge-theirs or finalize)"
            )),
        }
    }
}

/// Config form of an accept level: `accept: 2` or `accept: merge-theirs`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAcceptLevel {
    Number(u64),
    Name(String),
}

impl TryFrom<RawAcceptLevel> for AcceptLevel {
    type Error = String;

    fn try_from(raw: RawAcceptLevel) -> Result<Self, Self::Error> {
        match raw {
            RawAcceptLevel::Number(n) => n.to_string().parse(),
            RawAcceptLevel::Name(name) => name.parse(),
        }
    }
}

/// What happens to a failed or timed-out action's writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortPolicy {
    /// Leave them in the working tree as uncommitted changes
    #[default]
    Keep,
    /// Restore the written files to their pre-action state
    Revert,
}

impl FromStr for AbortPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "revert" => Ok(Self::Revert),
            other => Err(format!("unknown abort policy '{other}' (expected keep or revert)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_level_parse() {
        assert_eq!("0".parse::<AcceptLevel>().unwrap(), AcceptLevel::Manual);
        assert_eq!("merge".parse::<AcceptLevel>().unwrap(), AcceptLevel::Merge);
        assert_eq!("2".parse::<AcceptLevel>().unwrap(), AcceptLevel::MergeTheirs);
        assert_eq!("Finalize".parse::<AcceptLevel>().unwrap(), AcceptLevel::Finalize);
        assert!("4".parse::<AcceptLevel>().is_err());
    }

    #[test]
    fn test_accept_level_ordering_and_policy() {
        assert!(AcceptLevel::Manual < AcceptLevel::Finalize);
        assert_eq!(AcceptLevel::Manual.merge_policy(), None);
        assert_eq!(AcceptLevel::Merge.merge_policy(), Some(MergePolicy::Conservative));
        assert_eq!(AcceptLevel::Finalize.merge_policy(), Some(MergePolicy::PreferTheirs));
        assert_eq!(AcceptLevel::MergeTheirs.level(), 2);
    }

    #[test]
    fn test_serde_kebab_case() {
        let level: AcceptLevel = serde_yaml::from_str("merge-theirs").unwrap();
        assert_eq!(level, AcceptLevel::MergeTheirs);
        let policy: AbortPolicy = serde_yaml::from_str("revert").unwrap();
        assert_eq!(policy, AbortPolicy::Revert);
        assert_eq!(serde_yaml::to_string(&AcceptLevel::MergeTheirs).unwrap().trim(), "merge-theirs");
    }

    #[test]
    fn test_deserialize_numeric_level() {
        let level: AcceptLevel = serde_yaml::from_str("2").unwrap();
        assert_eq!(level, AcceptLevel::MergeTheirs);
        let level: AcceptLevel = serde_yaml::from_str("'3'").unwrap();
        assert_eq!(level, AcceptLevel::Finalize);
        assert!(serde_yaml::from_str::<AcceptLevel>("7").is_err());
        assert!(serde_yaml::from_str::<AcceptLevel>("eager").is_err());
    }
}
