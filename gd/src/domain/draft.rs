//! Draft identity and naming

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Draft branches live under this prefix
pub const BRANCH_PREFIX: &str = "draft/";

/// One ref per successful action: `refs/drafts/<suffix>/<n>`
pub const HISTORY_REF_PREFIX: &str = "refs/drafts/";

/// Latest user-accepted state: `refs/draft-public/<suffix>`
pub const PUBLIC_REF_PREFIX: &str = "refs/draft-public/";

const SUFFIX_LEN: usize = 8;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// An isolated branch lineage forked from an origin branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub suffix: String,
    pub origin_branch: String,
    pub origin_sha: String,
    pub created_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(suffix: impl Into<String>, origin_branch: impl Into<String>, origin_sha: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            origin_branch: origin_branch.into(),
            origin_sha: origin_sha.into(),
            created_at: Utc::now(),
        }
    }

    /// Random candidate suffix, not yet checked for collisions
    pub fn random_suffix() -> String {
        let mut rng = rand::rng();
        (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect()
    }

    /// Suffix of a draft branch name, if `branch` is one
    pub fn suffix_of(branch: &str) -> Option<&str> {
        let suffix = branch.strip_prefix(BRANCH_PREFIX)?;
        let valid = suffix.len() == SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        debug!(%branch, valid, "Draft::suffix_of: called");
        valid.then_some(suffix)
    }

    pub fn branch_name(&self) -> String {
        format!("{BRANCH_PREFIX}{}", self.suffix)
    }

    pub fn public_ref(&self) -> String {
        format!("{PUBLIC_REF_PREFIX}{}", self.suffix)
    }

    /// Prefix of this draft's ref history, with trailing slash
    pub fn history_prefix(&self) -> String {
        format!("{HISTORY_REF_PREFIX}{}/", self.suffix)
    }

    pub fn history_ref(&self, n: u64) -> String {
        format!("{}{n}", self.history_prefix())
    }

    /// git config key holding a piece of this draft's origin metadata
    pub fn config_key(&self, name: &str) -> String {
        format!("branch.{}.{name}", self.branch_name())
    }
}
