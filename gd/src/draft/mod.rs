//! Draft lifecycle engine
//!
//! A draft moves `ABSENT → ACTIVE → {MERGING} → RETIRED`. The `Drafter`
//! creates and resolves drafts, commits the user's work (sync commits) and
//! the bot's work (prompt commits), applies the accept policy and carries the
//! result back to the origin branch.
//!
//! Git is the source of truth; every durable step is mirrored into the
//! history store on a best-effort basis.

mod accept;
mod engine;
mod error;
mod finish;
mod generate;
mod lock;
mod policy;

pub use accept::AcceptResult;
pub use engine::Drafter;
pub use error::DraftError;
pub use finish::FinalizeResult;
pub use generate::{GenerateRequest, GenerateResult};
pub use lock::{DraftLock, LOCK_FILE};
pub use policy::{AbortPolicy, AcceptLevel};

/// Trailer key marking the commits git-draft creates
pub const KIND_TRAILER: &str = "Draft-Kind";

pub(crate) const SYNC_MESSAGE: &str = "draft! sync\n\nDraft-Kind: sync";

pub(crate) const MERGE_MESSAGE: &str = "draft! merge\n\nDraft-Kind: merge";

/// True if `message` carries the trailer for `kind`
pub fn has_kind(message: &str, kind: &str) -> bool {
    message
        .lines()
        .filter_map(|l| l.strip_prefix(KIND_TRAILER))
        .filter_map(|rest| rest.strip_prefix(':'))
        .any(|value| value.trim() == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_kind() {
        assert!(has_kind(SYNC_MESSAGE, "sync"));
        assert!(!has_kind(SYNC_MESSAGE, "prompt"));
        assert!(has_kind("Add x\n\nadd x\n\nDraft-Kind: prompt\nDraft-Bot: fixture", "prompt"));
        assert!(!has_kind("draft! sync", "sync"));
    }
}
