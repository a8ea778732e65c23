//! Domain types for git-draft
//!
//! Drafts, prompts, actions and operations. These are plain data; the
//! lifecycle engine creates them and the history store persists them.

mod draft;
mod record;

pub use draft::{BRANCH_PREFIX, Draft, HISTORY_REF_PREFIX, PUBLIC_REF_PREFIX};
pub use record::{Action, ActionOutcome, DraftSummary, Operation, OperationKind, Prompt};
