//! Durable record of drafts, prompts, actions and operations
//!
//! Append-only SQLite database shared by every repository the user drafts
//! in. Rows are keyed by repository path so listings stay per-repository.

mod store;

pub use store::{HistoryStore, PersistenceError, PersistenceResult};
