//! Tools offered to bots
//!
//! Tools act on the live working tree of the repository. Each action gets a
//! `ToolContext` scoped to the repository root; tools cannot escape it or
//! touch the git directory.

mod context;
mod error;
mod executor;
mod traits;

pub mod builtin;

pub use context::ToolContext;
pub use error::ToolError;
pub use executor::ToolExecutor;
pub use traits::{Tool, ToolResult, Touched};
