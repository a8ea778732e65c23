//! Built-in tools offered to every bot

mod read_file;
mod write_file;

pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;
