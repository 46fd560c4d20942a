//! Local file operations for a sync run.
//!
//! Selects the files of a source directory by name pattern and removes
//! local files once their remote copy has been verified.

mod delete;
mod select;

pub use delete::{remove_if_exists, remove_local_file};
pub use select::{SelectError, compile_pattern, select_files};
