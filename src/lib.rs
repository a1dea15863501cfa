//! A small shell that can run independent commands of a script at the
//! same time.
//!
//! A script is split into top-level command trees. Two trees conflict when
//! one writes a file the other reads or writes; conflicting trees run in
//! input order and everything else runs concurrently.

pub mod shell;
pub mod utils;

pub use shell::parser::ast::Command;
pub use shell::parser::stream::{CommandStream, EntryState, StreamEntry};
pub use shell::{parse_stream, parse_str, Error, Executor, Result, Scheduler};
