//! # Formats
//!
//! Derived text and binary outputs consumed by external plotting tools.
//!
//! - `table`: per-epoch stats table, tab separated
//! - `runlog`: flat per-epoch step counts

pub mod runlog;
pub mod table;

pub use runlog::{RunlogSummary, read_runlog, write_runlog};
pub use table::{ParsedTable, StatsRow, format_header, format_table, parse_table};
