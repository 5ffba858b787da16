//! # soupscope
//!
//! Command-line layer over `soupscope-core`: the clap CLI and the
//! interactive text-command loop. Exposed as a library so both can be
//! exercised from `tests/`.

pub mod cli;
pub mod repl;
