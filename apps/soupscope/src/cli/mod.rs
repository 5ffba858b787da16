//! # Soupscope CLI Module
//!
//! This module implements the CLI interface for soupscope.
//!
//! ## Available Commands
//!
//! - `repl` - Interactive text-command loop (default)
//! - `auto` - Full analysis report
//! - `table` - Per-epoch stats table
//! - `runlog` - Flat run-length log of step counts
//! - `run` - Execute a single text command

mod commands;

use crate::repl::CommandError;
use clap::{Parser, Subcommand};
use soupscope_core::BackendChoice;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Soupscope - BFF primordial soup trace explorer
///
/// Reads the per-epoch snapshots written by a soup simulation and replays,
/// summarises and searches them. Never writes to the trace directory.
#[derive(Parser, Debug)]
#[command(name = "soupscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress the startup banner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Trace directory written by the simulation
    #[arg(short = 'd', long, global = true, default_value = "trace")]
    pub trace_dir: PathBuf,

    /// Scan backend: "auto", "scalar" or "parallel"
    #[arg(short = 'B', long, global = true, default_value = "auto")]
    pub backend: BackendChoice,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive text-command loop
    Repl,

    /// Stats table, top pairs, lineage trace and a replay of the busiest pair
    Auto,

    /// Per-epoch stats table
    Table {
        /// Add mean and max step columns
        #[arg(long)]
        with_steps: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Concatenate step records of epochs 1..=last into one file
    Runlog {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Execute one text command, e.g. `run top 5 3`
    Run {
        /// The command and its arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), CommandError> {
    let json_mode = cli.json_mode;
    let dir = cli.trace_dir.as_path();

    match cli.command {
        Some(Commands::Repl) | None => cmd_repl(dir, cli.backend, json_mode),
        Some(Commands::Auto) => cmd_auto(dir, cli.backend, json_mode),
        Some(Commands::Table { with_steps, output }) => {
            cmd_table(dir, cli.backend, json_mode, with_steps, output.as_deref())
        }
        Some(Commands::Runlog { output }) => cmd_runlog(dir, cli.backend, json_mode, &output),
        Some(Commands::Run { command }) => cmd_run(dir, cli.backend, json_mode, &command.join(" ")),
    }
}
