//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::repl::{self, Command, CommandError, Reply};
use serde_json::{Value, json};
use soupscope_core::{Analysis, BackendChoice, SoupError, format_table, write_runlog};
use std::path::{Path, PathBuf};

/// Pairs listed per epoch in the auto report.
const AUTO_TOP_PAIRS: usize = 5;

/// Step budget of the auto report's replay.
const AUTO_REPLAY_STEPS: u32 = 100;

fn open(dir: &Path, backend: BackendChoice) -> Result<Analysis, CommandError> {
    Ok(Analysis::open(dir, backend)?)
}

fn print_json(value: &Value) -> Result<(), CommandError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::Output(format!("JSON encoding failed: {}", e)))?;
    println!("{}", text);
    Ok(())
}

/// Validate an output path: its parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, CommandError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CommandError::Output(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(CommandError::Output(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| CommandError::Output("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<PathBuf, CommandError> {
    let target = validate_output_path(path)?;
    std::fs::write(&target, bytes).map_err(|e| {
        CommandError::Analysis(SoupError::Io(format!(
            "Write {}: {}",
            target.display(),
            e
        )))
    })?;
    Ok(target)
}

// =============================================================================
// REPL COMMAND
// =============================================================================

/// Start the interactive text-command loop on stdin/stdout.
pub fn cmd_repl(dir: &Path, backend: BackendChoice, json_mode: bool) -> Result<(), CommandError> {
    let analysis = open(dir, backend)?;
    let stdin = std::io::stdin();
    repl::run(&analysis, stdin.lock(), std::io::stdout(), json_mode)
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Execute a single text command and print its reply.
pub fn cmd_run(dir: &Path, backend: BackendChoice, json_mode: bool, line: &str) -> Result<(), CommandError> {
    // parse before touching the trace
    let Some(command) = Command::parse(line)? else {
        return Err(CommandError::Malformed("empty command".to_string()));
    };
    let analysis = open(dir, backend)?;
    if let Some(text) = repl::dispatch(&analysis, command, json_mode)?.render()? {
        println!("{}", text);
    }
    Ok(())
}

// =============================================================================
// TABLE COMMAND
// =============================================================================

/// Print or write the per-epoch stats table.
pub fn cmd_table(
    dir: &Path,
    backend: BackendChoice,
    json_mode: bool,
    with_steps: bool,
    output: Option<&Path>,
) -> Result<(), CommandError> {
    let analysis = open(dir, backend)?;
    let rows = analysis.stats_table(with_steps)?;

    let text = if json_mode {
        serde_json::to_string_pretty(&rows)
            .map_err(|e| CommandError::Output(format!("JSON encoding failed: {}", e)))?
    } else {
        format_table(&rows, with_steps)
    };

    match output {
        Some(path) => {
            let target = write_file(path, text.as_bytes())?;
            tracing::info!("Wrote {} table rows to {}", rows.len(), target.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

// =============================================================================
// RUNLOG COMMAND
// =============================================================================

/// Write the run-length log of step counts.
pub fn cmd_runlog(dir: &Path, backend: BackendChoice, json_mode: bool, output: &Path) -> Result<(), CommandError> {
    let analysis = open(dir, backend)?;

    // Fully assembled first so a gap leaves no partial file behind.
    let mut bytes = Vec::new();
    let summary = write_runlog(analysis.store(), &mut bytes)?;
    let target = write_file(output, &bytes)?;

    if json_mode {
        return print_json(&json!({
            "output": target.to_string_lossy(),
            "epochs": summary.epochs,
            "bytes": summary.bytes,
            "npairs": analysis.config().npairs,
        }));
    }

    println!("Run-length log written");
    println!("======================");
    println!("Output: {}", target.display());
    println!("Epochs: 1..={}", summary.epochs);
    println!("Bytes:  {}", summary.bytes);
    Ok(())
}

// =============================================================================
// AUTO COMMAND
// =============================================================================

/// Full analysis report: stats table, top pairs of every epoch after the
/// first, lineage trace, and a replay of the busiest pair of the last epoch.
pub fn cmd_auto(dir: &Path, backend: BackendChoice, json_mode: bool) -> Result<(), CommandError> {
    let analysis = open(dir, backend)?;
    let epochs = analysis.available_epochs()?;
    let Some(&last) = epochs.last() else {
        if json_mode {
            return print_json(&json!({ "epochs": epochs }));
        }
        println!("No trace data found.");
        return Ok(());
    };

    let rows = analysis.stats_table(true)?;
    let mut top = Vec::new();
    for &epoch in epochs.iter().skip(1) {
        let command = Command::Top {
            epoch,
            k: AUTO_TOP_PAIRS,
        };
        top.push((epoch, repl::dispatch(&analysis, command, json_mode)?));
    }
    let trace = repl::dispatch(&analysis, Command::Trace, json_mode)?;

    let busiest = analysis
        .top_pairs(last, 1)?
        .and_then(|pairs| pairs.first().map(|p| p.a));
    let replay = match busiest {
        Some(tape) => {
            let command = Command::Bff {
                tape,
                epoch: last,
                max_steps: AUTO_REPLAY_STEPS,
            };
            Some((tape, repl::dispatch(&analysis, command, json_mode)?))
        }
        None => None,
    };

    if json_mode {
        let as_value = |reply: Reply| match reply {
            Reply::Json(value) => value,
            Reply::Text(text) => Value::String(text),
            Reply::Quit => Value::Null,
        };
        return print_json(&json!({
            "trace_dir": dir.to_string_lossy(),
            "epochs": epochs,
            "stats": rows,
            "top_pairs": top
                .into_iter()
                .map(|(epoch, reply)| json!({ "epoch": epoch, "pairs": as_value(reply) }))
                .collect::<Vec<_>>(),
            "lineage": as_value(trace),
            "replay": replay.map(|(tape, reply)| json!({ "tape": tape, "epoch": last, "result": as_value(reply) })),
        }));
    }

    println!("=== Soup Trace Analysis: {} ===", dir.display());
    println!("Epochs available: {:?}", epochs);
    println!();
    println!("--- Per-epoch stats ---");
    print!("{}", format_table(&rows, true));

    for (epoch, reply) in top {
        println!();
        println!("--- Top {} pairs by step count: epoch {} ---", AUTO_TOP_PAIRS, epoch);
        print_reply(&reply)?;
    }

    println!();
    println!("--- Lineage trace ---");
    print_reply(&trace)?;

    if let Some((tape, reply)) = replay {
        println!();
        println!("--- Step-by-step BFF trace: top pair in epoch {} (tape {}) ---", last, tape);
        print_reply(&reply)?;
    }
    Ok(())
}

fn print_reply(reply: &Reply) -> Result<(), CommandError> {
    if let Some(text) = reply.render()? {
        println!("{}", text);
    }
    Ok(())
}
