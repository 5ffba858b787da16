//! # Text Command Loop
//!
//! Interactive exploration of one trace directory. Every [`Command`]
//! variant maps to exactly one handler; a handler returns a [`Reply`]
//! rendered as plain text, or as JSON under `--json-mode`.
//!
//! Analysis results that are simply not present in the trace (an epoch
//! that was never written, a tape that was not paired) are replies, not
//! errors.

pub mod command;
mod render;

pub use command::{Command, CommandError, HELP};

use serde::Serialize;
use serde_json::{Value, json};
use soupscope_core::{Analysis, Epoch, TapeIndex};
use std::io::{BufRead, Write};

/// Prompt printed before each input line.
pub const PROMPT: &str = "soup> ";

/// Outcome of one handled command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Json(Value),
    Quit,
}

impl Reply {
    /// Printable form. `None` for [`Reply::Quit`].
    pub fn render(&self) -> Result<Option<String>, CommandError> {
        match self {
            Reply::Text(text) => Ok(Some(text.clone())),
            Reply::Json(value) => serde_json::to_string_pretty(value)
                .map(Some)
                .map_err(|e| CommandError::Output(format!("JSON encoding failed: {}", e))),
            Reply::Quit => Ok(None),
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Run one parsed command against an analysis session.
pub fn dispatch(analysis: &Analysis, command: Command, json_mode: bool) -> Result<Reply, CommandError> {
    let ctx = Context {
        analysis,
        json_mode,
    };
    match command {
        Command::Help => Ok(Reply::Text(HELP.to_string())),
        Command::Quit => Ok(Reply::Quit),
        Command::Epochs => ctx.epochs(),
        Command::Stats(epoch) => ctx.stats(epoch),
        Command::Tape { tape, epoch } => ctx.tape(tape, epoch),
        Command::Top { epoch, k } => ctx.top(epoch, k),
        Command::Pair { tape, epoch } => ctx.pair(tape, epoch),
        Command::Lineage(epoch) => ctx.lineage(epoch),
        Command::Trace => ctx.trace(),
        Command::Bff {
            tape,
            epoch,
            max_steps,
        } => ctx.bff(tape, epoch, max_steps),
        Command::Check { epoch, pair } => ctx.check(epoch, pair),
        Command::Search { pattern, epoch } => ctx.search(&pattern, epoch),
    }
}

/// Parse and run one line. A blank line yields `Ok(None)`.
pub fn execute_line(analysis: &Analysis, line: &str, json_mode: bool) -> Result<Option<Reply>, CommandError> {
    Command::parse(line)?
        .map(|command| dispatch(analysis, command, json_mode))
        .transpose()
}

struct Context<'a> {
    analysis: &'a Analysis,
    json_mode: bool,
}

impl Context<'_> {
    fn respond<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> Result<Reply, CommandError> {
        if self.json_mode {
            serde_json::to_value(value)
                .map(Reply::Json)
                .map_err(|e| CommandError::Output(format!("JSON encoding failed: {}", e)))
        } else {
            Ok(Reply::Text(text(value)))
        }
    }

    fn unavailable(&self, message: String) -> Reply {
        if self.json_mode {
            Reply::Json(json!({ "available": false, "message": message }))
        } else {
            Reply::Text(format!("  {}", message))
        }
    }

    /// An explicit epoch, or the latest one in the trace.
    fn resolve(&self, epoch: Option<Epoch>) -> Result<Option<Epoch>, CommandError> {
        match epoch {
            Some(epoch) => Ok(Some(epoch)),
            None => Ok(self.analysis.latest_epoch()?),
        }
    }

    fn epochs(&self) -> Result<Reply, CommandError> {
        let epochs = self.analysis.available_epochs()?;
        if self.json_mode {
            return Ok(Reply::Json(json!({ "epochs": epochs })));
        }
        Ok(Reply::Text(render::epochs(&epochs)))
    }

    fn stats(&self, epoch: Option<Epoch>) -> Result<Reply, CommandError> {
        let epochs = match epoch {
            Some(epoch) => vec![epoch],
            None => self.analysis.available_epochs()?,
        };
        let mut summaries = Vec::with_capacity(epochs.len());
        for epoch in epochs {
            match self.analysis.lineage_summary(epoch)? {
                Some(summary) => summaries.push(summary),
                None => return Ok(self.unavailable(format!("No soup snapshot for epoch {}", epoch))),
            }
        }
        self.respond(&summaries, |all| {
            all.iter()
                .map(render::lineage)
                .collect::<Vec<_>>()
                .join("\n\n")
        })
    }

    fn tape(&self, tape: TapeIndex, epoch: Option<Epoch>) -> Result<Reply, CommandError> {
        let Some(epoch) = self.resolve(epoch)? else {
            return Ok(self.unavailable("No epochs available".to_string()));
        };
        match self.analysis.tape_view(tape, epoch)? {
            Some(view) => self.respond(&view, render::tape),
            None => Ok(self.unavailable(format!("No soup snapshot for epoch {}", epoch))),
        }
    }

    fn top(&self, epoch: Epoch, k: usize) -> Result<Reply, CommandError> {
        match self.analysis.top_pairs(epoch, k)? {
            Some(pairs) => self.respond(&pairs, |p| render::top_pairs(epoch, p)),
            None => Ok(self.unavailable(format!("No data for epoch {}", epoch))),
        }
    }

    fn pair(&self, tape: TapeIndex, epoch: Epoch) -> Result<Reply, CommandError> {
        if self.analysis.pair_index(epoch)?.is_none() {
            return Ok(self.unavailable(format!("No pairing data for epoch {}", epoch)));
        }
        match self.analysis.pair_view(tape, epoch)? {
            Some(view) => self.respond(&view, render::pair),
            None => Ok(self.unavailable(format!(
                "Tape {} not found in epoch {} pairing",
                tape, epoch
            ))),
        }
    }

    fn lineage(&self, epoch: Option<Epoch>) -> Result<Reply, CommandError> {
        let Some(epoch) = self.resolve(epoch)? else {
            return Ok(self.unavailable("No epochs available".to_string()));
        };
        match self.analysis.lineage_summary(epoch)? {
            Some(summary) => self.respond(&summary, render::lineage),
            None => Ok(self.unavailable(format!("No soup snapshot for epoch {}", epoch))),
        }
    }

    fn trace(&self) -> Result<Reply, CommandError> {
        match self.analysis.trace_dominant_lineage()? {
            Some(trace) => self.respond(&trace, render::trace),
            None => Ok(self.unavailable("No epochs available".to_string())),
        }
    }

    fn bff(&self, tape: TapeIndex, epoch: Epoch, max_steps: u32) -> Result<Reply, CommandError> {
        match self.analysis.replay_pair(tape, epoch, max_steps)? {
            Some(result) => self.respond(&result, render::replay),
            None => Ok(self.unavailable(format!(
                "Cannot replay tape {} at epoch {}: needs its pairing and the epoch {} soup",
                tape,
                epoch,
                epoch.saturating_sub(1)
            ))),
        }
    }

    fn check(&self, epoch: Epoch, pair: usize) -> Result<Reply, CommandError> {
        match self.analysis.check_recorded_steps(epoch, pair)? {
            Some(check) => self.respond(&check, render::check),
            None => Ok(self.unavailable(format!(
                "Cannot check pair {} at epoch {}: missing pairing, step record or epoch {} soup",
                pair,
                epoch,
                epoch.saturating_sub(1)
            ))),
        }
    }

    fn search(&self, pattern: &str, epoch: Option<Epoch>) -> Result<Reply, CommandError> {
        let Some(epoch) = self.resolve(epoch)? else {
            return Ok(self.unavailable("No epochs available".to_string()));
        };
        match self.analysis.find_matching(pattern, epoch)? {
            Some(matches) => self.respond(&matches, |m| render::search(pattern, epoch, m)),
            None => Ok(self.unavailable(format!("No soup snapshot for epoch {}", epoch))),
        }
    }
}

// =============================================================================
// LOOP
// =============================================================================

fn output_error(e: std::io::Error) -> CommandError {
    CommandError::Output(e.to_string())
}

/// Read commands from `input` until end of input or `quit`. A failing
/// command prints its error and the loop continues.
pub fn run<R: BufRead, W: Write>(
    analysis: &Analysis,
    mut input: R,
    mut output: W,
    json_mode: bool,
) -> Result<(), CommandError> {
    writeln!(output, "Trace directory: {}", analysis.store().dir().display()).map_err(output_error)?;
    writeln!(
        output,
        "Available epochs: {:?}",
        analysis.available_epochs()?
    )
    .map_err(output_error)?;
    writeln!(output, "Type 'help' for commands.").map_err(output_error)?;

    let mut raw = Vec::new();
    loop {
        write!(output, "{}", PROMPT).map_err(output_error)?;
        output.flush().map_err(output_error)?;

        raw.clear();
        if input.read_until(b'\n', &mut raw).map_err(output_error)? == 0 {
            writeln!(output).map_err(output_error)?;
            break;
        }
        // invalid UTF-8 becomes U+FFFD and fails to parse like any other typo
        let line = String::from_utf8_lossy(&raw);

        let reply = match execute_line(analysis, &line, json_mode) {
            Ok(Some(reply)) => reply.render(),
            Ok(None) => continue,
            Err(e) => Err(e),
        };
        match reply {
            Ok(Some(text)) => writeln!(output, "{}", text).map_err(output_error)?,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Command failed: {}", e);
                writeln!(output, "  Error: {}", e).map_err(output_error)?;
            }
        }
    }
    Ok(())
}
