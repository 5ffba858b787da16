//! # Text Commands
//!
//! The command language of the interactive loop, parsed into typed
//! variants. Parsing never touches the trace; a line that cannot be
//! understood is a [`CommandError::Malformed`], kept apart from errors the
//! analysis itself reports.

use soupscope_core::primitives::{DEFAULT_REPLAY_STEPS, DEFAULT_TOP_PAIRS};
use soupscope_core::{Epoch, SoupError, TapeIndex};
use std::str::FromStr;
use thiserror::Error;

/// Command-layer errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The text command could not be parsed.
    #[error("{0}")]
    Malformed(String),

    /// The analysis engine reported an error.
    #[error(transparent)]
    Analysis(#[from] SoupError),

    /// A result could not be encoded or written.
    #[error("Output error: {0}")]
    Output(String),
}

/// One parsed text command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Epochs,
    /// Stats for one epoch, or every epoch.
    Stats(Option<Epoch>),
    Tape {
        tape: TapeIndex,
        epoch: Option<Epoch>,
    },
    Top {
        epoch: Epoch,
        k: usize,
    },
    Pair {
        tape: TapeIndex,
        epoch: Epoch,
    },
    Lineage(Option<Epoch>),
    Trace,
    Bff {
        tape: TapeIndex,
        epoch: Epoch,
        max_steps: u32,
    },
    Check {
        epoch: Epoch,
        pair: usize,
    },
    Search {
        pattern: String,
        epoch: Option<Epoch>,
    },
    Quit,
}

/// Help text listing every command.
pub const HELP: &str = "\
Commands:
  help                  Show this help
  epochs                List available epochs in trace
  stats [E]             Per-epoch stats for epoch E (or all)
  tape N [E]            Show tape N at epoch E (default: last)
  top E [K]             Top K pairs by step count in epoch E (default 10)
  pair N E              Show pair containing tape N in epoch E + before/after
  lineage [E]           Dominant token id analysis at epoch E (default: last)
  trace                 Follow the dominant id through every epoch
  bff N E [STEPS]       Step-by-step replay of tape N's epoch-E interaction
  check E P             Replay pair P of epoch E and compare step counts
  search PAT [E]        Find tapes whose instructions contain PAT at epoch E
  quit / exit           Exit";

impl Command {
    /// Parse one input line. A blank line is `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();
        let mut args = Args::new(&args);

        let command = match verb.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            "epochs" => Command::Epochs,
            "stats" => Command::Stats(args.optional("epoch")?),
            "tape" => Command::Tape {
                tape: args.required("tape", "tape N [E]")?,
                epoch: args.optional("epoch")?,
            },
            "top" => Command::Top {
                epoch: args.required("epoch", "top E [K]")?,
                k: args.optional("k")?.unwrap_or(DEFAULT_TOP_PAIRS),
            },
            "pair" => Command::Pair {
                tape: args.required("tape", "pair N E")?,
                epoch: args.required("epoch", "pair N E")?,
            },
            "lineage" => Command::Lineage(args.optional("epoch")?),
            "trace" => Command::Trace,
            "bff" => Command::Bff {
                tape: args.required("tape", "bff N E [STEPS]")?,
                epoch: args.required("epoch", "bff N E [STEPS]")?,
                max_steps: args.optional("steps")?.unwrap_or(DEFAULT_REPLAY_STEPS),
            },
            "check" => Command::Check {
                epoch: args.required("epoch", "check E P")?,
                pair: args.required("pair", "check E P")?,
            },
            "search" => Command::Search {
                pattern: args.required("pattern", "search PAT [E]")?,
                epoch: args.optional("epoch")?,
            },
            other => {
                return Err(CommandError::Malformed(format!(
                    "Unknown command: {}  (type 'help')",
                    other
                )));
            }
        };
        Ok(Some(command))
    }
}

/// Positional argument cursor. Surplus arguments are ignored.
struct Args<'a> {
    words: std::slice::Iter<'a, &'a str>,
}

impl<'a> Args<'a> {
    fn new(words: &'a [&'a str]) -> Self {
        Self { words: words.iter() }
    }

    fn required<T: FromStr>(&mut self, name: &str, usage: &str) -> Result<T, CommandError> {
        match self.words.next() {
            Some(word) => parse_word(name, word),
            None => Err(CommandError::Malformed(format!(
                "missing {}; usage: {}",
                name, usage
            ))),
        }
    }

    fn optional<T: FromStr>(&mut self, name: &str) -> Result<Option<T>, CommandError> {
        self.words.next().map(|word| parse_word(name, word)).transpose()
    }
}

fn parse_word<T: FromStr>(name: &str, word: &str) -> Result<T, CommandError> {
    word.parse()
        .map_err(|_| CommandError::Malformed(format!("invalid {}: '{}'", name, word)))
}
