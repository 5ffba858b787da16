//! # Stats Table
//!
//! One row per epoch, tab separated, fields left-aligned to fixed widths.
//!
//! ```text
//! epoch  mean_ops  median_ops  [mean_steps  max_steps]  unique_ids  modal_id  |repr| (modal_count)
//! ```
//!
//! The bracketed columns are present in the step variant only. Readers
//! tell the variants apart by column count: eight or more columns means
//! the step variant.

use crate::lineage::LineageSummary;
use crate::stats::StepSummary;
use crate::Epoch;
use serde::{Deserialize, Serialize};

/// Column count at which a row is read as the step variant.
const STEP_VARIANT_COLUMNS: usize = 8;

/// One epoch of the stats table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub epoch: Epoch,
    pub mean_ops: f64,
    pub median_ops: f64,
    /// Present in the step variant.
    pub steps: Option<StepSummary>,
    pub unique_ids: u64,
    pub modal_id: u32,
    /// Projection of the representative tape.
    pub representative: String,
    pub modal_count: u64,
}

impl StatsRow {
    /// Build a row from an epoch's lineage summary.
    #[must_use]
    pub fn from_summary(summary: &LineageSummary, steps: Option<StepSummary>) -> Self {
        Self {
            epoch: summary.stats.epoch,
            mean_ops: summary.stats.mean_ops,
            median_ops: summary.stats.median_ops,
            steps,
            unique_ids: summary.stats.unique_ids as u64,
            modal_id: summary.stats.modal_id,
            representative: summary.projection.clone().unwrap_or_default(),
            modal_count: summary.stats.modal_count,
        }
    }

    /// Render the row. With `with_steps`, a row without a step summary
    /// writes zeros so every line of the table has the same columns.
    #[must_use]
    pub fn format_row(&self, with_steps: bool) -> String {
        let mut line = format!(
            "{:<10}\t{:<12.4}\t{:<12.1}\t",
            self.epoch, self.mean_ops, self.median_ops
        );
        if with_steps {
            let steps = self.steps.unwrap_or(StepSummary {
                mean_steps: 0.0,
                max_steps: 0,
            });
            line.push_str(&format!("{:<12.4}\t{:<10}\t", steps.mean_steps, steps.max_steps));
        }
        line.push_str(&format!(
            "{:<12}\t{:<10}\t|{}| ({})",
            self.unique_ids, self.modal_id, self.representative, self.modal_count
        ));
        line
    }
}

/// The header line.
#[must_use]
pub fn format_header(with_steps: bool) -> String {
    let mut line = format!("{:<10}\t{:<12}\t{:<12}\t", "epoch", "mean_ops", "median_ops");
    if with_steps {
        line.push_str(&format!("{:<12}\t{:<10}\t", "mean_steps", "max_steps"));
    }
    line.push_str(&format!(
        "{:<12}\t{:<10}\t{}",
        "unique_ids", "modal_id", "representative_tape (modal_count)"
    ));
    line
}

/// Header plus one line per row, newline terminated.
#[must_use]
pub fn format_table(rows: &[StatsRow], with_steps: bool) -> String {
    let mut out = format_header(with_steps);
    out.push('\n');
    for row in rows {
        out.push_str(&row.format_row(with_steps));
        out.push('\n');
    }
    out
}

// =============================================================================
// PARSING
// =============================================================================

/// Rows read back from a table, and how many data lines were rejected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedTable {
    pub rows: Vec<StatsRow>,
    /// Lines that start with a digit but do not parse.
    pub skipped: usize,
}

/// Read a stats table in either variant. Blank lines and lines that do not
/// start with a digit (headers, log noise) are ignored; malformed data
/// lines are skipped and counted.
#[must_use]
pub fn parse_table(text: &str) -> ParsedTable {
    let mut table = ParsedTable::default();
    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        match parse_row(line) {
            Some(row) => table.rows.push(row),
            None => {
                tracing::debug!("Skipping malformed stats line: {:?}", line);
                table.skipped += 1;
            }
        }
    }
    table
}

fn parse_row(line: &str) -> Option<StatsRow> {
    let parts: Vec<&str> = line.split('\t').map(str::trim).collect();
    let with_steps = parts.len() >= STEP_VARIANT_COLUMNS;
    let (steps, rest) = if with_steps {
        let steps = StepSummary {
            mean_steps: parts.get(3)?.parse().ok()?,
            max_steps: parts.get(4)?.parse().ok()?,
        };
        (Some(steps), parts.get(5..)?)
    } else {
        (None, parts.get(3..)?)
    };

    let last = rest.get(2)?;
    let (representative, modal_count) = split_representative(last);

    Some(StatsRow {
        epoch: parts.first()?.parse().ok()?,
        mean_ops: parts.get(1)?.parse().ok()?,
        median_ops: parts.get(2)?.parse().ok()?,
        steps,
        unique_ids: rest.first()?.parse().ok()?,
        modal_id: rest.get(1)?.parse().ok()?,
        representative,
        modal_count,
    })
}

/// Split `|repr| (N)` into the projection and `N`. A missing or
/// non-numeric count reads as 0.
fn split_representative(field: &str) -> (String, u64) {
    let field = field.trim_end();
    let count = field
        .strip_suffix(')')
        .and_then(|head| head.rfind('(').map(|open| (open, &head[open + 1..])))
        .filter(|(_, digits)| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));

    match count {
        Some((open, digits)) => (
            strip_bars(&field[..open]),
            digits.parse().unwrap_or(0),
        ),
        None => (strip_bars(field), 0),
    }
}

fn strip_bars(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('|')
        .and_then(|inner| inner.strip_suffix('|'))
        .unwrap_or(s)
        .to_string()
}
