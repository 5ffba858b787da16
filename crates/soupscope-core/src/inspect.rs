//! # Inspection Views
//!
//! Serializable result types for looking at single tapes and pairs.
//! Built by [`crate::Analysis`]; consumed by the text and JSON renderers.

use crate::pairing::Pairing;
use crate::primitives::TOP_IDS_PER_TAPE;
use crate::search::project;
use crate::store::Soup;
use crate::vm::{Halt, Replay};
use crate::{Epoch, TapeIndex, Token};
use serde::{Deserialize, Serialize};

// =============================================================================
// TAPE VIEW
// =============================================================================

/// One cell of a tape, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    pub index: usize,
    pub ch: u8,
    pub id: u32,
    pub birth_epoch: u16,
    pub is_op: bool,
}

impl CellView {
    fn new(index: usize, token: Token) -> Self {
        Self {
            index,
            ch: token.ch(),
            id: token.id(),
            birth_epoch: token.birth_epoch(),
            is_op: token.is_op(),
        }
    }
}

/// An id and how many cells of a tape hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCount {
    pub id: u32,
    pub count: u32,
}

/// Everything shown for one tape at one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeView {
    pub epoch: Epoch,
    pub tape: TapeIndex,
    pub projection: String,
    pub op_count: usize,
    pub cells: Vec<CellView>,
    /// Most frequent ids, ties in order of first occurrence.
    pub top_ids: Vec<IdCount>,
}

impl TapeView {
    pub(crate) fn build(epoch: Epoch, tape: TapeIndex, cells: &[Token]) -> Self {
        Self {
            epoch,
            tape,
            projection: project(cells),
            op_count: cells.iter().filter(|t| t.is_op()).count(),
            cells: cells
                .iter()
                .enumerate()
                .map(|(i, &t)| CellView::new(i, t))
                .collect(),
            top_ids: top_ids(cells, TOP_IDS_PER_TAPE),
        }
    }
}

/// The `limit` most frequent ids of a tape.
fn top_ids(cells: &[Token], limit: usize) -> Vec<IdCount> {
    let mut counts: Vec<IdCount> = Vec::new();
    for token in cells {
        match counts.iter_mut().find(|c| c.id == token.id()) {
            Some(entry) => entry.count += 1,
            None => counts.push(IdCount {
                id: token.id(),
                count: 1,
            }),
        }
    }
    // stable: equal counts keep first-occurrence order
    counts.sort_by(|x, y| y.count.cmp(&x.count));
    counts.truncate(limit);
    counts
}

// =============================================================================
// PAIR VIEWS
// =============================================================================

/// Projections of one participant before and after the interaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TapeSides {
    /// From the previous epoch's soup, if recorded.
    pub before: Option<String>,
    /// From this epoch's soup, if recorded.
    pub after: Option<String>,
}

impl TapeSides {
    pub(crate) fn of(tape: TapeIndex, before: Option<&Soup>, after: Option<&Soup>) -> Self {
        let view = |soup: Option<&Soup>| soup.and_then(|s| s.tape(tape)).map(project);
        Self {
            before: view(before),
            after: view(after),
        }
    }
}

/// The pair a tape belonged to, with both participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairView {
    pub epoch: Epoch,
    /// The tape that was looked up.
    pub tape: TapeIndex,
    pub pairing: Pairing,
    pub a: TapeIndex,
    pub b: TapeIndex,
    pub steps: Option<u32>,
    pub a_sides: TapeSides,
    pub b_sides: TapeSides,
}

/// One row of a top-pairs listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSummary {
    pub pair_index: usize,
    pub a: TapeIndex,
    pub b: TapeIndex,
    pub steps: u32,
    pub a_sides: TapeSides,
    pub b_sides: TapeSides,
}

/// Pair indices ordered by step count descending, ties by ascending index.
pub(crate) fn rank_pairs(counts: &[u32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&x, &y| counts[y].cmp(&counts[x]).then(x.cmp(&y)));
    order.truncate(k);
    order
}

// =============================================================================
// REPLAY VIEWS
// =============================================================================

/// A recorded interaction replayed from the previous epoch's soup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairReplay {
    pub epoch: Epoch,
    pub tape: TapeIndex,
    pub pairing: Pairing,
    pub a: TapeIndex,
    pub b: TapeIndex,
    pub recorded_steps: Option<u32>,
    pub a_before: String,
    pub b_before: String,
    pub replay: Replay,
}

impl PairReplay {
    /// Projections of the final halves.
    #[must_use]
    pub fn final_projections(&self) -> (String, String) {
        (project(&self.replay.a), project(&self.replay.b))
    }
}

/// Replayed step count compared with the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCheck {
    pub epoch: Epoch,
    pub pair_index: usize,
    pub recorded: u32,
    pub replayed: u32,
    pub halt: Halt,
    pub matches: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_ids_keep_first_occurrence_on_ties() {
        let cells: Vec<Token> = [3, 8, 8, 3, 5, 1, 1]
            .iter()
            .map(|&id| Token::new(0, id, 0))
            .collect();
        let top = top_ids(&cells, 4);

        assert_eq!(
            top,
            vec![
                IdCount { id: 3, count: 2 },
                IdCount { id: 8, count: 2 },
                IdCount { id: 1, count: 2 },
                IdCount { id: 5, count: 1 },
            ]
        );
    }

    #[test]
    fn tape_view_fields() {
        let cells = vec![Token::new(b'[', 1, 4), Token::new(0x41, 2, 0)];
        let view = TapeView::build(3, 9, &cells);

        assert_eq!(view.projection, "[.");
        assert_eq!(view.op_count, 1);
        assert_eq!(view.cells[1].ch, 0x41);
        assert_eq!(view.cells[0].birth_epoch, 4);
        assert!(view.cells[0].is_op);
    }

    #[test]
    fn ranking_breaks_ties_by_index() {
        assert_eq!(rank_pairs(&[5, 9, 5, 9, 1], 3), vec![1, 3, 0]);
        assert_eq!(rank_pairs(&[2, 1], 10), vec![0, 1]);
        assert!(rank_pairs(&[], 3).is_empty());
    }

    #[test]
    fn sides_without_snapshots() {
        let sides = TapeSides::of(0, None, None);
        assert_eq!(sides, TapeSides::default());
    }
}
