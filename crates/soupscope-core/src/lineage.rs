//! # Lineage Tracer
//!
//! Follows the modal id of the latest epoch through every recorded epoch.
//!
//! For each epoch the trail reports how many cells carry the id, which tape
//! carries the most of them, and who that tape interacted with. Epochs in
//! which the id is absent stay in the trail with a zero count.

use crate::pairing::Pairing;
use crate::search::project;
use crate::session::Analysis;
use crate::stats::{SoupStats, TapeMatch, best_tape, representative_tape};
use crate::{Epoch, SoupError};
use serde::{Deserialize, Serialize};

/// Interaction partner of the best tape in one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineagePartner {
    pub pairing: Pairing,
    /// Recorded step count, if the epoch has a step record.
    pub steps: Option<u32>,
}

/// The tracked id at one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageRecord {
    pub epoch: Epoch,
    /// Cells carrying the id soup-wide.
    pub total_cells: u64,
    /// Tape with the most such cells; `None` when the id is absent.
    pub best: Option<TapeMatch>,
    pub projection: Option<String>,
    pub partner: Option<LineagePartner>,
}

/// Trail of the latest epoch's modal id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageTrace {
    pub modal_id: u32,
    pub modal_count: u64,
    pub final_epoch: Epoch,
    pub records: Vec<LineageRecord>,
}

/// Stats of one epoch plus its representative tape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageSummary {
    pub stats: SoupStats,
    pub representative: Option<TapeMatch>,
    pub projection: Option<String>,
}

/// Trace the modal id of the latest available epoch across all epochs, in
/// ascending order. `None` when the trace directory has no soup snapshot.
pub fn trace_dominant_lineage(analysis: &Analysis) -> Result<Option<LineageTrace>, SoupError> {
    let epochs = analysis.available_epochs()?;
    let Some(&final_epoch) = epochs.last() else {
        return Ok(None);
    };
    let Some(final_stats) = analysis.compute_stats(final_epoch)? else {
        return Ok(None);
    };
    let modal_id = final_stats.modal_id;

    let mut records = Vec::with_capacity(epochs.len());
    for epoch in epochs {
        let Some(soup) = analysis.store().load_soup(epoch)? else {
            continue;
        };

        let per_tape = analysis.backend().id_cells_per_tape(&soup, modal_id);
        let total_cells: u64 = per_tape.iter().map(|&n| u64::from(n)).sum();
        let best = best_tape(&per_tape);

        let (projection, partner) = match best {
            Some(m) => {
                let projection = soup.tape(m.tape).map(project);
                (projection, partner_of(analysis, m, epoch)?)
            }
            None => (None, None),
        };

        records.push(LineageRecord {
            epoch,
            total_cells,
            best,
            projection,
            partner,
        });
    }

    tracing::debug!("Traced id {} across {} epochs", modal_id, records.len());

    Ok(Some(LineageTrace {
        modal_id,
        modal_count: final_stats.modal_count,
        final_epoch,
        records,
    }))
}

fn partner_of(
    analysis: &Analysis,
    best: TapeMatch,
    epoch: Epoch,
) -> Result<Option<LineagePartner>, SoupError> {
    let Some(pairing) = analysis.locate(best.tape, epoch)? else {
        return Ok(None);
    };
    let steps = analysis
        .store()
        .load_steps(epoch)?
        .and_then(|s| s.get(pairing.pair_index));
    Ok(Some(LineagePartner { pairing, steps }))
}

/// Stats of one epoch together with the tape carrying the most modal-id
/// cells.
pub fn lineage_summary(analysis: &Analysis, epoch: Epoch) -> Result<Option<LineageSummary>, SoupError> {
    let Some(soup) = analysis.store().load_soup(epoch)? else {
        return Ok(None);
    };
    let Some(stats) = analysis.compute_stats(epoch)? else {
        return Ok(None);
    };

    let representative = representative_tape(analysis.backend(), &soup, stats.modal_id);
    let projection = representative.and_then(|m| soup.tape(m.tape)).map(project);

    Ok(Some(LineageSummary {
        stats,
        representative,
        projection,
    }))
}
