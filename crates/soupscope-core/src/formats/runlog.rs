//! # Run-Length Log
//!
//! Flat concatenation of per-epoch step counts: `npairs` native-endian
//! `u32` values per epoch, epochs 1, 2, 3, ... in order, no header. The
//! epoch of a record is implied by its position.

use crate::store::{RecordKind, SnapshotStore, StepCounts};
use crate::{Epoch, SoupError};
use std::io::Write;

/// What a run-length log write produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunlogSummary {
    /// Number of epochs written (epochs `1..=epochs`).
    pub epochs: Epoch,
    pub bytes: usize,
}

/// Write the step records of epochs `1..=last` to `writer`, where `last` is
/// the newest epoch with a step record. A missing record inside that range
/// is a [`SoupError::RunlogGap`]; nothing is written in that case.
pub fn write_runlog<W: Write>(store: &SnapshotStore, mut writer: W) -> Result<RunlogSummary, SoupError> {
    let last = store
        .epochs_with(RecordKind::Steps)?
        .into_iter()
        .filter(|&epoch| epoch > 0)
        .max()
        .unwrap_or(0);

    let mut records = Vec::with_capacity(last as usize);
    for epoch in 1..=last {
        let steps = store.load_steps(epoch)?.ok_or(SoupError::RunlogGap(epoch))?;
        records.push(steps);
    }

    let mut bytes = 0;
    for steps in &records {
        let chunk: &[u8] = bytemuck::cast_slice(steps.counts());
        writer
            .write_all(chunk)
            .map_err(|e| SoupError::Io(format!("Write run-length log: {}", e)))?;
        bytes += chunk.len();
    }
    writer
        .flush()
        .map_err(|e| SoupError::Io(format!("Flush run-length log: {}", e)))?;

    tracing::info!("Wrote run-length log: {} epochs, {} bytes", last, bytes);
    Ok(RunlogSummary {
        epochs: last,
        bytes,
    })
}

/// Split a run-length log into per-epoch records, numbering epochs from 1.
/// A trailing partial record is ignored.
#[must_use]
pub fn read_runlog(bytes: &[u8], npairs: usize) -> Vec<StepCounts> {
    let record_bytes = npairs * std::mem::size_of::<u32>();
    if record_bytes == 0 {
        return Vec::new();
    }

    let chunks = bytes.chunks_exact(record_bytes);
    if !chunks.remainder().is_empty() {
        tracing::warn!(
            "Ignoring {} trailing bytes of partial run-length record",
            chunks.remainder().len()
        );
    }

    chunks
        .zip(1..)
        .map(|(chunk, epoch)| StepCounts::new(epoch, bytemuck::pod_collect_to_vec::<u8, u32>(chunk)))
        .collect()
}
