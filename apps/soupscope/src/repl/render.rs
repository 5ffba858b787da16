//! Plain-text renderings of analysis results.

use soupscope_core::primitives::SEARCH_DISPLAY_LIMIT;
use soupscope_core::{
    Epoch, Halt, LineageSummary, LineageTrace, PairReplay, PairSummary, PairView, SearchMatch,
    StepCheck, TapeSides, TapeView,
};

fn bars(projection: Option<&str>) -> String {
    match projection {
        Some(p) => format!("|{}|", p),
        None => "-".to_string(),
    }
}

fn sides(sides: &TapeSides) -> String {
    format!(
        "{} / {}",
        bars(sides.before.as_deref()),
        bars(sides.after.as_deref())
    )
}

pub fn epochs(epochs: &[Epoch]) -> String {
    format!("  Available: {:?}", epochs)
}

pub fn tape(view: &TapeView) -> String {
    let mut lines = vec![
        format!(
            "  Tape {} @ epoch {}  ({} ops / {} cells)",
            view.tape,
            view.epoch,
            view.op_count,
            view.cells.len()
        ),
        format!("  Instr: |{}|", view.projection),
        format!(
            "  Bytes: |{}|",
            view.cells
                .iter()
                .map(|cell| if cell.is_op {
                    format!("{:<2}", char::from(cell.ch))
                } else {
                    format!("{:02x}", cell.ch)
                })
                .collect::<Vec<_>>()
                .join(" ")
        ),
        format!(
            "  Top token IDs: {}",
            view.top_ids
                .iter()
                .map(|c| format!("id={} x{}", c.id, c.count))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        String::new(),
        "  idx  op    char    token_id  tok_epoch".to_string(),
    ];
    for cell in &view.cells {
        let op = if cell.is_op {
            char::from(cell.ch).to_string()
        } else {
            format!("0x{:02x}", cell.ch)
        };
        lines.push(format!(
            "  {:3}  {:<4}  {:4}  {:>10}  {:>9}",
            cell.index, op, cell.ch, cell.id, cell.birth_epoch
        ));
    }
    lines.join("\n")
}

pub fn pair(view: &PairView) -> String {
    let steps = view
        .steps
        .map_or_else(|| "?".to_string(), |s| s.to_string());
    let mut lines = vec![format!(
        "  Epoch {}: pair {}  A={}  B={}  steps={}  (tape {} was {})",
        view.epoch, view.pairing.pair_index, view.a, view.b, steps, view.tape, view.pairing.role
    )];
    for (tape, label, sides) in [(view.a, "A", &view.a_sides), (view.b, "B", &view.b_sides)] {
        lines.push(format!("  -- Tape {} ({}) --", tape, label));
        lines.push(format!("     before: {}", bars(sides.before.as_deref())));
        lines.push(format!("     after:  {}", bars(sides.after.as_deref())));
    }
    lines.join("\n")
}

pub fn top_pairs(epoch: Epoch, pairs: &[PairSummary]) -> String {
    let mut lines = vec![
        format!("  Top {} pairs by step count in epoch {}:", pairs.len(), epoch),
        format!(
            "  {:>6}  {:>7}  {:>7}  {:>7}  A-before / A-after  B-before / B-after",
            "pair", "A", "B", "steps"
        ),
    ];
    for p in pairs {
        lines.push(format!(
            "  {:>6}  {:>7}  {:>7}  {:>7}  {}  {}",
            p.pair_index,
            p.a,
            p.b,
            p.steps,
            sides(&p.a_sides),
            sides(&p.b_sides)
        ));
    }
    lines.join("\n")
}

pub fn lineage(summary: &LineageSummary) -> String {
    let stats = &summary.stats;
    let mut lines = vec![
        format!("  Epoch {} lineage:", stats.epoch),
        format!("    Mean ops:    {:.3}", stats.mean_ops),
        format!("    Median ops:  {:.1}", stats.median_ops),
        format!("    Unique IDs:  {}", stats.unique_ids),
        format!(
            "    Modal ID:    {}  (appears in {} cells)",
            stats.modal_id, stats.modal_count
        ),
    ];
    if !stats.modal_birth_epochs.is_empty() {
        let births: Vec<String> = stats
            .modal_birth_epochs
            .iter()
            .map(|(epoch, count)| format!("ep{}: {}", epoch, count))
            .collect();
        lines.push(format!("    Modal token birth epochs: {}", births.join(", ")));
    }
    if let Some(best) = summary.representative {
        lines.push(format!(
            "    Best tape for modal ID: tape {} ({} cells with modal ID)",
            best.tape, best.cells
        ));
        lines.push(format!("      Instr: {}", bars(summary.projection.as_deref())));
    }
    lines.join("\n")
}

pub fn trace(trace: &LineageTrace) -> String {
    let mut lines = vec![format!(
        "  Tracing modal ID {} (x{} cells at epoch {}) backwards...",
        trace.modal_id, trace.modal_count, trace.final_epoch
    )];
    for record in &trace.records {
        let Some(best) = record.best else {
            lines.push(format!(
                "  epoch {:3}: ID {} not present",
                record.epoch, trace.modal_id
            ));
            continue;
        };
        let partner = match record.partner {
            Some(p) => match p.steps {
                Some(steps) => format!("  paired with {}, {} steps", p.pairing.partner, steps),
                None => format!("  paired with {}", p.pairing.partner),
            },
            None => String::new(),
        };
        lines.push(format!(
            "  epoch {:3}: {:>8} cells  best tape={:6} ({:2} cells)  {}{}",
            record.epoch,
            record.total_cells,
            best.tape,
            best.cells,
            bars(record.projection.as_deref()),
            partner
        ));
    }
    lines.join("\n")
}

pub fn replay(result: &PairReplay) -> String {
    let recorded = result
        .recorded_steps
        .map_or_else(|| "?".to_string(), |s| s.to_string());
    let mut lines = vec![
        format!(
            "  Epoch {}: pair {}  A={}  B={}  steps={}",
            result.epoch, result.pairing.pair_index, result.a, result.b, recorded
        ),
        format!("  A before: |{}|", result.a_before),
        format!("  B before: |{}|", result.b_before),
        String::new(),
        format!(
            "  {:>5}  {:>3}  {:>4}  {:>5}  {:>5}  effect",
            "step", "ip", "op", "head0", "head1"
        ),
    ];
    for event in &result.replay.events {
        lines.push(format!(
            "  {:>5}  {:>3}  {:>4}  {:>5}  {:>5}  {}",
            event.step,
            event.ip,
            char::from(event.op),
            event.head0,
            event.head1,
            event.effect
        ));
    }
    if result.replay.halt == Halt::StepLimit {
        lines.push(format!("  ... stopped at step limit {}", result.replay.steps));
    } else {
        lines.push(format!("  halted: {}", result.replay.halt));
    }
    let (a, b) = result.final_projections();
    lines.push(String::new());
    lines.push(format!("  Final tape A: |{}|", a));
    lines.push(format!("  Final tape B: |{}|", b));
    lines.join("\n")
}

pub fn check(check: &StepCheck) -> String {
    format!(
        "  Epoch {} pair {}: recorded {} steps, replayed {} ({})  {}",
        check.epoch,
        check.pair_index,
        check.recorded,
        check.replayed,
        check.halt,
        if check.matches { "OK" } else { "MISMATCH" }
    )
}

pub fn search(pattern: &str, epoch: Epoch, matches: &[SearchMatch]) -> String {
    if matches.is_empty() {
        return format!("  No tapes matching '{}' at epoch {}", pattern, epoch);
    }
    let mut lines = vec![format!(
        "  {} tapes matching '{}' at epoch {}:",
        matches.len(),
        pattern,
        epoch
    )];
    for m in matches.iter().take(SEARCH_DISPLAY_LIMIT) {
        lines.push(format!("    tape {:6}: |{}|", m.tape, m.projection));
    }
    if matches.len() > SEARCH_DISPLAY_LIMIT {
        lines.push(format!(
            "    ... ({} more)",
            matches.len() - SEARCH_DISPLAY_LIMIT
        ));
    }
    lines.join("\n")
}
