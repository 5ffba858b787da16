//! # Validation Tier Tests (T0-T3)
//!
//! End-to-end checks against synthetic trace directories.
//!
//! ## Tiers
//! - T0: Token integrity
//! - T1: Snapshot loading and caching
//! - T2: Interpreter semantics
//! - T3: Pairing, stats and lineage across epochs

use soupscope_core::primitives::{MAX_STEPS, STACK_DEPTH};
use soupscope_core::{
    Analysis, BackendChoice, Epoch, Halt, RecordKind, Role, ScalarBackend, SnapshotStore,
    SoupError, Token, TraceConfig, pack, replay, unpack,
};
use std::path::Path;

// =============================================================================
// FIXTURES
// =============================================================================

/// Minimal trace directory writer.
struct TraceFixture {
    dir: tempfile::TempDir,
}

impl TraceFixture {
    fn new(soup_size: usize, half_len: usize, npairs: usize) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("metadata.txt"),
            format!("soup_size={soup_size}\nhalf_len={half_len}\nnpairs={npairs}\nseed=7\n"),
        )
        .expect("metadata");
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn soup(&self, epoch: Epoch, tapes: &[Vec<Token>]) -> &Self {
        self.write(RecordKind::Soup, epoch, bytemuck::cast_slice(&tapes.concat()));
        self
    }

    fn perm(&self, epoch: Epoch, entries: &[u32]) -> &Self {
        self.write(RecordKind::Permutation, epoch, bytemuck::cast_slice(entries));
        self
    }

    fn steps(&self, epoch: Epoch, counts: &[u32]) -> &Self {
        self.write(RecordKind::Steps, epoch, bytemuck::cast_slice(counts));
        self
    }

    fn write(&self, kind: RecordKind, epoch: Epoch, bytes: &[u8]) {
        std::fs::write(self.path().join(kind.file_name(epoch)), bytes).expect("record");
    }

    fn open(&self) -> Analysis {
        Analysis::open(self.path(), BackendChoice::Auto).expect("open")
    }
}

fn tape(chars: &[u8], id: u32) -> Vec<Token> {
    chars.iter().map(|&ch| Token::new(ch, id, 0)).collect()
}

fn ids(ids: &[u32]) -> Vec<Token> {
    ids.iter().map(|&id| Token::new(0, id, 0)).collect()
}

fn chars(tokens: &[Token]) -> Vec<u8> {
    tokens.iter().map(|t| t.ch()).collect()
}

// =============================================================================
// TIER T0: TOKEN INTEGRITY
// =============================================================================

mod t0_token_integrity {
    use super::*;

    /// T0.1: Field boundaries are exact.
    #[test]
    fn field_boundaries() {
        let token = pack(0xFF, 0xFFFF_FFFF, 0xFFFF);
        assert_eq!(token.0, 0xFFFF_FFFF_FFFF_00FF);
        assert_eq!(unpack(Token(1 << 8)), (0, 0, 0));
    }

    /// T0.2: Tokens read from disk keep native byte order.
    #[test]
    fn native_byte_order() {
        let fixture = TraceFixture::new(1, 2, 0);
        fixture.soup(0, &[vec![pack(b'[', 0xABCD, 12), pack(7, 1, 0)]]);

        let store = SnapshotStore::open(fixture.path()).expect("open");
        let soup = store.load_soup(0).expect("load").expect("present");
        assert_eq!(unpack(soup.cells()[0]), (b'[', 0xABCD, 12));
    }
}

// =============================================================================
// TIER T1: SNAPSHOT STORE
// =============================================================================

mod t1_snapshot_store {
    use super::*;

    /// T1.1: An epoch that was never written is not an error.
    #[test]
    fn absent_epoch_is_none() {
        let fixture = TraceFixture::new(2, 4, 1);
        let analysis = fixture.open();

        assert!(analysis.compute_stats(5).expect("stats").is_none());
        assert!(analysis.pair_view(0, 5).expect("pair").is_none());
        assert!(analysis.find_matching("+", 5).expect("search").is_none());
        assert!(analysis.trace_dominant_lineage().expect("trace").is_none());
    }

    /// T1.2: Metadata overrides the default geometry.
    #[test]
    fn metadata_geometry() {
        let fixture = TraceFixture::new(2, 4, 1);
        let analysis = fixture.open();

        assert_eq!(analysis.config().soup_size, 2);
        assert_eq!(analysis.config().tape_len(), 8);
        assert!(analysis.config().extra.contains_key("seed"));
    }

    /// T1.3: A record is read once per session.
    #[test]
    fn records_cached_per_session() {
        let fixture = TraceFixture::new(2, 4, 1);
        fixture.soup(0, &[ids(&[1; 4]), ids(&[2; 4])]);
        let analysis = fixture.open();

        analysis.compute_stats(0).expect("stats");
        analysis.tape_view(1, 0).expect("view");
        assert_eq!(analysis.store().cache_counts().soups, 1);
    }

    /// T1.4: A geometry whose snapshot size overflows is refused, both at
    /// open and when a hand-built config reaches the loader.
    #[test]
    fn overflowing_geometry_is_an_error() {
        let fixture = TraceFixture::new(1 << 62, 64, 1);
        assert!(matches!(
            Analysis::open(fixture.path(), BackendChoice::Scalar),
            Err(SoupError::InvalidConfig(_))
        ));

        fixture.soup(0, &[ids(&[1; 4])]);
        let config = TraceConfig {
            soup_size: 1 << 62,
            half_len: 64,
            npairs: 1,
            ..TraceConfig::default()
        };
        let store = SnapshotStore::with_config(fixture.path(), config);
        assert!(matches!(store.load_soup(0), Err(SoupError::InvalidConfig(_))));
    }
}

// =============================================================================
// TIER T2: INTERPRETER
// =============================================================================

mod t2_interpreter {
    use super::*;

    /// T2.1: A single `+` changes only the char field at head0.
    #[test]
    fn plus_only_touches_char() {
        let a = vec![pack(2, 11, 1), pack(0, 12, 1), pack(b'+', 13, 1), pack(0, 14, 1)];
        let b = tape(&[0, 0, 0, 0], 20);
        let result = replay(&a, &b, 1, false);

        // head0 = 2: the `+` increments its own cell
        assert_eq!(unpack(result.a[2]), (b'+' + 1, 13, 1));
        assert_eq!(result.b, b);
    }

    /// T2.2: `]` with an empty stack halts on that step.
    #[test]
    fn empty_stack_close_halts() {
        let result = replay(&tape(&[0, 0, b'a', b']'], 1), &tape(&[0; 4], 2), 50, true);

        assert_eq!(result.halt, Halt::UnmatchedClose);
        assert_eq!(result.steps, 2);
        assert_eq!(result.events.last().map(|e| e.ip), Some(3));
    }

    /// T2.3: The 65th nested `[` halts instead of growing the stack.
    #[test]
    fn open_bracket_capacity() {
        let mut cells = vec![0u8, 0];
        cells.extend(std::iter::repeat_n(b'[', STACK_DEPTH + 2));
        let split = cells.len() / 2;
        let result = replay(&tape(&cells[..split], 1), &tape(&cells[split..], 1), MAX_STEPS, false);

        assert_eq!(result.halt, Halt::StackOverflow);
        assert_eq!(result.steps, STACK_DEPTH as u32 + 1);
    }

    /// T2.4: Loop re-entry resumes after the `[`.
    #[test]
    fn loop_reentry_target() {
        // head0 = 6 (B[2] = 2); "[-" then "]" at cell 5 loops back once
        let a = tape(&[6, 0, b'[', b'-'], 1);
        let b = tape(&[0, b']', 2, 0], 2);
        let result = replay(&a, &b, 9, true);

        let executed: Vec<usize> = result.events.iter().map(|e| e.ip).collect();
        assert_eq!(executed, vec![2, 3, 4, 5, 3, 4, 5, 6, 7]);
        assert_eq!(result.b[2].ch(), 0);
    }

    /// T2.5: End to end from files: a two-tape soup replayed for 4 steps.
    #[test]
    fn two_tape_scenario() {
        let fixture = TraceFixture::new(2, 4, 1);
        fixture
            .soup(0, &[tape(&[4, 0, b'+', b'+'], 1), tape(&[0, 0, 0, 0], 2)])
            .perm(1, &[0, 1])
            .steps(1, &[MAX_STEPS]);
        let analysis = fixture.open();

        let replayed = analysis.replay_pair(0, 1, 4).expect("replay").expect("present");
        assert_eq!(replayed.replay.steps, 4);
        assert_eq!(chars(&replayed.replay.a), vec![4, 0, b'+', b'+']);
        assert_eq!(chars(&replayed.replay.b), vec![2, 0, 0, 0]);
        assert_eq!(replayed.recorded_steps, Some(MAX_STEPS));

        let check = analysis.check_recorded_steps(1, 0).expect("check").expect("present");
        assert!(check.matches);
    }
}

// =============================================================================
// TIER T3: PAIRING, STATS AND LINEAGE
// =============================================================================

mod t3_epochs {
    use super::*;

    /// T3.1: A tape in the A half has its B-half counterpart as partner.
    #[test]
    fn locate_a_role() {
        let fixture = TraceFixture::new(6, 2, 3);
        fixture.perm(2, &[4, 0, 5, 1, 3, 2]);
        let analysis = fixture.open();

        let pairing = analysis.locate(5, 2).expect("locate").expect("paired");
        assert_eq!(pairing.role, Role::A);
        assert_eq!(pairing.pair_index, 2);
        assert_eq!(pairing.partner, 2);
        assert!(analysis.locate(5, 3).expect("locate").is_none());
    }

    /// T3.2: The modal id is followed through an epoch where it vanished.
    #[test]
    fn lineage_survives_absent_epoch() {
        let fixture = TraceFixture::new(2, 4, 1);
        fixture
            .soup(1, &[ids(&[7, 7, 7, 7]), ids(&[7, 7, 3, 3])])
            .soup(2, &[ids(&[1, 1, 1, 1]), ids(&[2, 2, 2, 2])])
            .soup(3, &[ids(&[8, 7, 7, 7]), ids(&[7, 9, 9, 9])])
            .perm(1, &[0, 1]);
        let analysis = fixture.open();

        let trace = analysis.trace_dominant_lineage().expect("trace").expect("present");
        assert_eq!(trace.modal_id, 7);
        assert_eq!(trace.final_epoch, 3);

        let totals: Vec<(Epoch, u64)> = trace.records.iter().map(|r| (r.epoch, r.total_cells)).collect();
        assert_eq!(totals, vec![(1, 6), (2, 0), (3, 4)]);

        assert!(trace.records[1].best.is_none());
        let first = &trace.records[0];
        assert_eq!(first.best.map(|m| (m.tape, m.cells)), Some((0, 4)));
        let partner = first.partner.expect("paired");
        assert_eq!(partner.pairing.partner, 1);
        assert_eq!(partner.steps, None);
    }

    /// T3.3: The stats table covers every available epoch.
    #[test]
    fn stats_table_rows() {
        let fixture = TraceFixture::new(2, 4, 1);
        fixture
            .soup(0, &[tape(b"[-]a", 1), tape(b"....", 2)])
            .soup(1, &[tape(b"[-]a", 1), tape(b"[-]a", 1)])
            .steps(1, &[40]);
        let analysis = fixture.open();

        let rows = analysis.stats_table(true).expect("table");
        assert_eq!(rows.len(), 2);
        assert!(rows[0].steps.is_none());
        assert_eq!(rows[1].steps.map(|s| s.max_steps), Some(40));
        assert_eq!(rows[1].modal_count, 8);
        assert_eq!(rows[0].representative, "[-].");
        assert!((rows[0].mean_ops - 1.5).abs() < 1e-9);
    }

    /// T3.4: Results do not depend on the backend.
    #[test]
    fn scalar_session_matches_auto() {
        let fixture = TraceFixture::new(2, 4, 1);
        fixture.soup(0, &[tape(b"+,<>", 4), tape(b"x[]y", 5)]);
        let auto = fixture.open();
        let scalar = Analysis::with_store(
            SnapshotStore::open(fixture.path()).expect("open"),
            Box::new(ScalarBackend),
        );

        assert_eq!(
            auto.compute_stats(0).expect("stats"),
            scalar.compute_stats(0).expect("stats")
        );
        assert_eq!(
            auto.find_matching("[]", 0).expect("search"),
            scalar.find_matching("[]", 0).expect("search")
        );
    }
}
