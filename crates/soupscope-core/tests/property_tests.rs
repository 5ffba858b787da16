//! # Property-Based Tests
//!
//! Codec, interpreter and stats invariants over generated inputs.

use proptest::collection::vec;
use proptest::prelude::*;
use soupscope_core::primitives::{MAX_STEPS, OPS};
use soupscope_core::{
    Halt, ParallelBackend, ScalarBackend, Soup, Token, compute_stats, pack, replay, unpack,
};
use soupscope_core::search::find_matching;
use std::collections::BTreeSet;

/// A cell byte biased towards instructions so generated programs do
/// something.
fn cell_byte() -> impl Strategy<Value = u8> {
    prop_oneof![
        3 => prop::sample::select(OPS.to_vec()),
        1 => any::<u8>(),
    ]
}

fn half(len: usize) -> impl Strategy<Value = Vec<Token>> {
    vec((cell_byte(), 0u32..16, any::<u16>()), len)
        .prop_map(|cells| cells.into_iter().map(|(ch, id, ep)| Token::new(ch, id, ep)).collect())
}

proptest! {
    /// Packing then unpacking returns the original fields.
    #[test]
    fn codec_roundtrip(ch in any::<u8>(), id in any::<u32>(), epoch in any::<u16>()) {
        prop_assert_eq!(unpack(pack(ch, id, epoch)), (ch, id, epoch));
    }

    /// Replacing the char field leaves id and birth epoch alone.
    #[test]
    fn with_ch_isolated(ch in any::<u8>(), new in any::<u8>(), id in any::<u32>(), epoch in any::<u16>()) {
        let token = pack(ch, id, epoch).with_ch(new);
        prop_assert_eq!(unpack(token), (new, id, epoch));
    }

    /// The step count never exceeds the effective budget, and a step-limit
    /// halt means the budget was used up.
    #[test]
    fn steps_bounded(a in half(8), b in half(8), budget in 0u32..2000) {
        let result = replay(&a, &b, budget, false);
        let limit = budget.min(MAX_STEPS);

        prop_assert!(result.steps <= limit);
        if result.halt == Halt::StepLimit {
            prop_assert_eq!(result.steps, limit);
        }
        prop_assert_eq!(result.a.len(), 8);
        prop_assert_eq!(result.b.len(), 8);
    }

    /// Replays are deterministic and the event trace has one entry per step.
    #[test]
    fn replay_deterministic(a in half(6), b in half(6), budget in 0u32..500) {
        let first = replay(&a, &b, budget, true);
        let second = replay(&a, &b, budget, true);

        prop_assert_eq!(first.events.len() as u32, first.steps);
        prop_assert_eq!(first, second);
    }

    /// Interactions only move ids around; they never invent one.
    #[test]
    fn ids_are_only_copied(a in half(8), b in half(8)) {
        let before: BTreeSet<(u32, u16)> = a.iter().chain(&b).map(|t| (t.id(), t.birth_epoch())).collect();
        let result = replay(&a, &b, MAX_STEPS, false);

        for token in result.a.iter().chain(&result.b) {
            prop_assert!(before.contains(&(token.id(), token.birth_epoch())));
        }
    }

    /// k instruction cells in every tape gives mean and median k, for any
    /// number of tapes.
    #[test]
    fn uniform_density(tapes in 1usize..40, k in 0usize..=8) {
        let tape: Vec<Token> = (0..8)
            .map(|i| Token::new(if i < k { b'+' } else { b'a' }, i as u32, 0))
            .collect();
        let soup = Soup::from_tokens(0, 8, tape.repeat(tapes)).expect("soup");
        let stats = compute_stats(&ScalarBackend, &soup);

        prop_assert!((stats.mean_ops - k as f64).abs() < 1e-9);
        prop_assert!((stats.median_ops - k as f64).abs() < 1e-9);
    }

    /// Both backends agree on stats and on search.
    #[test]
    fn backends_agree(cells in half(64), pattern in "[\\[\\]+\\-<>,.]{0,3}") {
        let soup = Soup::from_tokens(1, 4, cells).expect("soup");

        prop_assert_eq!(compute_stats(&ScalarBackend, &soup), compute_stats(&ParallelBackend, &soup));

        let scalar = find_matching(&ScalarBackend, &soup, &pattern);
        let parallel = find_matching(&ParallelBackend, &soup, &pattern);
        for hit in &scalar {
            prop_assert!(hit.projection.contains(pattern.as_str()));
        }
        prop_assert_eq!(scalar, parallel);
    }
}
