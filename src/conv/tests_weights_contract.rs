// =========================================================================
// FALSIFY-TW: continuous weight contract for tree-based convolution
//
// Properties under falsification:
//   TW-001  boundedness        — every weight lies in [0, 1]
//   TW-002  partition of unity — left + right + top == 1
//   TW-003  sibling complement — left + right == 1 - top
//   TW-004  depth monotonicity — top never grows with depth
// =========================================================================

use proptest::prelude::*;

use super::Occurrence;

/// Admissible (max_depth, depth, sibling_index, sibling_count) tuples.
fn occurrence_strategy() -> impl Strategy<Value = (usize, Occurrence)> {
    (1usize..=16, 1usize..=8)
        .prop_flat_map(|(max_depth, sibling_count)| {
            (
                Just(max_depth),
                1..=max_depth,
                1..=sibling_count,
                Just(sibling_count),
            )
        })
        .prop_map(|(max_depth, depth, sibling_index, sibling_count)| {
            (
                max_depth,
                Occurrence::new(1, sibling_index, sibling_count, depth),
            )
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn falsify_tw_001_weights_bounded((max_depth, occ) in occurrence_strategy()) {
        for w in [occ.eta_left(max_depth), occ.eta_right(max_depth), occ.eta_top(max_depth)] {
            prop_assert!(
                (0.0f32..=1.0).contains(&w),
                "FALSIFIED TW-001: weight {} outside [0, 1] for {:?} (max_depth {})",
                w, occ, max_depth
            );
        }
    }

    #[test]
    fn falsify_tw_002_partition_of_unity((max_depth, occ) in occurrence_strategy()) {
        let sum = occ.eta_left(max_depth) + occ.eta_right(max_depth) + occ.eta_top(max_depth);
        prop_assert!(
            (sum - 1.0).abs() < 1e-5,
            "FALSIFIED TW-002: weights sum to {} for {:?} (max_depth {})",
            sum, occ, max_depth
        );
    }

    #[test]
    fn falsify_tw_003_sibling_complement((max_depth, occ) in occurrence_strategy()) {
        let lateral = occ.eta_left(max_depth) + occ.eta_right(max_depth);
        let expected = 1.0 - occ.eta_top(max_depth);
        prop_assert!(
            (lateral - expected).abs() < 1e-5,
            "FALSIFIED TW-003: left + right = {}, expected {} for {:?}",
            lateral, expected, occ
        );
    }

    #[test]
    fn falsify_tw_004_top_monotone_in_depth(
        max_depth in 2usize..=16,
        sibling_index in 1usize..=4,
    ) {
        for depth in 1..max_depth {
            let shallow = Occurrence::new(1, sibling_index, 4, depth);
            let deep = Occurrence::new(1, sibling_index, 4, depth + 1);
            prop_assert!(
                deep.eta_top(max_depth) < shallow.eta_top(max_depth),
                "FALSIFIED TW-004: eta_top did not decay from depth {} to {}",
                depth, depth + 1
            );
        }
    }
}
