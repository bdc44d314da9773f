//! Total dendritic branch length.

use crate::model::{MotilityOptions, Tree};

/// Total dendritic branch length of `tree` in world units.
///
/// Each connected branch contributes the length of `[parent] + points`,
/// measured from just past its last "soma"-annotated point. Unless
/// `include_filo` is set, a tail shorter than `filo_dist` beyond the last
/// branching point is left out. Excluded axon/basal branches contribute 0.
pub fn tdbl(tree: &Tree, opts: &MotilityOptions, pixel_sizes: [f64; 3], include_filo: bool) -> f64 {
    let mut total = 0.0;
    for bi in tree.connected_branches() {
        let Some(branch) = tree.branch_at(bi) else {
            continue;
        };
        if branch.is_empty()
            || (opts.exclude_axon && tree.is_axon(bi, true))
            || (opts.exclude_basal && tree.is_basal(bi, true))
        {
            continue;
        }
        let run = tree.points_with_parent(bi);
        let has_parent = tree.branch_parent(bi).is_some();
        let start = run
            .iter()
            .rposition(|p| p.annotation_contains("soma"))
            .map_or(0, |i| i + 1);
        if start >= run.len() {
            continue;
        }
        let first_is_parent = has_parent && start == 0;
        let (length, to_last_branch) = tree.run_lengths(&run[start..], first_is_parent, pixel_sizes);
        total += if include_filo || length - to_last_branch > opts.filo_dist {
            length
        } else {
            to_last_branch
        };
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TreeBuilder;
    use approx::assert_relative_eq;

    const UNIT: [f64; 3] = [1.0, 1.0, 1.0];

    fn opts() -> MotilityOptions {
        MotilityOptions::default()
    }

    #[test]
    fn short_tails_are_dropped_unless_included() {
        // A: 26 long with side branch B (25) off a2; tail past a2 is 6.
        let t = TreeBuilder::new([0.0; 3])
            .branch("A", "root", &[("a1", [10.0, 0.0, 0.0]), ("a2", [20.0, 0.0, 0.0]), ("a3", [26.0, 0.0, 0.0])])
            .branch("B", "a2", &[("b1", [20.0, 25.0, 0.0])])
            .build();
        // A tail 6 < 10 → contributes 20; B tail 25 > 10 → 25.
        assert_relative_eq!(tdbl(&t, &opts(), UNIT, false), 45.0);
        assert_relative_eq!(tdbl(&t, &opts(), UNIT, true), 51.0);
    }

    #[test]
    fn soma_annotation_trims_the_run() {
        let mut t = TreeBuilder::new([0.0; 3])
            .branch("A", "root", &[("a1", [5.0, 0.0, 0.0]), ("a2", [20.0, 0.0, 0.0]), ("a3", [40.0, 0.0, 0.0])])
            .build();
        t.set_annotation("a1", "soma edge");
        // Measured from a2 onwards.
        assert_relative_eq!(tdbl(&t, &opts(), UNIT, true), 20.0);
        t.set_annotation("a3", "soma");
        assert_relative_eq!(tdbl(&t, &opts(), UNIT, true), 0.0);
    }

    #[test]
    fn excluded_and_empty_trees() {
        let mut t = TreeBuilder::new([0.0; 3])
            .branch("A", "root", &[("a1", [30.0, 0.0, 0.0])])
            .branch("X", "root", &[("x1", [0.0, 40.0, 0.0])])
            .build();
        t.set_annotation("x1", "basal dendrite");
        assert_relative_eq!(tdbl(&t, &opts(), UNIT, true), 30.0);
        let keep = MotilityOptions {
            exclude_basal: false,
            ..opts()
        };
        assert_relative_eq!(tdbl(&t, &keep, UNIT, true), 70.0);
        assert_eq!(tdbl(&Tree::default(), &opts(), UNIT, true), 0.0);
    }
}
