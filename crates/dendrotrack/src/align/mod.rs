//! Pairwise tree alignment.
//!
//! [`align_trees`] matches the points of tree B against tree A by shape and
//! position and returns a remap `B id → A id`. [`apply_remap`] writes such a
//! remap back into B with collision-safe renames, and [`RemapFile`] keeps a
//! TSV log of confirmed remaps.
//!
//! The search is a memoized dynamic program over `(point A, point B, skip A,
//! skip B)`. Matching two points costs the difference between their offset
//! vectors to the respective reference ancestors, plus the cheapest pairing
//! of their successors. Skipping a point costs `unmatched_penalty` per point
//! left unmatched.

mod graph;
mod remap;
mod search;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{FullState, Tree};

use graph::AlignGraph;
use search::Search;

pub use remap::{apply_remap, RemapFile};

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised by the aligner.
#[derive(Debug, Clone, PartialEq)]
pub enum AlignError {
    /// One of the trees has no root point.
    MissingRoot { tree: &'static str },
    /// The cancel callback fired; no remap was produced.
    Cancelled,
    /// A stack index is out of range.
    UnknownStack { index: usize, n_stacks: usize },
    InvalidConfig(String),
}

impl std::fmt::Display for AlignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRoot { tree } => write!(f, "tree {} has no root point", tree),
            Self::Cancelled => write!(f, "alignment cancelled"),
            Self::UnknownStack { index, n_stacks } => {
                write!(f, "stack {} out of range (project has {})", index, n_stacks)
            }
            Self::InvalidConfig(msg) => write!(f, "invalid alignment config: {}", msg),
        }
    }
}

impl std::error::Error for AlignError {}

// ── Config / result ────────────────────────────────────────────────────────

/// Aligner tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Maximum number of consecutive points that may be skipped on one side.
    pub max_skip: u8,
    /// Cost per point left unmatched.
    pub unmatched_penalty: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            max_skip: 3,
            unmatched_penalty: 10.0,
        }
    }
}

impl AlignConfig {
    pub fn validate(&self) -> Result<(), AlignError> {
        if !self.unmatched_penalty.is_finite() || self.unmatched_penalty < 0.0 {
            return Err(AlignError::InvalidConfig(format!(
                "unmatched_penalty must be finite and >= 0, got {}",
                self.unmatched_penalty
            )));
        }
        Ok(())
    }
}

/// Result of a completed alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Total matching cost.
    pub cost: f64,
    /// `B id → A id` for every matched pair whose IDs differ.
    pub remap: BTreeMap<String, String>,
    /// Number of matched point pairs, including those with equal IDs.
    pub n_matched: usize,
}

/// Align tree `b` onto tree `a`.
///
/// `cancel` is polled at every step of the search; once it returns `true`
/// the search unwinds and [`AlignError::Cancelled`] is returned.
pub fn align_trees(
    a: &Tree,
    b: &Tree,
    pixel_sizes: [f64; 3],
    config: &AlignConfig,
    cancel: impl FnMut() -> bool,
) -> Result<Alignment, AlignError> {
    config.validate()?;
    let ga = AlignGraph::from_tree(a, pixel_sizes).ok_or(AlignError::MissingRoot { tree: "A" })?;
    let gb = AlignGraph::from_tree(b, pixel_sizes).ok_or(AlignError::MissingRoot { tree: "B" })?;
    tracing::debug!(
        points_a = ga.len(),
        points_b = gb.len(),
        max_skip = config.max_skip,
        "align_trees: start"
    );

    let mut search = Search::new(&ga, &gb, config.max_skip, config.unmatched_penalty, cancel);
    let cost = search.solve_roots();
    if search.cancelled() {
        tracing::info!(memo_entries = search.memo_len(), "alignment cancelled");
        return Err(AlignError::Cancelled);
    }

    let pairs = search.matched_pairs();
    let remap: BTreeMap<String, String> = pairs
        .iter()
        .filter(|&&(ia, ib)| ga.nodes[ia].id != gb.nodes[ib].id)
        .map(|&(ia, ib)| (gb.nodes[ib].id.clone(), ga.nodes[ia].id.clone()))
        .collect();
    tracing::info!(
        cost,
        matched = pairs.len(),
        renamed = remap.len(),
        memo_entries = search.memo_len(),
        "alignment done"
    );
    Ok(Alignment {
        cost,
        remap,
        n_matched: pairs.len(),
    })
}

/// Align stack `target` onto stack `reference` of a project.
pub fn align_stacks(
    state: &FullState,
    reference: usize,
    target: usize,
    config: &AlignConfig,
    cancel: impl FnMut() -> bool,
) -> Result<Alignment, AlignError> {
    let n_stacks = state.n_stacks();
    let tree = |index: usize| {
        state
            .trees
            .get(index)
            .ok_or(AlignError::UnknownStack { index, n_stacks })
    };
    align_trees(tree(reference)?, tree(target)?, state.pixel_sizes(), config, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IdAllocator, Point};
    use crate::test_utils::{random_tree, TreeBuilder};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const UNIT: [f64; 3] = [1.0, 1.0, 1.0];

    fn never() -> impl FnMut() -> bool {
        || false
    }

    /// Same shape as `tree`, shifted by `offset`, every ID prefixed with `x`.
    fn shifted_copy(tree: &Tree, offset: [f64; 3]) -> Tree {
        let shift = |p: &Point| {
            let mut q = p.clone();
            q.id = format!("x{}", p.id);
            q.location = crate::geometry::add(p.location, offset);
            q
        };
        let branches = tree
            .branches()
            .iter()
            .map(|b| {
                let mut nb = b.clone();
                nb.parent_point = b.parent_point.as_ref().map(|id| format!("x{id}"));
                nb.points = b.points.iter().map(shift).collect();
                nb
            })
            .collect();
        Tree::from_parts(tree.root_point().map(shift), branches, Default::default())
    }

    fn ids(tree: &Tree) -> Vec<String> {
        tree.flatten_points(false).iter().map(|p| p.id.clone()).collect()
    }

    fn sample() -> Tree {
        TreeBuilder::new([0.0; 3])
            .branch("A", "root", &[("a1", [10.0, 0.0, 0.0]), ("a2", [20.0, 0.0, 0.0]), ("a3", [30.0, 0.0, 0.0])])
            .branch("B", "a1", &[("b1", [10.0, 8.0, 0.0]), ("b2", [10.0, 16.0, 0.0])])
            .branch("C", "a2", &[("c1", [20.0, -6.0, 0.0])])
            .build()
    }

    #[test]
    fn shifted_copy_maps_every_point_back() {
        let a = sample();
        let mut b = shifted_copy(&a, [5.0, 5.0, 0.0]);
        let alignment = align_trees(&a, &b, UNIT, &AlignConfig::default(), never()).unwrap();
        assert_eq!(alignment.remap.len(), a.point_count());
        assert_eq!(alignment.remap.get("xb2").map(String::as_str), Some("b2"));
        assert!(alignment.cost.abs() < 1e-9);

        let mut id_alloc = IdAllocator::scan(&[a.clone(), b.clone()], &[]);
        apply_remap(&mut b, &alignment.remap, &mut id_alloc);
        assert_eq!(ids(&a), ids(&b));
        for (pa, pb) in a.flatten_points(false).iter().zip(b.flatten_points(false)) {
            assert_eq!(crate::geometry::add(pa.location, [5.0, 5.0, 0.0]), pb.location);
        }

        let again = align_trees(&a, &b, UNIT, &AlignConfig::default(), never()).unwrap();
        assert!(again.remap.is_empty());
    }

    #[test]
    fn extra_branch_is_left_unmatched() {
        let a = sample();
        let mut b = shifted_copy(&a, [0.0; 3]);
        b.add_branch(crate::test_utils::branch("D", Some("xa3"), &[("d1", [30.0, 9.0, 0.0])]))
            .unwrap();
        let alignment = align_trees(&a, &b, UNIT, &AlignConfig::default(), never()).unwrap();
        assert_eq!(alignment.n_matched, a.point_count());
        assert!(!alignment.remap.contains_key("d1"));
        assert!((alignment.cost - 10.0).abs() < 1e-9);
    }

    #[test]
    fn alignment_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..5 {
            let a = random_tree(&mut rng, 6, "");
            let b = random_tree(&mut rng, 6, "q");
            let first = align_trees(&a, &b, UNIT, &AlignConfig::default(), never()).unwrap();
            let second = align_trees(&a, &b, UNIT, &AlignConfig::default(), never()).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn cancellation_produces_no_remap() {
        let a = sample();
        let b = shifted_copy(&a, [1.0, 0.0, 0.0]);
        let mut polls = 0;
        let result = align_trees(&a, &b, UNIT, &AlignConfig::default(), || {
            polls += 1;
            polls > 3
        });
        assert_eq!(result, Err(AlignError::Cancelled));
    }

    #[test]
    fn missing_root_and_bad_config() {
        let a = sample();
        assert_eq!(
            align_trees(&a, &Tree::default(), UNIT, &AlignConfig::default(), never()),
            Err(AlignError::MissingRoot { tree: "B" })
        );
        let bad = AlignConfig {
            unmatched_penalty: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            align_trees(&a, &a, UNIT, &bad, never()),
            Err(AlignError::InvalidConfig(_))
        ));
        let state = FullState::from_trees(vec![a], Default::default());
        assert_eq!(
            align_stacks(&state, 0, 3, &AlignConfig::default(), never()),
            Err(AlignError::UnknownStack { index: 3, n_stacks: 1 })
        );
    }
}
