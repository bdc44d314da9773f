//! Cross-stack change detection.
//!
//! Per-tree classifications are laid out on the global [`BranchColumns`] and
//! compared between consecutive stacks.

use std::collections::BTreeSet;

use crate::model::{MotilityOptions, Tree};

use super::classify::{classify_tree, FiloState, TreeClassification};
use super::grid::BranchColumns;
use super::AnalysisError;

/// Classifier output for every stack, laid out by global branch column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateGrid {
    pub columns: BranchColumns,
    /// `states[t][col]`; `Absent` where tree `t` lacks the branch.
    pub states: Vec<Vec<FiloState>>,
    /// `masters[t][col]` as global column indices.
    pub masters: Vec<Vec<BTreeSet<usize>>>,
    /// `non_empty[t][col]`: tree `t` has the branch and it has points.
    pub non_empty: Vec<Vec<bool>>,
    /// Raw per-tree output, indexed by tree branch index.
    pub per_tree: Vec<TreeClassification>,
}

impl StateGrid {
    pub fn build(
        trees: &[Tree],
        opts: &MotilityOptions,
        pixel_sizes: [f64; 3],
    ) -> Result<Self, AnalysisError> {
        opts.validate()?;
        let columns = BranchColumns::from_trees(trees);
        let mut grid = Self {
            columns,
            ..Default::default()
        };
        for tree in trees {
            let classified = classify_tree(tree, opts, pixel_sizes);
            let cols = grid.columns.tree_columns(tree);

            let states = grid
                .columns
                .scatter(tree, &classified.states, FiloState::Absent);
            let global_masters: Vec<BTreeSet<usize>> = classified
                .masters
                .iter()
                .map(|m| m.iter().filter_map(|&bi| cols.get(bi).copied().flatten()).collect())
                .collect();
            let masters = grid.columns.scatter(tree, &global_masters, BTreeSet::new());
            let filled: Vec<bool> = tree.branches().iter().map(|b| !b.is_empty()).collect();
            let non_empty = grid.columns.scatter(tree, &filled, false);

            grid.states.push(states);
            grid.masters.push(masters);
            grid.non_empty.push(non_empty);
            grid.per_tree.push(classified);
        }
        tracing::debug!(
            n_stacks = trees.len(),
            n_columns = grid.columns.len(),
            "state grid built"
        );
        Ok(grid)
    }

    pub fn n_stacks(&self) -> usize {
        self.states.len()
    }
}

/// Per-transition change flags, `[t][col]` for the step `t → t + 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    pub added: Vec<Vec<bool>>,
    pub subtracted: Vec<Vec<bool>>,
    pub transitioned: Vec<Vec<bool>>,
    pub master_changed: Vec<Vec<bool>>,
}

/// Flag counts for one transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub added: usize,
    pub subtracted: usize,
    pub transitioned: usize,
    pub master_changed: usize,
}

impl Changes {
    pub fn n_transitions(&self) -> usize {
        self.added.len()
    }

    pub fn counts(&self, t: usize) -> ChangeCounts {
        let count = |rows: &[Vec<bool>]| rows.get(t).map_or(0, |r| r.iter().filter(|&&x| x).count());
        ChangeCounts {
            added: count(&self.added),
            subtracted: count(&self.subtracted),
            transitioned: count(&self.transitioned),
            master_changed: count(&self.master_changed),
        }
    }
}

/// Compare consecutive stacks of a [`StateGrid`].
///
/// A branch whose master set changed completely is treated as re-anchored:
/// it is never reported as added or subtracted on that transition.
pub fn detect_changes(grid: &StateGrid) -> Changes {
    let mut out = Changes::default();
    for pair in 0..grid.n_stacks().saturating_sub(1) {
        let (s0, s1) = (&grid.states[pair], &grid.states[pair + 1]);
        let (m0, m1) = (&grid.masters[pair], &grid.masters[pair + 1]);
        let n = s0.len();
        let mut added = vec![false; n];
        let mut subtracted = vec![false; n];
        let mut transitioned = vec![false; n];
        let mut master_changed = vec![false; n];
        for b in 0..n {
            let (a, z) = (s0[b], s1[b]);
            master_changed[b] = !m1[b].is_empty() && m0[b].is_disjoint(&m1[b]);
            if !master_changed[b] {
                added[b] = !a.is_filo() && z.is_filo();
                subtracted[b] = a.is_filo() && !z.exists();
            }
            transitioned[b] = a.is_filo() && !a.is_branch() && z.is_branch();
        }
        out.added.push(added);
        out.subtracted.push(subtracted);
        out.transitioned.push(transitioned);
        out.master_changed.push(master_changed);
    }
    for t in 0..out.n_transitions() {
        let c = out.counts(t);
        tracing::debug!(
            transition = t,
            added = c.added,
            subtracted = c.subtracted,
            transitioned = c.transitioned,
            master_changed = c.master_changed,
            "cross-stack changes"
        );
    }
    out
}
