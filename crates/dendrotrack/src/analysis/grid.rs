//! Global branch-ID columns shared by every cross-stack array.

use std::collections::{BTreeSet, HashMap};

use crate::model::Tree;

/// Sorted union of branch IDs over a sequence of trees.
///
/// Every `[stack][column]` array in the cross-stack analyses is indexed by
/// position in this list, so the same branch ID lines up across stacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchColumns {
    ids: Vec<String>,
    index: HashMap<String, usize>,
}

impl BranchColumns {
    pub fn from_trees(trees: &[Tree]) -> Self {
        let ids: BTreeSet<&str> = trees
            .iter()
            .flat_map(|t| t.branches().iter().map(|b| b.id.as_str()))
            .collect();
        let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
        let index = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Self { ids, index }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn column(&self, branch_id: &str) -> Option<usize> {
        self.index.get(branch_id).copied()
    }

    /// Column of each branch of `tree`, by tree branch index.
    pub fn tree_columns(&self, tree: &Tree) -> Vec<Option<usize>> {
        tree.branches().iter().map(|b| self.column(&b.id)).collect()
    }

    /// Scatter per-branch values of one tree into a full row, with `fill`
    /// for columns the tree does not have.
    pub fn scatter<T: Clone>(&self, tree: &Tree, values: &[T], fill: T) -> Vec<T> {
        let mut row = vec![fill; self.len()];
        for (bi, col) in self.tree_columns(tree).into_iter().enumerate() {
            if let (Some(col), Some(v)) = (col, values.get(bi)) {
                row[col] = v.clone();
            }
        }
        row
    }
}
