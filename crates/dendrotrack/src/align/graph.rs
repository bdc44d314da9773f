//! Flat point graph used by the aligner.

use std::collections::HashMap;

use crate::model::{to_world, Tree};

#[derive(Debug, Clone)]
pub(super) struct AlignNode {
    pub id: String,
    pub world: [f64; 3],
    /// One step down the tree: the next point on the same branch, then the
    /// first point of each non-empty child branch in stored order.
    pub next: Vec<usize>,
    pub parent: Option<usize>,
    /// Parent point of this node's branch, where ancestor walks stop. The
    /// root is its own run start.
    pub run_start: usize,
    /// Points in the subtree rooted here, including this one.
    pub subtree: usize,
}

/// Connected points of one tree, indexed in depth-first pre-order.
/// Index 0 is the root.
#[derive(Debug, Clone)]
pub(super) struct AlignGraph {
    pub nodes: Vec<AlignNode>,
}

impl AlignGraph {
    /// `None` when the tree has no root point.
    pub fn from_tree(tree: &Tree, pixel_sizes: [f64; 3]) -> Option<Self> {
        tree.root_point()?;
        let order = tree.flatten_points(false);
        let index: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.as_str(), i))
            .collect();

        let mut nodes: Vec<AlignNode> = order
            .iter()
            .enumerate()
            .map(|(i, p)| AlignNode {
                id: p.id.clone(),
                world: to_world(p.location, pixel_sizes),
                next: Vec::new(),
                parent: None,
                run_start: i,
                subtree: 1,
            })
            .collect();

        for (i, p) in order.iter().enumerate() {
            let mut next = Vec::new();
            if !tree.is_root(&p.id) {
                if let Some(q) = tree.next_point_in_branch(&p.id, 1, false) {
                    next.extend(index.get(q.id.as_str()).copied());
                }
            }
            for bi in tree.child_branch_indices(&p.id) {
                if let Some(first) = tree.branch_at(bi).and_then(|b| b.points.first()) {
                    next.extend(index.get(first.id.as_str()).copied());
                }
            }
            // Pre-order guarantees every successor comes later.
            next.retain(|&j| j > i);
            for &j in &next {
                nodes[j].parent = Some(i);
            }
            nodes[i].next = next;
        }
        for (i, p) in order.iter().enumerate() {
            let Some(parent) = nodes[i].parent else {
                continue;
            };
            nodes[i].run_start = if tree.index_in_branch(&p.id) == Some(0) {
                parent
            } else {
                nodes[parent].run_start
            };
        }
        for i in (0..nodes.len()).rev() {
            let below: usize = nodes[i].next.iter().map(|&j| nodes[j].subtree).sum();
            nodes[i].subtree = 1 + below;
        }
        Some(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The point `k` steps back along the node's own `[parent] + points`
    /// run, clamped at the branch's parent point.
    pub fn ancestor(&self, node: usize, k: u8) -> usize {
        let stop = self.nodes[node].run_start;
        let mut current = node;
        for _ in 0..k {
            if current == stop {
                break;
            }
            match self.nodes[current].parent {
                Some(p) => current = p,
                None => break,
            }
        }
        current
    }
}
