//! The traced arbor of one stack.
//!
//! Ownership is strictly top-down: a [`Tree`] owns its [`Branch`]es, which own
//! their [`Point`]s. All upward relations (owning branch of a point, child
//! branches of a point) live in a private link table that is rebuilt from
//! point/branch IDs after deserialization and after every structural edit.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::branch::Branch;
use super::point::Point;
use super::transform::Transform;

/// Where a point lives inside its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointLoc {
    /// The soma / root point.
    Root,
    /// `branches[branch].points[index]`.
    Branch { branch: usize, index: usize },
}

#[derive(Debug, Clone, Default)]
struct Links {
    locate: HashMap<String, PointLoc>,
    branch_index: HashMap<String, usize>,
    /// Point ID → ordered child branch IDs.
    children: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeRecord {
    #[serde(default)]
    root_point: Option<Point>,
    #[serde(default)]
    branches: Vec<Branch>,
    #[serde(default)]
    transform: Transform,
}

/// One traced neuron in one stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "TreeRecord", into = "TreeRecord")]
pub struct Tree {
    pub(super) root_point: Option<Point>,
    pub(super) branches: Vec<Branch>,
    pub transform: Transform,
    links: Links,
}

impl From<TreeRecord> for Tree {
    fn from(r: TreeRecord) -> Self {
        Self::from_parts(r.root_point, r.branches, r.transform)
    }
}

impl From<Tree> for TreeRecord {
    fn from(t: Tree) -> Self {
        Self {
            root_point: t.root_point,
            branches: t.branches,
            transform: t.transform,
        }
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.root_point == other.root_point
            && self.branches == other.branches
            && self.transform == other.transform
    }
}

impl Tree {
    /// Empty tree with an optional soma.
    pub fn new(root_point: Option<Point>) -> Self {
        Self::from_parts(root_point, Vec::new(), Transform::default())
    }

    /// Assemble a tree and wire up its links. Child order follows branch order.
    pub fn from_parts(
        root_point: Option<Point>,
        branches: Vec<Branch>,
        transform: Transform,
    ) -> Self {
        let mut tree = Self {
            root_point,
            branches,
            transform,
            links: Links::default(),
        };
        tree.reindex();
        tree
    }

    /// Rebuild the point/branch lookup tables.
    ///
    /// Existing child order is kept for links that are still valid; branches
    /// that are not yet listed under their attach point are appended in
    /// branch-list order.
    pub(super) fn reindex(&mut self) {
        let mut locate = HashMap::new();
        if let Some(root) = &self.root_point {
            locate.insert(root.id.clone(), PointLoc::Root);
        }
        let mut branch_index = HashMap::with_capacity(self.branches.len());
        let mut n_shadowed = 0usize;
        for (bi, branch) in self.branches.iter().enumerate() {
            branch_index.insert(branch.id.clone(), bi);
            for (pi, p) in branch.points.iter().enumerate() {
                let loc = PointLoc::Branch {
                    branch: bi,
                    index: pi,
                };
                if locate.insert(p.id.clone(), loc).is_some() {
                    n_shadowed += 1;
                }
            }
        }
        if n_shadowed > 0 {
            tracing::warn!(n_shadowed, "duplicate point IDs; later points shadow earlier ones");
        }

        let old = std::mem::take(&mut self.links.children);
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for (pid, kids) in old {
            for kid in kids {
                let still_attached = branch_index
                    .get(&kid)
                    .is_some_and(|&bi| self.branches[bi].attach_point() == Some(pid.as_str()));
                if still_attached {
                    let list = children.entry(pid.clone()).or_default();
                    if !list.contains(&kid) {
                        list.push(kid);
                    }
                }
            }
        }
        for branch in &self.branches {
            if let Some(attach) = branch.attach_point() {
                let list = children.entry(attach.to_string()).or_default();
                if !list.contains(&branch.id) {
                    list.push(branch.id.clone());
                }
            }
        }

        self.links = Links {
            locate,
            branch_index,
            children,
        };
    }

    // ── Plain accessors ─────────────────────────────────────────────────────

    pub fn root_point(&self) -> Option<&Point> {
        self.root_point.as_ref()
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch_at(&self, index: usize) -> Option<&Branch> {
        self.branches.get(index)
    }

    pub fn branch(&self, id: &str) -> Option<&Branch> {
        self.branch_index(id).map(|bi| &self.branches[bi])
    }

    pub fn branch_index(&self, id: &str) -> Option<usize> {
        self.links.branch_index.get(id).copied()
    }

    pub fn locate(&self, point_id: &str) -> Option<PointLoc> {
        self.links.locate.get(point_id).copied()
    }

    pub fn point(&self, id: &str) -> Option<&Point> {
        self.locate(id).and_then(|loc| self.point_at(loc))
    }

    pub(crate) fn point_at(&self, loc: PointLoc) -> Option<&Point> {
        match loc {
            PointLoc::Root => self.root_point.as_ref(),
            PointLoc::Branch { branch, index } => {
                self.branches.get(branch).and_then(|b| b.points.get(index))
            }
        }
    }

    pub(super) fn point_at_mut(&mut self, loc: PointLoc) -> Option<&mut Point> {
        match loc {
            PointLoc::Root => self.root_point.as_mut(),
            PointLoc::Branch { branch, index } => self
                .branches
                .get_mut(branch)
                .and_then(|b| b.points.get_mut(index)),
        }
    }

    pub fn contains_point(&self, id: &str) -> bool {
        self.links.locate.contains_key(id)
    }

    pub fn is_root(&self, point_id: &str) -> bool {
        self.locate(point_id) == Some(PointLoc::Root)
    }

    /// Point IDs that occur more than once, sorted.
    pub fn duplicate_point_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dups = BTreeSet::new();
        for p in self.flatten_points(true) {
            if !seen.insert(p.id.as_str()) {
                dups.insert(p.id.clone());
            }
        }
        dups.into_iter().collect()
    }

    /// Total number of points, connected or not.
    pub fn point_count(&self) -> usize {
        self.links.locate.len()
    }

    /// Mutable access for location, radius and annotation edits. IDs must be
    /// changed through [`Tree::set_point_id`] so the links stay valid.
    pub fn point_mut(&mut self, id: &str) -> Option<&mut Point> {
        let loc = self.locate(id)?;
        self.point_at_mut(loc)
    }

    /// Replace a point's annotation.
    pub fn set_annotation(&mut self, point_id: &str, annotation: impl Into<String>) -> bool {
        match self.point_mut(point_id) {
            Some(p) => {
                p.annotation = annotation.into();
                true
            }
            None => false,
        }
    }

    // ── Link queries ────────────────────────────────────────────────────────

    /// Child branch IDs of a point, in stored order.
    pub fn children(&self, point_id: &str) -> &[String] {
        self.links
            .children
            .get(point_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Child branch indices of a point, in stored order.
    pub fn child_branch_indices(&self, point_id: &str) -> Vec<usize> {
        self.children(point_id)
            .iter()
            .filter_map(|id| self.branch_index(id))
            .collect()
    }

    pub(super) fn children_mut(&mut self, point_id: &str) -> &mut Vec<String> {
        self.links.children.entry(point_id.to_string()).or_default()
    }

    pub fn point_has_children(&self, point_id: &str) -> bool {
        !self.children(point_id).is_empty()
    }

    /// True when any point on the branch has child branches.
    pub fn branch_has_children(&self, branch_index: usize) -> bool {
        self.branches
            .get(branch_index)
            .is_some_and(|b| b.points.iter().any(|p| self.point_has_children(&p.id)))
    }

    /// Index of the branch owning `point_id` (`None` for the root).
    pub fn owning_branch(&self, point_id: &str) -> Option<usize> {
        match self.locate(point_id)? {
            PointLoc::Root => None,
            PointLoc::Branch { branch, .. } => Some(branch),
        }
    }

    /// Index of `point_id` within its branch's own points.
    pub fn index_in_branch(&self, point_id: &str) -> Option<usize> {
        match self.locate(point_id)? {
            PointLoc::Root => None,
            PointLoc::Branch { index, .. } => Some(index),
        }
    }

    /// Geometric parent of a branch (its `parent_point`).
    pub fn branch_parent(&self, branch_index: usize) -> Option<&Point> {
        let branch = self.branches.get(branch_index)?;
        self.point(branch.parent_point.as_deref()?)
    }

    /// `[parent_point] + points` for a branch. The parent is omitted when it
    /// cannot be resolved.
    pub fn points_with_parent(&self, branch_index: usize) -> Vec<&Point> {
        let Some(branch) = self.branches.get(branch_index) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(branch.points.len() + 1);
        if let Some(parent) = self.branch_parent(branch_index) {
            out.push(parent);
        }
        out.extend(branch.points.iter());
        out
    }

    /// Upstream neighbor of a point along the tree: the previous point on the
    /// branch, or the branch's attach point for a first point.
    pub fn upstream(&self, point_id: &str) -> Option<&Point> {
        match self.locate(point_id)? {
            PointLoc::Root => None,
            PointLoc::Branch { branch, index } => {
                let b = &self.branches[branch];
                if index > 0 {
                    Some(&b.points[index - 1])
                } else {
                    self.point(b.attach_point()?)
                }
            }
        }
    }

    /// Step `delta` points along the owning branch.
    ///
    /// Without `wrap`, steps run over `[parent] + points` and return `None`
    /// past either end. With `wrap`, steps cycle over the branch's own points.
    pub fn next_point_in_branch(&self, point_id: &str, delta: isize, wrap: bool) -> Option<&Point> {
        let PointLoc::Branch { branch, index } = self.locate(point_id)? else {
            return None;
        };
        let b = &self.branches[branch];
        if wrap {
            let n = b.points.len() as isize;
            let target = (index as isize + delta).rem_euclid(n);
            return b.points.get(target as usize);
        }
        let target = index as isize + delta;
        if target == -1 {
            return self.branch_parent(branch);
        }
        if target < 0 {
            return None;
        }
        b.points.get(target as usize)
    }

    pub fn prev_point_in_branch(&self, point_id: &str, wrap: bool) -> Option<&Point> {
        self.next_point_in_branch(point_id, -1, wrap)
    }

    /// Points from the root down to `point_id`, inclusive.
    ///
    /// `None` when the point is missing or not connected to the root.
    pub fn path_from_root(&self, point_id: &str) -> Option<Vec<&Point>> {
        let mut path = vec![self.point(point_id)?];
        let limit = self.point_count();
        while !self.is_root(&path[path.len() - 1].id) {
            if path.len() > limit {
                return None;
            }
            path.push(self.upstream(&path[path.len() - 1].id)?);
        }
        path.reverse();
        Some(path)
    }

    // ── Traversal ───────────────────────────────────────────────────────────

    /// Root followed by every reachable point, depth-first: each point is
    /// emitted before its child branches, which are visited in stored order.
    ///
    /// With `include_disconnected`, the root is followed by every branch's
    /// points in branch-list order instead.
    pub fn flatten_points(&self, include_disconnected: bool) -> Vec<&Point> {
        let mut out = Vec::with_capacity(self.point_count());
        if include_disconnected {
            out.extend(self.root_point.iter());
            for b in &self.branches {
                out.extend(b.points.iter());
            }
            return out;
        }
        let Some(root) = &self.root_point else {
            return out;
        };
        out.push(root);
        let mut visited = vec![false; self.branches.len()];
        self.visit_children(&root.id, &mut visited, &mut out);
        out
    }

    fn visit_children<'a>(&'a self, point_id: &str, visited: &mut [bool], out: &mut Vec<&'a Point>) {
        for bi in self.child_branch_indices(point_id) {
            self.visit_branch_from(bi, 0, visited, out);
        }
    }

    fn visit_branch_from<'a>(
        &'a self,
        branch_index: usize,
        start: usize,
        visited: &mut [bool],
        out: &mut Vec<&'a Point>,
    ) {
        if std::mem::replace(&mut visited[branch_index], true) {
            return;
        }
        for p in self.branches[branch_index].points.iter().skip(start) {
            out.push(p);
            self.visit_children(&p.id, visited, out);
        }
    }

    /// `point_id` and everything downstream of it: later points on its branch
    /// and, transitively, all branches hanging off those points.
    pub fn subtree_points(&self, point_id: &str) -> Vec<&Point> {
        match self.locate(point_id) {
            None => Vec::new(),
            Some(PointLoc::Root) => self.flatten_points(false),
            Some(PointLoc::Branch { branch, index }) => {
                let mut out = Vec::new();
                let mut visited = vec![false; self.branches.len()];
                self.visit_branch_from(branch, index, &mut visited, &mut out);
                out
            }
        }
    }

    /// Branch indices reachable from the root, in depth-first order.
    pub fn connected_branches(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let Some(root) = &self.root_point else {
            return order;
        };
        let mut visited = vec![false; self.branches.len()];
        let mut stack: Vec<usize> = self.child_branch_indices(&root.id);
        stack.reverse();
        while let Some(bi) = stack.pop() {
            if std::mem::replace(&mut visited[bi], true) {
                continue;
            }
            order.push(bi);
            let mut below: Vec<usize> = Vec::new();
            for p in &self.branches[bi].points {
                below.extend(self.child_branch_indices(&p.id));
            }
            stack.extend(below.into_iter().rev());
        }
        order
    }

    /// Per-branch reachability flags.
    pub fn connected_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.branches.len()];
        for bi in self.connected_branches() {
            mask[bi] = true;
        }
        mask
    }

    // ── Annotation queries ──────────────────────────────────────────────────

    /// True when the branch, or with `recurse_up` any branch above it, carries
    /// an "axon" annotation.
    pub fn is_axon(&self, branch_index: usize, recurse_up: bool) -> bool {
        self.branch_or_ancestors_annotated(branch_index, "axon", recurse_up)
    }

    /// As [`Tree::is_axon`], for "basal".
    pub fn is_basal(&self, branch_index: usize, recurse_up: bool) -> bool {
        self.branch_or_ancestors_annotated(branch_index, "basal", recurse_up)
    }

    fn branch_or_ancestors_annotated(&self, branch_index: usize, needle: &str, recurse_up: bool) -> bool {
        let mut current = Some(branch_index);
        let mut hops = 0;
        while let Some(bi) = current {
            let Some(branch) = self.branches.get(bi) else {
                return false;
            };
            if branch.any_annotation(needle) {
                return true;
            }
            if !recurse_up || hops > self.branches.len() {
                return false;
            }
            hops += 1;
            current = branch
                .parent_point
                .as_deref()
                .and_then(|pid| self.owning_branch(pid));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{branch, TreeBuilder};

    /// root ─ a: a1 a2 a3
    ///              └ b: b1 b2
    ///                   └ c: c1
    fn sample() -> Tree {
        TreeBuilder::new([0.0, 0.0, 0.0])
            .branch("A", "root", &[("a1", [1.0, 0.0, 0.0]), ("a2", [2.0, 0.0, 0.0]), ("a3", [3.0, 0.0, 0.0])])
            .branch("B", "a2", &[("b1", [2.0, 1.0, 0.0]), ("b2", [2.0, 2.0, 0.0])])
            .branch("C", "b1", &[("c1", [3.0, 1.0, 0.0])])
            .build()
    }

    fn ids(points: &[&Point]) -> Vec<String> {
        points.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn flatten_is_depth_first_preorder() {
        let t = sample();
        assert_eq!(
            ids(&t.flatten_points(false)),
            vec!["root", "a1", "a2", "b1", "c1", "b2", "a3"]
        );
        assert_eq!(
            ids(&t.flatten_points(true)),
            vec!["root", "a1", "a2", "a3", "b1", "b2", "c1"]
        );
    }

    #[test]
    fn disconnected_branch_is_skipped_but_kept() {
        let mut t = sample();
        t.add_branch(branch("D", Some("ghost"), &[("d1", [9.0, 9.0, 9.0])])).unwrap();
        assert_eq!(t.flatten_points(false).len(), 7);
        assert_eq!(t.flatten_points(true).len(), 8);
        assert!(t.point("d1").is_some());
        assert_eq!(t.connected_mask(), vec![true, true, true, false]);
    }

    #[test]
    fn duplicate_point_ids_are_reported() {
        let mut t = sample();
        assert!(t.duplicate_point_ids().is_empty());
        t.add_branch(branch("D", Some("a3"), &[("d1", [4.0, 0.0, 0.0])])).unwrap();
        let dup = Tree::from_parts(
            t.root_point().cloned(),
            t.branches()
                .iter()
                .cloned()
                .chain(std::iter::once(branch("E", Some("a3"), &[("d1", [5.0, 0.0, 0.0])])))
                .collect(),
            Default::default(),
        );
        assert_eq!(dup.duplicate_point_ids(), vec!["d1".to_string()]);
    }

    #[test]
    fn path_and_neighbors() {
        let t = sample();
        let path = t.path_from_root("c1").expect("connected");
        assert_eq!(ids(&path), vec!["root", "a1", "a2", "b1", "c1"]);

        assert_eq!(t.next_point_in_branch("a1", 1, false).map(|p| p.id.as_str()), Some("a2"));
        assert_eq!(t.prev_point_in_branch("a1", false).map(|p| p.id.as_str()), Some("root"));
        assert!(t.next_point_in_branch("a3", 1, false).is_none());
        assert_eq!(t.next_point_in_branch("a3", 1, true).map(|p| p.id.as_str()), Some("a1"));
        assert_eq!(t.prev_point_in_branch("a1", true).map(|p| p.id.as_str()), Some("a3"));
        assert!(t.next_point_in_branch("root", 1, false).is_none());
    }

    #[test]
    fn subtree_covers_downstream_points() {
        let t = sample();
        assert_eq!(ids(&t.subtree_points("a2")), vec!["a2", "b1", "c1", "b2", "a3"]);
        assert_eq!(ids(&t.subtree_points("b2")), vec!["b2"]);
        assert_eq!(t.subtree_points("root").len(), 7);
    }

    #[test]
    fn link_queries_agree_with_structure() {
        let t = sample();
        assert_eq!(t.children("a2"), &["B".to_string()]);
        assert!(t.branch_has_children(0));
        assert!(!t.branch_has_children(2));
        assert_eq!(t.owning_branch("b2"), Some(1));
        assert_eq!(t.index_in_branch("b2"), Some(1));
        assert_eq!(t.branch("B").and_then(|b| b.index_for_point("b2")), Some(1));
        let with_parent = t.points_with_parent(1);
        assert_eq!(ids(&with_parent), vec!["a2", "b1", "b2"]);
    }

    #[test]
    fn axon_label_propagates_down_only() {
        let mut t = sample();
        assert!(t.set_annotation("a3", "axon"));
        t.point_mut("b1").unwrap().annotation = "Basal".into();
        assert!(t.is_basal(2, true));
        assert!(t.is_axon(0, true));
        assert!(t.is_axon(2, true));
        assert!(!t.is_axon(2, false));
        assert!(!t.is_basal(1, true));
    }

    #[test]
    fn reparent_to_controls_child_lists() {
        let mut b = branch("B", Some("a2"), &[("b1", [2.0, 1.0, 0.0])]);
        b.reparent_to = Some("a3".to_string());
        let t = TreeBuilder::new([0.0; 3])
            .branch("A", "root", &[("a1", [1.0, 0.0, 0.0]), ("a2", [2.0, 0.0, 0.0]), ("a3", [3.0, 0.0, 0.0])])
            .with_branch(b)
            .build();
        assert!(t.children("a2").is_empty());
        assert_eq!(t.children("a3"), &["B".to_string()]);
        // Geometry still uses the stored parent.
        assert_eq!(t.points_with_parent(1)[0].id, "a2");
    }
}
