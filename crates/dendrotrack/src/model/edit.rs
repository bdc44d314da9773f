//! Structural edits on a [`Tree`].
//!
//! Every edit leaves the link tables consistent with the owned structure, so
//! callers never need to re-wire parents themselves.

use std::collections::HashMap;

use crate::geometry;

use super::branch::Branch;
use super::point::Point;
use super::state::IdAllocator;
use super::tree::{PointLoc, Tree};

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised by tree edits.
#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    UnknownPoint(String),
    UnknownBranch(String),
    DuplicatePoint(String),
    DuplicateBranch(String),
    /// The root can only be removed once it is the last point.
    RootHasDescendants,
    /// The root has no branch to be re-homed from.
    RootNotReparentable,
    /// Only empty branches may be removed.
    BranchNotEmpty(String),
    /// `new_parent` lies downstream of `point`.
    WouldCreateCycle { point: String, new_parent: String },
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPoint(id) => write!(f, "no point with id '{}'", id),
            Self::UnknownBranch(id) => write!(f, "no branch with id '{}'", id),
            Self::DuplicatePoint(id) => write!(f, "point id '{}' already used in tree", id),
            Self::DuplicateBranch(id) => write!(f, "branch id '{}' already used in tree", id),
            Self::RootHasDescendants => {
                write!(f, "cannot remove the root while other points exist")
            }
            Self::RootNotReparentable => write!(f, "the root point cannot be reparented"),
            Self::BranchNotEmpty(id) => write!(f, "branch '{}' still has points", id),
            Self::WouldCreateCycle { point, new_parent } => write!(
                f,
                "cannot attach '{}' below '{}': the new parent is downstream",
                point, new_parent
            ),
        }
    }
}

impl std::error::Error for EditError {}

// ── Edits ──────────────────────────────────────────────────────────────────

impl Tree {
    /// Append a branch. It is listed last among its attach point's children.
    pub fn add_branch(&mut self, branch: Branch) -> Result<usize, EditError> {
        if self.branch_index(&branch.id).is_some() {
            return Err(EditError::DuplicateBranch(branch.id));
        }
        if let Some(p) = branch.points.iter().find(|p| self.contains_point(&p.id)) {
            return Err(EditError::DuplicatePoint(p.id.clone()));
        }
        self.branches.push(branch);
        self.reindex();
        Ok(self.branches.len() - 1)
    }

    /// Remove an empty branch and unlink it from its parent point.
    pub fn remove_branch(&mut self, branch_id: &str) -> Result<Branch, EditError> {
        let bi = self
            .branch_index(branch_id)
            .ok_or_else(|| EditError::UnknownBranch(branch_id.to_string()))?;
        if !self.branches[bi].is_empty() {
            return Err(EditError::BranchNotEmpty(branch_id.to_string()));
        }
        let removed = self.branches.remove(bi);
        if let Some(attach) = removed.attach_point() {
            self.children_mut(attach).retain(|id| id != &removed.id);
        }
        self.reindex();
        Ok(removed)
    }

    /// Remove a single point.
    ///
    /// Child branches of the removed point are re-attached to its upstream
    /// neighbor; a branch left without points is removed. Returns the ID of
    /// the point that takes over as "current": the next point on the branch,
    /// else the previous one, else the upstream neighbor.
    pub fn remove_point(&mut self, point_id: &str) -> Result<Option<String>, EditError> {
        let loc = self
            .locate(point_id)
            .ok_or_else(|| EditError::UnknownPoint(point_id.to_string()))?;
        let (bi, idx) = match loc {
            PointLoc::Root => {
                if self.point_count() > 1 {
                    return Err(EditError::RootHasDescendants);
                }
                self.root_point = None;
                self.reindex();
                return Ok(None);
            }
            PointLoc::Branch { branch, index } => (branch, index),
        };

        let upstream = self.upstream(point_id).map(|p| p.id.clone());
        let orphans = self.children(point_id).to_vec();
        for child_id in &orphans {
            if let Some(ci) = self.branch_index(child_id) {
                let child = &mut self.branches[ci];
                child.parent_point = upstream.clone();
                child.reparent_to = None;
            }
        }
        if let Some(up) = &upstream {
            self.children_mut(up).extend(orphans);
        }
        self.children_mut(point_id).clear();

        let branch = &mut self.branches[bi];
        branch.points.remove(idx);
        let current = branch
            .points
            .get(idx)
            .or_else(|| idx.checked_sub(1).and_then(|i| branch.points.get(i)))
            .map(|p| p.id.clone())
            .or(upstream);

        if self.branches[bi].is_empty() {
            let removed = self.branches.remove(bi);
            if let Some(attach) = removed.attach_point() {
                self.children_mut(attach).retain(|id| id != &removed.id);
            }
        }
        self.reindex();
        Ok(current)
    }

    /// Attach `point_id` (and everything after it on its branch) below
    /// `new_parent_id`.
    ///
    /// When the new parent ends its branch, the moved points extend that
    /// branch. Otherwise they form a new branch off the new parent, named
    /// `new_branch_id` or a freshly minted ID. A point that starts its branch
    /// takes the whole branch along instead.
    pub fn reparent_point(
        &mut self,
        point_id: &str,
        new_parent_id: &str,
        new_branch_id: Option<String>,
        ids: &mut IdAllocator,
    ) -> Result<(), EditError> {
        let (cb, ci) = match self.locate(point_id) {
            None => return Err(EditError::UnknownPoint(point_id.to_string())),
            Some(PointLoc::Root) => return Err(EditError::RootNotReparentable),
            Some(PointLoc::Branch { branch, index }) => (branch, index),
        };
        let parent_loc = self
            .locate(new_parent_id)
            .ok_or_else(|| EditError::UnknownPoint(new_parent_id.to_string()))?;
        if self
            .subtree_points(point_id)
            .iter()
            .any(|p| p.id == new_parent_id)
        {
            return Err(EditError::WouldCreateCycle {
                point: point_id.to_string(),
                new_parent: new_parent_id.to_string(),
            });
        }

        // A new parent that ends another branch gets that branch extended.
        let extended_branch = match parent_loc {
            PointLoc::Branch { branch, index }
                if branch != cb && index + 1 == self.branches[branch].points.len() =>
            {
                Some(branch)
            }
            _ => None,
        };

        if let Some(pb) = extended_branch {
            let moved: Vec<Point> = self.branches[cb].points.drain(ci..).collect();
            self.branches[pb].points.extend(moved);
            if self.branches[cb].is_empty() {
                let removed = self.branches.remove(cb);
                if let Some(attach) = removed.attach_point() {
                    self.children_mut(attach).retain(|id| id != &removed.id);
                }
            }
        } else if ci == 0 {
            let branch = &mut self.branches[cb];
            branch.parent_point = Some(new_parent_id.to_string());
            branch.reparent_to = None;
        } else {
            let new_id = match new_branch_id {
                Some(id) => id,
                None => loop {
                    let id = ids.next_branch_id();
                    if self.branch_index(&id).is_none() {
                        break id;
                    }
                },
            };
            if self.branch_index(&new_id).is_some() {
                return Err(EditError::DuplicateBranch(new_id));
            }
            let moved: Vec<Point> = self.branches[cb].points.drain(ci..).collect();
            self.branches
                .push(Branch::new(new_id, Some(new_parent_id.to_string())).with_points(moved));
        }
        self.reindex();
        Ok(())
    }

    /// Move a point to `location` (pixels). With `downstream`, the whole
    /// subtree below the point is shifted by the same offset.
    pub fn move_point(
        &mut self,
        point_id: &str,
        location: [f64; 3],
        downstream: bool,
    ) -> Result<(), EditError> {
        let origin = self
            .point(point_id)
            .ok_or_else(|| EditError::UnknownPoint(point_id.to_string()))?
            .location;
        let delta = geometry::sub(location, origin);
        let targets: Vec<PointLoc> = if downstream {
            self.subtree_points(point_id)
                .iter()
                .filter_map(|p| self.locate(&p.id))
                .collect()
        } else {
            self.locate(point_id).into_iter().collect()
        };
        for loc in targets {
            if let Some(p) = self.point_at_mut(loc) {
                p.location = geometry::add(p.location, delta);
            }
        }
        Ok(())
    }

    /// When `point_id` starts a branch whose parent sits on another branch,
    /// splice the point's branch into the parent's branch right after the
    /// parent point. Points that used to follow the parent move into the
    /// vacated branch, which is removed if nothing followed.
    ///
    /// Returns `true` when the structure changed.
    pub fn continue_parent_branch_if_first(&mut self, point_id: &str) -> Result<bool, EditError> {
        let loc = self
            .locate(point_id)
            .ok_or_else(|| EditError::UnknownPoint(point_id.to_string()))?;
        let PointLoc::Branch { branch: bi, index: 0 } = loc else {
            return Ok(false);
        };
        let Some(parent_id) = self.branches[bi].attach_point().map(str::to_string) else {
            return Ok(false);
        };
        let Some(PointLoc::Branch {
            branch: pbi,
            index: pj,
        }) = self.locate(&parent_id)
        else {
            return Ok(false);
        };
        if pbi == bi {
            return Ok(false);
        }

        let tail: Vec<Point> = self.branches[pbi].points.drain(pj + 1..).collect();
        let own = std::mem::take(&mut self.branches[bi].points);
        self.branches[pbi].points.extend(own);
        let vacated = &mut self.branches[bi];
        vacated.points = tail;
        vacated.parent_point = Some(parent_id.clone());
        vacated.reparent_to = None;

        if vacated.is_empty() {
            let removed = self.branches.remove(bi);
            self.children_mut(&parent_id).retain(|id| id != &removed.id);
        }
        self.reindex();
        Ok(true)
    }

    /// Make the longest path (to a leaf) at every branching point continue
    /// the current branch, and order the remaining child branches by
    /// decreasing leaf distance. Returns how many branches were spliced.
    pub fn update_all_primary_branches(&mut self, pixel_sizes: [f64; 3]) -> Result<usize, EditError> {
        let Some(root_id) = self.root_point().map(|p| p.id.clone()) else {
            return Ok(0);
        };
        let leaf = self.leaf_distances(pixel_sizes);
        let score = |tree: &Tree, from: &Point, to_id: &str| -> f64 {
            match (tree.point(to_id), leaf.get(to_id)) {
                (Some(to), Some(&d)) => {
                    geometry::distance(
                        geometry::mul(from.location, pixel_sizes),
                        geometry::mul(to.location, pixel_sizes),
                    ) + d
                }
                _ => f64::NEG_INFINITY,
            }
        };

        let mut n_spliced = 0usize;
        let mut stack = vec![root_id];
        while let Some(pid) = stack.pop() {
            let Some(p) = self.point(&pid).cloned() else {
                continue;
            };
            let first_of = |tree: &Tree, branch_id: &str| -> Option<String> {
                tree.branch(branch_id)
                    .and_then(|b| b.points.first())
                    .map(|q| q.id.clone())
            };

            if !self.is_root(&pid) {
                let successor = self.next_point_in_branch(&pid, 1, false).map(|q| q.id.clone());
                let succ_score = successor
                    .as_deref()
                    .map_or(f64::NEG_INFINITY, |s| score(self, &p, s));
                let best_child = self
                    .children(&pid)
                    .iter()
                    .filter_map(|b| first_of(self, b))
                    .map(|first| (score(self, &p, &first), first))
                    .fold(None::<(f64, String)>, |best, cand| match best {
                        Some(b) if b.0 >= cand.0 => Some(b),
                        _ => Some(cand),
                    });
                if let Some((child_score, first)) = best_child {
                    if child_score > succ_score && self.continue_parent_branch_if_first(&first)? {
                        n_spliced += 1;
                    }
                }
            }

            let mut kids: Vec<(f64, String)> = self
                .children(&pid)
                .iter()
                .map(|b| {
                    let s = first_of(self, b).map_or(f64::NEG_INFINITY, |f| score(self, &p, &f));
                    (s, b.clone())
                })
                .collect();
            kids.sort_by(|a, b| b.0.total_cmp(&a.0));
            let ordered: Vec<String> = kids.into_iter().map(|(_, id)| id).collect();
            *self.children_mut(&pid) = ordered.clone();

            for b in ordered.iter().rev() {
                if let Some(first) = first_of(self, b) {
                    stack.push(first);
                }
            }
            if let Some(next) = self.next_point_in_branch(&pid, 1, false) {
                stack.push(next.id.clone());
            }
        }
        tracing::debug!(n_spliced, "update_all_primary_branches: done");
        Ok(n_spliced)
    }

    /// Longest along-tree world distance from each connected point to a leaf
    /// below it.
    fn leaf_distances(&self, pixel_sizes: [f64; 3]) -> HashMap<String, f64> {
        let order = self.flatten_points(false);
        let mut leaf: HashMap<String, f64> = HashMap::with_capacity(order.len());
        for p in order.iter().rev() {
            let here = geometry::mul(p.location, pixel_sizes);
            let mut below: Vec<&Point> = Vec::new();
            if !self.is_root(&p.id) {
                below.extend(self.next_point_in_branch(&p.id, 1, false));
            }
            for bi in self.child_branch_indices(&p.id) {
                below.extend(self.branches[bi].points.first());
            }
            let best = below
                .iter()
                .filter_map(|q| {
                    let d = leaf.get(&q.id)?;
                    Some(geometry::distance(here, geometry::mul(q.location, pixel_sizes)) + d)
                })
                .fold(0.0f64, f64::max);
            leaf.insert(p.id.clone(), best);
        }
        leaf
    }

    /// Drop every branch without points. Returns how many were removed.
    pub fn clean_empty_branches(&mut self) -> usize {
        let before = self.branches.len();
        self.branches.retain(|b| !b.is_empty());
        let removed = before - self.branches.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    /// Rename a point. If `new_id` is already taken by another point of this
    /// tree, that point first receives a fresh ID, which is returned.
    pub fn set_point_id(
        &mut self,
        point_id: &str,
        new_id: &str,
        ids: &mut IdAllocator,
    ) -> Result<Option<String>, EditError> {
        let loc = self
            .locate(point_id)
            .ok_or_else(|| EditError::UnknownPoint(point_id.to_string()))?;
        Ok(self.set_point_id_at(loc, new_id, ids))
    }

    pub(crate) fn set_point_id_at(
        &mut self,
        loc: PointLoc,
        new_id: &str,
        ids: &mut IdAllocator,
    ) -> Option<String> {
        if self.point_at(loc).is_some_and(|p| p.id == new_id) {
            return None;
        }
        let mut evicted = None;
        if let Some(incumbent) = self.locate(new_id) {
            let fresh = loop {
                let id = ids.next_point_id();
                if !self.contains_point(&id) {
                    break id;
                }
            };
            self.rename_at(incumbent, &fresh);
            evicted = Some(fresh);
        }
        self.rename_at(loc, new_id);
        evicted
    }

    fn rename_at(&mut self, loc: PointLoc, new_id: &str) {
        let Some(point) = self.point_at_mut(loc) else {
            return;
        };
        let old_id = std::mem::replace(&mut point.id, new_id.to_string());
        for b in &mut self.branches {
            if b.parent_point.as_deref() == Some(old_id.as_str()) {
                b.parent_point = Some(new_id.to_string());
            }
            if b.reparent_to.as_deref() == Some(old_id.as_str()) {
                b.reparent_to = Some(new_id.to_string());
            }
        }
        let kids = std::mem::take(self.children_mut(&old_id));
        *self.children_mut(new_id) = kids;
        self.reindex();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{branch, TreeBuilder};
    use approx::assert_relative_eq;

    const UNIT: [f64; 3] = [1.0, 1.0, 1.0];

    fn ids_of(tree: &Tree) -> Vec<String> {
        tree.flatten_points(false).iter().map(|p| p.id.clone()).collect()
    }

    fn line() -> Tree {
        TreeBuilder::new([0.0; 3])
            .branch(
                "A",
                "root",
                &[
                    ("a1", [1.0, 0.0, 0.0]),
                    ("a2", [2.0, 0.0, 0.0]),
                    ("a3", [3.0, 0.0, 0.0]),
                    ("a4", [4.0, 0.0, 0.0]),
                ],
            )
            .branch("B", "a2", &[("b1", [2.0, 1.0, 0.0]), ("b2", [2.0, 2.0, 0.0])])
            .build()
    }

    #[test]
    fn add_branch_rejects_duplicates() {
        let mut t = line();
        let err = t
            .add_branch(branch("B", Some("a1"), &[]))
            .expect_err("duplicate branch");
        assert_eq!(err, EditError::DuplicateBranch("B".into()));
        let err = t
            .add_branch(branch("C", Some("a1"), &[("b1", [0.0; 3])]))
            .expect_err("duplicate point");
        assert_eq!(err, EditError::DuplicatePoint("b1".into()));
        let idx = t.add_branch(branch("C", Some("a1"), &[("c1", [1.0, -1.0, 0.0])])).unwrap();
        assert_eq!(idx, 2);
        assert_eq!(t.children("a1"), &["C".to_string()]);
    }

    #[test]
    fn remove_branch_only_when_empty() {
        let mut t = line();
        assert_eq!(t.remove_branch("B"), Err(EditError::BranchNotEmpty("B".into())));
        t.add_branch(branch("E", Some("a3"), &[])).unwrap();
        assert!(t.remove_branch("E").is_ok());
        assert!(t.children("a3").is_empty());
        assert!(t.remove_branch("E").is_err());
    }

    #[test]
    fn remove_point_reattaches_children_and_drops_empty_branch() {
        let mut t = line();
        assert_eq!(t.remove_point("root"), Err(EditError::RootHasDescendants));

        let current = t.remove_point("a2").unwrap();
        assert_eq!(current.as_deref(), Some("a3"));
        assert_eq!(t.branch("B").unwrap().parent_point.as_deref(), Some("a1"));
        assert_eq!(t.children("a1"), &["B".to_string()]);
        assert_eq!(ids_of(&t), vec!["root", "a1", "b1", "b2", "a3", "a4"]);

        t.remove_point("b1").unwrap();
        let current = t.remove_point("b2").unwrap();
        assert_eq!(current.as_deref(), Some("a1"));
        assert!(t.branch("B").is_none());
    }

    #[test]
    fn removing_last_root_point_empties_tree() {
        let mut t = Tree::new(Some(Point::new("root", [0.0; 3])));
        assert_eq!(t.remove_point("root"), Ok(None));
        assert!(t.root_point().is_none());
        assert_eq!(t.point_count(), 0);
    }

    #[test]
    fn reparent_onto_branch_tip_extends_that_branch() {
        let mut t = line();
        let mut ids = IdAllocator::default();
        // b1 is first on B, a4 ends A: B's points move onto A.
        t.reparent_point("b1", "a4", None, &mut ids).unwrap();
        assert!(t.branch("B").is_none());
        let a = t.branch("A").unwrap();
        let names: Vec<&str> = a.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(names, vec!["a1", "a2", "a3", "a4", "b1", "b2"]);
    }

    #[test]
    fn reparent_mid_branch_splits() {
        let mut t = line();
        let mut ids = IdAllocator::new(0, 0x100);
        t.reparent_point("a3", "b2", None, &mut ids).unwrap();
        // b2 ends B so a3, a4 extend B.
        let b = t.branch("B").unwrap();
        assert_eq!(b.points.len(), 4);

        let mut t = line();
        t.reparent_point("a3", "b1", Some("S".into()), &mut ids).unwrap();
        let s = t.branch("S").expect("split branch");
        assert_eq!(s.parent_point.as_deref(), Some("b1"));
        assert_eq!(s.points.len(), 2);
        assert_eq!(t.branch("A").unwrap().points.len(), 2);
        assert_eq!(t.children("b1"), &["S".to_string()]);

        let mut t = line();
        t.reparent_point("a4", "root", None, &mut ids).unwrap();
        assert!(t.branch("00000100").is_some());
    }

    #[test]
    fn reparent_first_point_rehomes_branch() {
        let mut t = line();
        let mut ids = IdAllocator::default();
        t.reparent_point("b1", "a3", None, &mut ids).unwrap();
        assert_eq!(t.branch("B").unwrap().parent_point.as_deref(), Some("a3"));
        assert!(t.children("a2").is_empty());
        assert_eq!(t.children("a3"), &["B".to_string()]);
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut t = line();
        let mut ids = IdAllocator::default();
        let err = t.reparent_point("a2", "b2", None, &mut ids).expect_err("cycle");
        assert!(matches!(err, EditError::WouldCreateCycle { .. }));
        assert_eq!(
            t.reparent_point("root", "a1", None, &mut ids),
            Err(EditError::RootNotReparentable)
        );
    }

    #[test]
    fn move_point_downstream_shifts_subtree() {
        let mut t = line();
        t.move_point("a2", [2.0, 0.0, 5.0], true).unwrap();
        assert_eq!(t.point("a2").unwrap().location, [2.0, 0.0, 5.0]);
        assert_eq!(t.point("b2").unwrap().location, [2.0, 2.0, 5.0]);
        assert_eq!(t.point("a4").unwrap().location, [4.0, 0.0, 5.0]);
        assert_eq!(t.point("a1").unwrap().location, [1.0, 0.0, 0.0]);

        t.move_point("a1", [1.0, 1.0, 0.0], false).unwrap();
        assert_eq!(t.point("a1").unwrap().location, [1.0, 1.0, 0.0]);
        assert_eq!(t.point("a2").unwrap().location, [2.0, 0.0, 5.0]);
    }

    #[test]
    fn continue_parent_branch_swaps_tails() {
        let mut t = line();
        assert!(t.continue_parent_branch_if_first("b1").unwrap());
        let a: Vec<&str> = t.branch("A").unwrap().points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(a, vec!["a1", "a2", "b1", "b2"]);
        let b: Vec<&str> = t.branch("B").unwrap().points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(b, vec!["a3", "a4"]);
        assert_eq!(t.branch("B").unwrap().parent_point.as_deref(), Some("a2"));
        // Not first on its branch: nothing to do.
        assert!(!t.continue_parent_branch_if_first("b2").unwrap());
        // Parent is the root: nothing to do.
        assert!(!t.continue_parent_branch_if_first("a1").unwrap());
    }

    #[test]
    fn continue_parent_branch_removes_vacated_branch() {
        let mut t = TreeBuilder::new([0.0; 3])
            .branch("A", "root", &[("a1", [1.0, 0.0, 0.0])])
            .branch("B", "a1", &[("b1", [2.0, 0.0, 0.0])])
            .build();
        assert!(t.continue_parent_branch_if_first("b1").unwrap());
        assert!(t.branch("B").is_none());
        assert_eq!(t.branch("A").unwrap().points.len(), 2);
        assert!(t.children("a1").is_empty());
    }

    #[test]
    fn primary_branches_follow_longest_path() {
        // A: a1 a2 a3 (short tail of 1 past a2), B off a2 runs 5 more.
        let mut t = TreeBuilder::new([0.0; 3])
            .branch("A", "root", &[("a1", [1.0, 0.0, 0.0]), ("a2", [2.0, 0.0, 0.0]), ("a3", [3.0, 0.0, 0.0])])
            .branch("B", "a2", &[("b1", [2.0, 1.0, 0.0]), ("b2", [2.0, 5.0, 0.0])])
            .branch("C", "a2", &[("c1", [2.0, -2.0, 0.0])])
            .build();
        assert_eq!(t.update_all_primary_branches(UNIT), Ok(1));
        let a: Vec<&str> = t.branch("A").unwrap().points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(a, vec!["a1", "a2", "b1", "b2"]);
        // Remaining children of a2 sorted by leaf distance: C (2) before B (now a3, 1).
        assert_eq!(t.children("a2"), &["C".to_string(), "B".to_string()]);
        let total: f64 = (0..t.branches().len()).map(|bi| t.branch_world_lengths(bi, UNIT).0).sum();
        assert_relative_eq!(total, 2.0 + 5.0 + 1.0 + 2.0);
    }

    #[test]
    fn clean_empty_branches_counts_removals() {
        let mut t = line();
        t.add_branch(branch("E1", Some("a1"), &[])).unwrap();
        t.add_branch(branch("E2", None, &[])).unwrap();
        assert_eq!(t.clean_empty_branches(), 2);
        assert_eq!(t.clean_empty_branches(), 0);
        assert!(t.children("a1").is_empty());
    }

    #[test]
    fn set_point_id_evicts_incumbent_once() {
        let mut t = line();
        let mut ids = IdAllocator::new(0x50, 0);
        let evicted = t.set_point_id("b1", "a2", &mut ids).unwrap();
        assert_eq!(evicted.as_deref(), Some("00000050"));
        // The old a2 kept its children under its new name.
        assert_eq!(t.children("00000050"), &["B".to_string()]);
        assert_eq!(t.branch("B").unwrap().parent_point.as_deref(), Some("00000050"));
        assert_eq!(t.point("a2").unwrap().location, [2.0, 1.0, 0.0]);
        // Idempotent afterwards.
        assert_eq!(t.set_point_id("a2", "a2", &mut ids).unwrap(), None);
        assert_eq!(t.point_count(), 7);
        assert!(t.set_point_id("missing", "x", &mut ids).is_err());
    }
}
