//! World-space measurements on a [`Tree`].
//!
//! World coordinates are pixel locations scaled by the project pixel sizes.
//! The per-tree affine transform is not applied here.

use crate::geometry;

use super::point::Point;
use super::tree::Tree;

/// Pixel → world for one location.
#[inline]
pub fn to_world(location: [f64; 3], pixel_sizes: [f64; 3]) -> [f64; 3] {
    geometry::mul(location, pixel_sizes)
}

/// Pixel → world for a list of points.
pub fn world_locations(points: &[&Point], pixel_sizes: [f64; 3]) -> Vec<[f64; 3]> {
    points
        .iter()
        .map(|p| to_world(p.location, pixel_sizes))
        .collect()
}

/// Cumulative world lengths along a run of points, starting at 0.
fn cumulative(points: &[&Point], pixel_sizes: [f64; 3]) -> Vec<f64> {
    let world = world_locations(points, pixel_sizes);
    let mut out = Vec::with_capacity(world.len());
    let mut total = 0.0;
    for (i, w) in world.iter().enumerate() {
        if i > 0 {
            total += geometry::distance(world[i - 1], *w);
        }
        out.push(total);
    }
    out
}

impl Tree {
    pub fn world_location(&self, point: &Point, pixel_sizes: [f64; 3]) -> [f64; 3] {
        to_world(point.location, pixel_sizes)
    }

    /// World location with the tree's affine transform composed on top.
    pub fn transformed_world_location(&self, point: &Point, pixel_sizes: [f64; 3]) -> [f64; 3] {
        self.transform.apply(to_world(point.location, pixel_sizes))
    }

    /// Straight-line world distance between two points of this tree.
    pub fn world_distance(&self, a: &str, b: &str, pixel_sizes: [f64; 3]) -> Option<f64> {
        let pa = self.point(a)?;
        let pb = self.point(b)?;
        Some(geometry::distance(
            to_world(pa.location, pixel_sizes),
            to_world(pb.location, pixel_sizes),
        ))
    }

    /// Distance along the arbor between two points, through their nearest
    /// common ancestor.
    pub fn along_tree_distance(&self, a: &str, b: &str, pixel_sizes: [f64; 3]) -> Option<f64> {
        let path_a = self.path_from_root(a)?;
        let path_b = self.path_from_root(b)?;
        let shared = path_a
            .iter()
            .zip(path_b.iter())
            .take_while(|(x, y)| x.id == y.id)
            .count();
        let cum_a = cumulative(&path_a, pixel_sizes);
        let cum_b = cumulative(&path_b, pixel_sizes);
        let nca = shared.checked_sub(1)?;
        Some((cum_a[cum_a.len() - 1] - cum_a[nca]) + (cum_b[cum_b.len() - 1] - cum_b[nca]))
    }

    /// Along-branch world length from the parent point to each branch point.
    ///
    /// Entry `i` belongs to `points[i]`. Without a resolvable parent, the run
    /// starts at the first point.
    pub fn cumulative_world_lengths(&self, branch_index: usize, pixel_sizes: [f64; 3]) -> Vec<f64> {
        let run = self.points_with_parent(branch_index);
        let cum = cumulative(&run, pixel_sizes);
        let n_own = self.branches.get(branch_index).map_or(0, |b| b.points.len());
        cum[cum.len() - n_own..].to_vec()
    }

    /// `(total, to_last_branch)` world lengths of a branch, measured from its
    /// parent point. `to_last_branch` is 0 when no branch point has children.
    pub fn branch_world_lengths(&self, branch_index: usize, pixel_sizes: [f64; 3]) -> (f64, f64) {
        let run = self.points_with_parent(branch_index);
        let has_parent = self.branch_parent(branch_index).is_some();
        self.run_lengths(&run, has_parent, pixel_sizes)
    }

    /// `(total, to_last_branch)` over an arbitrary run of points. When
    /// `first_is_parent` is set, the first point never counts as a branching
    /// point of the run.
    pub(crate) fn run_lengths(
        &self,
        run: &[&Point],
        first_is_parent: bool,
        pixel_sizes: [f64; 3],
    ) -> (f64, f64) {
        if run.is_empty() {
            return (0.0, 0.0);
        }
        let cum = cumulative(run, pixel_sizes);
        let total = cum[cum.len() - 1];
        let skip = usize::from(first_is_parent);
        let last_branch = (skip..run.len())
            .rev()
            .find(|&i| self.point_has_children(&run[i].id))
            .map_or(0.0, |i| cum[i]);
        (total, last_branch)
    }

    /// `(is_filo, length)`: a branch is a filopodium when it has no children,
    /// no "lam" annotation and is shorter than `max_length` in world units.
    pub fn is_filo(&self, branch_index: usize, max_length: f64, pixel_sizes: [f64; 3]) -> (bool, f64) {
        let (total, _) = self.branch_world_lengths(branch_index, pixel_sizes);
        let Some(branch) = self.branches.get(branch_index) else {
            return (false, total);
        };
        let filo = !self.branch_has_children(branch_index)
            && !branch.any_annotation("lam")
            && total < max_length;
        (filo, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TreeBuilder;
    use approx::assert_relative_eq;

    const UNIT: [f64; 3] = [1.0, 1.0, 1.0];

    fn t_shape() -> Tree {
        // root(0,0,0) ─ A: (0,0,10) (0,0,20) (0,0,30)
        //                       └ B: (5,0,20) (10,0,20)
        TreeBuilder::new([0.0; 3])
            .branch("A", "root", &[("a1", [0.0, 0.0, 10.0]), ("a2", [0.0, 0.0, 20.0]), ("a3", [0.0, 0.0, 30.0])])
            .branch("B", "a2", &[("b1", [5.0, 0.0, 20.0]), ("b2", [10.0, 0.0, 20.0])])
            .build()
    }

    #[test]
    fn branch_lengths_include_parent_segment() {
        let t = t_shape();
        let (total, to_last) = t.branch_world_lengths(0, UNIT);
        assert_relative_eq!(total, 30.0);
        assert_relative_eq!(to_last, 20.0);
        let (total_b, to_last_b) = t.branch_world_lengths(1, UNIT);
        assert_relative_eq!(total_b, 10.0);
        assert_relative_eq!(to_last_b, 0.0);
        assert_eq!(t.cumulative_world_lengths(0, UNIT), vec![10.0, 20.0, 30.0]);
        assert_eq!(t.cumulative_world_lengths(1, UNIT), vec![5.0, 10.0]);
    }

    #[test]
    fn pixel_sizes_scale_lengths() {
        let t = t_shape();
        let (total, _) = t.branch_world_lengths(0, [1.0, 1.0, 0.5]);
        assert_relative_eq!(total, 15.0);
        assert_relative_eq!(t.world_distance("root", "b2", [2.0, 2.0, 2.0]).unwrap(), 2.0 * 500f64.sqrt());
    }

    #[test]
    fn along_tree_distance_goes_through_common_ancestor() {
        let t = t_shape();
        // b2 → a2 is 10, a2 → a3 is 10.
        assert_relative_eq!(t.along_tree_distance("b2", "a3", UNIT).unwrap(), 20.0);
        assert_relative_eq!(t.along_tree_distance("root", "b2", UNIT).unwrap(), 30.0);
        assert_relative_eq!(t.along_tree_distance("a3", "a3", UNIT).unwrap(), 0.0);
        assert!(t.along_tree_distance("a3", "missing", UNIT).is_none());
    }

    #[test]
    fn filo_test_uses_length_children_and_lamella() {
        let mut t = t_shape();
        assert_eq!(t.is_filo(1, 11.0, UNIT), (true, 10.0));
        assert_eq!(t.is_filo(1, 10.0, UNIT), (false, 10.0));
        assert!(!t.is_filo(0, 100.0, UNIT).0);
        t.set_annotation("b2", "lamellipodium");
        assert!(!t.is_filo(1, 11.0, UNIT).0);
    }

    #[test]
    fn transformed_location_applies_affine() {
        let mut t = t_shape();
        t.transform.translation = [1.0, 2.0, 3.0];
        let p = t.point("a1").unwrap().clone();
        assert_eq!(t.transformed_world_location(&p, UNIT), [1.0, 2.0, 13.0]);
        assert_eq!(t.world_location(&p, UNIT), [0.0, 0.0, 10.0]);
    }
}
