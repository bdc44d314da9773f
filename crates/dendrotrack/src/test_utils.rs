//! Shared builders for tree-based unit tests.

use crate::model::{Branch, Point, Tree};

/// Point with no annotation and no radius.
pub(crate) fn pt(id: &str, location: [f64; 3]) -> Point {
    Point::new(id, location)
}

/// Branch hanging off `parent` with the given `(id, location)` points.
pub(crate) fn branch(id: &str, parent: Option<&str>, points: &[(&str, [f64; 3])]) -> Branch {
    Branch::new(id, parent.map(str::to_string))
        .with_points(points.iter().map(|&(pid, loc)| pt(pid, loc)).collect())
}

/// Incremental tree construction. The root point is always called `"root"`.
pub(crate) struct TreeBuilder {
    root: Point,
    branches: Vec<Branch>,
}

impl TreeBuilder {
    pub(crate) fn new(root_location: [f64; 3]) -> Self {
        Self {
            root: pt("root", root_location),
            branches: Vec::new(),
        }
    }

    pub(crate) fn branch(mut self, id: &str, parent: &str, points: &[(&str, [f64; 3])]) -> Self {
        self.branches.push(branch(id, Some(parent), points));
        self
    }

    pub(crate) fn with_branch(mut self, branch: Branch) -> Self {
        self.branches.push(branch);
        self
    }

    pub(crate) fn build(self) -> Tree {
        Tree::from_parts(Some(self.root), self.branches, Default::default())
    }
}

/// Straight run of `n` points from `start` along `step`, IDs `{prefix}{i}`.
pub(crate) fn straight_run(
    prefix: &str,
    start: [f64; 3],
    step: [f64; 3],
    n: usize,
) -> Vec<(String, [f64; 3])> {
    (1..=n)
        .map(|i| {
            let k = i as f64;
            (
                format!("{prefix}{i}"),
                [start[0] + step[0] * k, start[1] + step[1] * k, start[2] + step[2] * k],
            )
        })
        .collect()
}

/// Borrowing view of [`straight_run`] output for the builder methods.
pub(crate) fn as_refs(run: &[(String, [f64; 3])]) -> Vec<(&str, [f64; 3])> {
    run.iter().map(|(id, loc)| (id.as_str(), *loc)).collect()
}

/// Random connected tree with `n_branches` branches.
///
/// Point IDs are `{prefix}p{k}` and branch IDs `{prefix}b{k}`, so two trees
/// drawn with the same prefix share branch IDs but not shapes.
pub(crate) fn random_tree(rng: &mut rand::rngs::StdRng, n_branches: usize, prefix: &str) -> Tree {
    use rand::Rng;

    let mut anchors: Vec<(String, [f64; 3])> = vec![("root".to_string(), [0.0; 3])];
    let mut builder = TreeBuilder::new([0.0; 3]);
    let mut next_point = 0usize;
    for k in 0..n_branches {
        let (parent_id, parent_loc) = anchors[rng.gen_range(0..anchors.len())].clone();
        let n_points = rng.gen_range(1..6);
        let mut loc = parent_loc;
        let mut points = Vec::with_capacity(n_points);
        for _ in 0..n_points {
            let step = rng.gen_range(1.0..8.0);
            let dir = crate::geometry::normalized_delta(
                [0.0; 3],
                [
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-0.3..0.3),
                ],
            );
            loc = crate::geometry::add(loc, crate::geometry::scale(dir, step));
            let id = format!("{prefix}p{next_point}");
            next_point += 1;
            anchors.push((id.clone(), loc));
            points.push(Point::new(id, loc));
        }
        builder = builder
            .with_branch(Branch::new(format!("{prefix}b{k}"), Some(parent_id)).with_points(points));
    }
    builder.build()
}
