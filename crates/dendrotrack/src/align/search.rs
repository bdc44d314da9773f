//! Memoized tree-matching search.

use std::collections::HashMap;

use crate::geometry;

use super::graph::AlignGraph;

/// How the best cost of a memo entry was reached.
#[derive(Debug, Clone)]
pub(super) enum Decision {
    /// The two points match; listed successor pairs match recursively.
    Pair(Vec<(usize, usize)>),
    /// Point A is skipped in favour of this successor of A.
    SkipA(usize),
    /// Point B is skipped in favour of this successor of B.
    SkipB(usize),
}

type Key = (u32, u32, u8, u8);

pub(super) struct Search<'g, F> {
    a: &'g AlignGraph,
    b: &'g AlignGraph,
    max_skip: u8,
    penalty: f64,
    memo: HashMap<Key, (f64, Decision)>,
    cancel: F,
    cancelled: bool,
}

impl<'g, F: FnMut() -> bool> Search<'g, F> {
    pub fn new(a: &'g AlignGraph, b: &'g AlignGraph, max_skip: u8, penalty: f64, cancel: F) -> Self {
        Self {
            a,
            b,
            max_skip,
            penalty,
            memo: HashMap::new(),
            cancel,
            cancelled: false,
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Best cost of matching root to root.
    pub fn solve_roots(&mut self) -> f64 {
        self.solve(0, 0, self.max_skip, self.max_skip)
    }

    fn solve(&mut self, pa: usize, pb: usize, sa: u8, sb: u8) -> f64 {
        if self.cancelled || (self.cancel)() {
            self.cancelled = true;
            return f64::INFINITY;
        }
        let key: Key = (pa as u32, pb as u32, sa, sb);
        if let Some((cost, _)) = self.memo.get(&key) {
            return *cost;
        }

        let (a, b) = (self.a, self.b);
        let na = &a.nodes[pa].next;
        let nb = &b.nodes[pb].next;

        // Match pa with pb.
        let da = geometry::sub(a.nodes[pa].world, a.nodes[a.ancestor(pa, sa)].world);
        let db = geometry::sub(b.nodes[pb].world, b.nodes[b.ancestor(pb, sb)].world);
        let local = geometry::distance(da, db);

        let mut pair_cost = vec![vec![0.0; nb.len()]; na.len()];
        for (i, &qa) in na.iter().enumerate() {
            for (j, &qb) in nb.iter().enumerate() {
                pair_cost[i][j] = self.solve(qa, qb, 1, 1);
            }
        }
        let leave_a: Vec<f64> = na
            .iter()
            .map(|&q| self.penalty * a.nodes[q].subtree as f64)
            .collect();
        let leave_b: Vec<f64> = nb
            .iter()
            .map(|&q| self.penalty * b.nodes[q].subtree as f64)
            .collect();
        let (partition_cost, pairs) = best_partition(&pair_cost, &leave_a, &leave_b);

        let mut best = local + partition_cost;
        let mut decision = Decision::Pair(pairs.iter().map(|&(i, j)| (na[i], nb[j])).collect());

        // Skip pa.
        if sa < self.max_skip {
            let siblings: usize = na.iter().map(|&q| a.nodes[q].subtree).sum();
            for &q in na {
                let others = siblings - a.nodes[q].subtree;
                let cost = self.solve(q, pb, sa + 1, sb) + self.penalty * (others + 1) as f64;
                if cost < best {
                    best = cost;
                    decision = Decision::SkipA(q);
                }
            }
        }
        // Skip pb.
        if sb < self.max_skip {
            let siblings: usize = nb.iter().map(|&q| b.nodes[q].subtree).sum();
            for &q in nb {
                let others = siblings - b.nodes[q].subtree;
                let cost = self.solve(pa, q, sa, sb + 1) + self.penalty * (others + 1) as f64;
                if cost < best {
                    best = cost;
                    decision = Decision::SkipB(q);
                }
            }
        }

        if self.cancelled {
            return f64::INFINITY;
        }
        self.memo.insert(key, (best, decision));
        best
    }

    /// Walk the recorded decisions from the roots and collect matched
    /// `(a, b)` node pairs.
    pub fn matched_pairs(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut stack: Vec<Key> = vec![(0, 0, self.max_skip, self.max_skip)];
        while let Some(key) = stack.pop() {
            let Some((_, decision)) = self.memo.get(&key) else {
                continue;
            };
            let (pa, pb, sa, sb) = key;
            match decision {
                Decision::Pair(children) => {
                    out.push((pa as usize, pb as usize));
                    for &(qa, qb) in children.iter().rev() {
                        stack.push((qa as u32, qb as u32, 1, 1));
                    }
                }
                Decision::SkipA(q) => stack.push((*q as u32, pb, sa + 1, sb)),
                Decision::SkipB(q) => stack.push((pa, *q as u32, sa, sb + 1)),
            }
        }
        out
    }
}

/// Cheapest one-to-one pairing between two successor lists.
///
/// `cost[i][j]` prices pairing `i` with `j`; `leave_a[i]` / `leave_b[j]` price
/// leaving an element unpaired. Pairings are tried before leaving an element
/// out, and any branch whose partial cost reaches the best complete cost is
/// pruned. Returns the cost and the chosen `(i, j)` index pairs.
fn best_partition(cost: &[Vec<f64>], leave_a: &[f64], leave_b: &[f64]) -> (f64, Vec<(usize, usize)>) {
    struct Enum<'c> {
        cost: &'c [Vec<f64>],
        leave_a: &'c [f64],
        leave_b: &'c [f64],
        used_b: Vec<bool>,
        current: Vec<(usize, usize)>,
        best: f64,
        best_pairs: Vec<(usize, usize)>,
    }

    impl Enum<'_> {
        fn go(&mut self, i: usize, partial: f64) {
            if partial >= self.best {
                return;
            }
            if i == self.leave_a.len() {
                let rest: f64 = self
                    .leave_b
                    .iter()
                    .zip(&self.used_b)
                    .filter(|(_, used)| !**used)
                    .map(|(c, _)| *c)
                    .sum();
                let total = partial + rest;
                if total < self.best {
                    self.best = total;
                    self.best_pairs = self.current.clone();
                }
                return;
            }
            for j in 0..self.leave_b.len() {
                if self.used_b[j] {
                    continue;
                }
                self.used_b[j] = true;
                self.current.push((i, j));
                self.go(i + 1, partial + self.cost[i][j]);
                self.current.pop();
                self.used_b[j] = false;
            }
            self.go(i + 1, partial + self.leave_a[i]);
        }
    }

    let mut e = Enum {
        cost,
        leave_a,
        leave_b,
        used_b: vec![false; leave_b.len()],
        current: Vec::new(),
        best: f64::INFINITY,
        best_pairs: Vec::new(),
    };
    e.go(0, 0.0);
    (e.best, e.best_pairs)
}
