//! Filopodial motility between consecutive stacks.

use crate::model::{MotilityOptions, Tree};

use super::cross_stack::{detect_changes, Changes, StateGrid};
use super::tdbl::tdbl;
use super::{nan_sum, ratio, AnalysisError};

/// Filopodial length of every branch of `tree`, by tree branch index.
///
/// Filopodia report their own length. Other branches report the tail beyond
/// their last branching point when it is shorter than `filo_dist`, else 0.
/// Empty branches give 0; excluded and disconnected branches give NaN.
pub fn filo_lengths(tree: &Tree, opts: &MotilityOptions, pixel_sizes: [f64; 3]) -> Vec<f64> {
    let n = tree.branches().len();
    let mut out = vec![f64::NAN; n];
    let mut visited = vec![false; n];
    let mut stack: Vec<usize> = match tree.root_point() {
        Some(root) => tree.child_branch_indices(&root.id),
        None => Vec::new(),
    };
    while let Some(bi) = stack.pop() {
        if std::mem::replace(&mut visited[bi], true) {
            continue;
        }
        let Some(branch) = tree.branch_at(bi) else {
            continue;
        };
        if branch.is_empty() {
            out[bi] = 0.0;
            continue;
        }
        if (opts.exclude_axon && tree.is_axon(bi, true))
            || (opts.exclude_basal && tree.is_basal(bi, true))
        {
            continue;
        }
        let (is_filo, length) = tree.is_filo(bi, opts.filo_dist, pixel_sizes);
        if is_filo {
            out[bi] = length;
            continue;
        }
        for p in &branch.points {
            stack.extend(tree.child_branch_indices(&p.id));
        }
        let (total, to_last_branch) = tree.branch_world_lengths(bi, pixel_sizes);
        let tail = total - to_last_branch;
        out[bi] = if tail < opts.filo_dist { tail } else { 0.0 };
    }
    out
}

/// Normalized raw motility for one transition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotilityRates {
    /// Σ raw / TDBL of the earlier tree (filopodia included).
    pub raw_tdbl: f64,
    /// Σ raw / Σ earlier filopodial length over branches with a defined raw.
    pub raw_filo: f64,
    /// Σ raw / number of filopodia in the earlier stack.
    pub raw_n_filo: f64,
}

/// Event counts for one transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotilityCounts {
    pub added: usize,
    pub subtracted: usize,
    pub transitioned: usize,
    pub extended: usize,
    pub retracted: usize,
}

/// Everything the motility analysis derives from a time series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotilityReport {
    pub grid: StateGrid,
    pub changes: Changes,
    /// `filo_lengths[t][col]`, NaN where the branch is missing or excluded.
    pub filo_lengths: Vec<Vec<f64>>,
    /// `raw[t][col]` for the step `t → t + 1`.
    pub raw: Vec<Vec<f64>>,
    pub extended: Vec<Vec<bool>>,
    pub retracted: Vec<Vec<bool>>,
    pub rates: Vec<MotilityRates>,
}

impl MotilityReport {
    pub fn n_transitions(&self) -> usize {
        self.raw.len()
    }

    pub fn counts(&self, t: usize) -> MotilityCounts {
        let c = self.changes.counts(t);
        let count = |rows: &[Vec<bool>]| rows.get(t).map_or(0, |r| r.iter().filter(|&&x| x).count());
        MotilityCounts {
            added: c.added,
            subtracted: c.subtracted,
            transitioned: c.transitioned,
            extended: count(&self.extended),
            retracted: count(&self.retracted),
        }
    }
}

/// Classify every stack, detect changes and measure motility.
pub fn analyze_motility(
    trees: &[Tree],
    opts: &MotilityOptions,
    pixel_sizes: [f64; 3],
) -> Result<MotilityReport, AnalysisError> {
    let grid = StateGrid::build(trees, opts, pixel_sizes)?;
    let changes = detect_changes(&grid);

    let filo: Vec<Vec<f64>> = trees
        .iter()
        .map(|t| {
            let per_branch = filo_lengths(t, opts, pixel_sizes);
            grid.columns.scatter(t, &per_branch, f64::NAN)
        })
        .collect();

    let mut report = MotilityReport {
        filo_lengths: filo,
        ..Default::default()
    };
    let min = opts.min_motility_dist;
    for t in 0..changes.n_transitions() {
        let (f0, f1) = (&report.filo_lengths[t], &report.filo_lengths[t + 1]);
        let n = f0.len();
        let mut raw = vec![f64::NAN; n];
        let mut extended = vec![false; n];
        let mut retracted = vec![false; n];
        for b in 0..n {
            raw[b] = if changes.master_changed[t][b] {
                f64::NAN
            } else {
                f1[b] - f0[b]
            };
            if opts.include_as {
                if changes.added[t][b] {
                    raw[b] = f1[b];
                } else if changes.subtracted[t][b] {
                    raw[b] = -f0[b];
                }
            }
            let both = grid.non_empty[t][b] && grid.non_empty[t + 1][b];
            let stable = both && !changes.transitioned[t][b];
            extended[b] = stable && raw[b] > min && !changes.added[t][b];
            retracted[b] = stable && raw[b] < -min && !changes.subtracted[t][b];
        }

        let sum_raw = nan_sum(raw.iter().copied());
        let filo_star = nan_sum(
            f0.iter()
                .zip(&raw)
                .filter(|(_, r)| !r.is_nan())
                .map(|(f, _)| *f),
        );
        let n_filo = grid.states[t].iter().filter(|s| s.is_filo()).count();
        let rates = MotilityRates {
            raw_tdbl: ratio(sum_raw, tdbl(&trees[t], opts, pixel_sizes, true)),
            raw_filo: ratio(sum_raw, filo_star),
            raw_n_filo: ratio(sum_raw, n_filo as f64),
        };
        tracing::debug!(
            transition = t,
            sum_raw,
            raw_tdbl = rates.raw_tdbl,
            n_filo,
            "motility"
        );

        report.raw.push(raw);
        report.extended.push(extended);
        report.retracted.push(retracted);
        report.rates.push(rates);
    }
    report.grid = grid;
    report.changes = changes;
    Ok(report)
}
