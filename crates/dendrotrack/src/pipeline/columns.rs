//! Built-in column functions.
//!
//! Per-tree functions return one value per stack. Per-branch and per-puncta
//! functions return one column per stack, named `<metric>_<stack>` with a
//! 1-based stack number, aligned to the sorted ID index of the table.

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::analysis::{
    self, analyze_motility, classify_tree, sholl_crossings, sholl_metrics, AnalysisError,
    BranchColumns,
};
use crate::geometry;
use crate::model::{to_world, FullState, Tree};

use super::table::{Column, Value};
use super::{puncta_ids, ColumnFn};

type ColumnResult = Result<Vec<Column>, AnalysisError>;

/// Every per-tree built-in, in export order.
pub fn tree_columns() -> Vec<&'static ColumnFn> {
    let funcs: [&'static ColumnFn; 6] = [
        &point_count,
        &branch_count,
        &tdbl,
        &sholl_peak,
        &motility,
        &puncta_count,
    ];
    funcs.to_vec()
}

/// Every per-branch built-in, in export order.
pub fn branch_columns() -> Vec<&'static ColumnFn> {
    let funcs: [&'static ColumnFn; 4] = [&branch_lengths, &filo_states, &branch_parents, &branch_is_axon];
    funcs.to_vec()
}

/// Every per-puncta built-in, in export order.
pub fn puncta_columns() -> Vec<&'static ColumnFn> {
    let funcs: [&'static ColumnFn; 1] = [&puncta_size];
    funcs.to_vec()
}

// ── Per tree ───────────────────────────────────────────────────────────────

fn per_stack(name: &str, state: &FullState, value: impl Fn(&Tree) -> Value) -> Column {
    Column::new(name, state.trees.iter().map(value).collect())
}

/// Number of reachable points, root included.
pub fn point_count(state: &FullState) -> ColumnResult {
    Ok(vec![per_stack("point_count", state, |t| {
        Value::count(t.flatten_points(false).len())
    })])
}

/// Number of reachable branches.
pub fn branch_count(state: &FullState) -> ColumnResult {
    Ok(vec![per_stack("branch_count", state, |t| {
        Value::count(t.connected_branches().len())
    })])
}

pub fn tdbl(state: &FullState) -> ColumnResult {
    state.project_options.validate()?;
    let opts = &state.project_options.motility_options;
    let px = state.pixel_sizes();
    Ok(vec![per_stack("tdbl", state, |t| {
        Value::number(analysis::tdbl(t, opts, px, false))
    })])
}

/// Critical radius and peak value of the polynomial Sholl fit.
pub fn sholl_peak(state: &FullState) -> ColumnResult {
    state.project_options.validate()?;
    let px = state.pixel_sizes();
    let bin = state.project_options.analysis_options.sholl_bin_size;
    let mut radius = Vec::with_capacity(state.n_stacks());
    let mut peak = Vec::with_capacity(state.n_stacks());
    for tree in &state.trees {
        let profile = sholl_crossings(tree, px, bin, arbor_extent(tree, px) + bin)?;
        match sholl_metrics(&profile) {
            Some(fit) => {
                radius.push(Value::number(fit.critical_radius));
                peak.push(Value::number(fit.max_value));
            }
            None => {
                radius.push(Value::Missing);
                peak.push(Value::Missing);
            }
        }
    }
    Ok(vec![
        Column::new("sholl_critical_radius", radius),
        Column::new("sholl_max_value", peak),
    ])
}

/// Largest world distance from the soma to a reachable point.
fn arbor_extent(tree: &Tree, pixel_sizes: [f64; 3]) -> f64 {
    let Some(root) = tree.root_point() else {
        return 0.0;
    };
    let centre = to_world(root.location, pixel_sizes);
    tree.flatten_points(false)
        .iter()
        .map(|p| geometry::distance(centre, to_world(p.location, pixel_sizes)))
        .fold(0.0, f64::max)
}

/// Transition metrics land on the later stack's row; the first row is
/// missing.
fn transition_column(name: &str, n_stacks: usize, value: impl Fn(usize) -> Value) -> Column {
    let values = (0..n_stacks)
        .map(|s| if s == 0 { Value::Missing } else { value(s - 1) })
        .collect();
    Column::new(name, values)
}

/// Branch change counts (added, subtracted, transitioned, extended,
/// retracted) followed by summed raw motility normalized by TDBL, filopodial
/// length and filopodia count of the earlier stack. One motility report
/// feeds every column.
pub fn motility(state: &FullState) -> ColumnResult {
    let report = analyze_motility(
        &state.trees,
        &state.project_options.motility_options,
        state.pixel_sizes(),
    )?;
    let n = state.n_stacks();
    Ok(vec![
        transition_column("added", n, |t| Value::count(report.counts(t).added)),
        transition_column("subtracted", n, |t| Value::count(report.counts(t).subtracted)),
        transition_column("transitioned", n, |t| Value::count(report.counts(t).transitioned)),
        transition_column("extended", n, |t| Value::count(report.counts(t).extended)),
        transition_column("retracted", n, |t| Value::count(report.counts(t).retracted)),
        transition_column("raw_tdbl", n, |t| Value::number(report.rates[t].raw_tdbl)),
        transition_column("raw_filo", n, |t| Value::number(report.rates[t].raw_filo)),
        transition_column("raw_n_filo", n, |t| Value::number(report.rates[t].raw_n_filo)),
    ])
}

pub fn puncta_count(state: &FullState) -> ColumnResult {
    let values = (0..state.n_stacks())
        .map(|s| Value::count(state.puncta_for(s).len()))
        .collect();
    Ok(vec![Column::new("puncta_count", values)])
}

// ── Per branch ─────────────────────────────────────────────────────────────

/// One `<metric>_<stack>` column per stack; `cell(stack, tree, branch_index)`
/// fills the rows of branches present in that stack.
fn branch_metric(
    state: &FullState,
    metric: &str,
    mut cell: impl FnMut(usize, &Tree, usize) -> Value,
) -> Vec<Column> {
    let columns = BranchColumns::from_trees(&state.trees);
    state
        .trees
        .iter()
        .enumerate()
        .map(|(s, tree)| {
            let mut values = vec![Value::Missing; columns.len()];
            for (bi, col) in columns.tree_columns(tree).into_iter().enumerate() {
                if let Some(col) = col {
                    values[col] = cell(s, tree, bi);
                }
            }
            Column::new(format!("{}_{}", metric, s + 1), values)
        })
        .collect()
}

/// Total world length and length to the last branching point. Disconnected
/// branches are missing.
pub fn branch_lengths(state: &FullState) -> ColumnResult {
    let px = state.pixel_sizes();
    let masks: Vec<Vec<bool>> = state.trees.iter().map(Tree::connected_mask).collect();
    let mut out = branch_metric(state, "length", |s, tree, bi| {
        if masks[s][bi] {
            Value::number(tree.branch_world_lengths(bi, px).0)
        } else {
            Value::Missing
        }
    });
    out.extend(branch_metric(state, "length_to_last_branch", |s, tree, bi| {
        if masks[s][bi] {
            Value::number(tree.branch_world_lengths(bi, px).1)
        } else {
            Value::Missing
        }
    }));
    Ok(out)
}

pub fn filo_states(state: &FullState) -> ColumnResult {
    let opts = &state.project_options.motility_options;
    opts.validate()?;
    let px = state.pixel_sizes();
    let classes: Vec<_> = state
        .trees
        .iter()
        .map(|t| classify_tree(t, opts, px))
        .collect();
    Ok(branch_metric(state, "filo_state", |s, _, bi| {
        Value::Text(classes[s].states[bi].label().to_string())
    }))
}

pub fn branch_parents(state: &FullState) -> ColumnResult {
    Ok(branch_metric(state, "parent", |_, tree, bi| {
        match tree.branch_at(bi).and_then(|b| b.parent_point.clone()) {
            Some(id) => Value::Text(id),
            None => Value::Missing,
        }
    }))
}

pub fn branch_is_axon(state: &FullState) -> ColumnResult {
    Ok(branch_metric(state, "is_axon", |_, tree, bi| {
        Value::Flag(tree.is_axon(bi, true))
    }))
}

// ── Per puncta ─────────────────────────────────────────────────────────────

/// Cross-section area `π r²` in world units, with the radius scaled by the
/// x pixel size. Puncta without a radius are missing.
pub fn puncta_size(state: &FullState) -> ColumnResult {
    let ids = puncta_ids(state);
    let row: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
    let sx = state.pixel_sizes()[0];
    let out = (0..state.n_stacks())
        .map(|s| {
            let mut values = vec![Value::Missing; ids.len()];
            for p in state.puncta_for(s) {
                if let (Some(&r), Some(radius)) = (row.get(p.id.as_str()), p.radius) {
                    let world = radius * sx;
                    values[r] = Value::number(PI * world * world);
                }
            }
            Column::new(format!("size_{}", s + 1), values)
        })
        .collect();
    Ok(out)
}
