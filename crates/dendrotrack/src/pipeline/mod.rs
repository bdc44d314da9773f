//! Tabular export of the analyses.
//!
//! A table is assembled from column functions, each of which sees the whole
//! [`FullState`] and returns one or more columns lined up with the table
//! index:
//!
//! - [`per_tree`]: one row per stack, labelled by 1-based stack number.
//! - [`per_branch`]: one row per branch ID in the sorted union over stacks.
//! - [`per_puncta`]: one row per puncta ID in the sorted union over stacks.
//!
//! Built-in column functions live in [`columns`].

pub mod columns;
mod table;

use std::collections::BTreeSet;

use crate::analysis::{AnalysisError, BranchColumns};
use crate::model::FullState;

pub use table::{Column, Table, Value};

/// A column function: full state in, columns aligned to the table index out.
pub type ColumnFn = dyn Fn(&FullState) -> Result<Vec<Column>, AnalysisError>;

pub fn per_tree(state: &FullState, funcs: &[&ColumnFn]) -> Result<Table, AnalysisError> {
    let index = (1..=state.n_stacks()).map(|s| s.to_string()).collect();
    assemble(Table::new("stack", index), state, funcs)
}

pub fn per_branch(state: &FullState, funcs: &[&ColumnFn]) -> Result<Table, AnalysisError> {
    let index = BranchColumns::from_trees(&state.trees).ids().to_vec();
    assemble(Table::new("branch", index), state, funcs)
}

pub fn per_puncta(state: &FullState, funcs: &[&ColumnFn]) -> Result<Table, AnalysisError> {
    assemble(Table::new("puncta", puncta_ids(state)), state, funcs)
}

/// Sorted union of puncta IDs over every stack.
pub(crate) fn puncta_ids(state: &FullState) -> Vec<String> {
    let ids: BTreeSet<&str> = state
        .puncta
        .iter()
        .flatten()
        .map(|p| p.id.as_str())
        .collect();
    ids.into_iter().map(str::to_string).collect()
}

fn assemble(mut table: Table, state: &FullState, funcs: &[&ColumnFn]) -> Result<Table, AnalysisError> {
    for func in funcs {
        for column in func(state)? {
            table.push_column(column)?;
        }
    }
    tracing::debug!(
        index = %table.index_name,
        rows = table.n_rows(),
        columns = table.columns.len(),
        "table assembled"
    );
    Ok(table)
}
