//! Writing remaps back into trees and keeping the TSV remap log.

use std::collections::BTreeMap;
use std::path::Path;

use crate::model::{IdAllocator, PointLoc, Tree};
use crate::project::ProjectError;

/// Rename the points of `tree` according to `remap` (`old id → new id`).
///
/// Every old ID is resolved to its point before any rename happens, so
/// chains and swaps inside the remap are applied as written. A new ID held
/// by a point outside the remap evicts that point to a freshly minted ID.
/// Returns the number of points renamed.
pub fn apply_remap(tree: &mut Tree, remap: &BTreeMap<String, String>, ids: &mut IdAllocator) -> usize {
    let mut targets: Vec<(PointLoc, &str)> = Vec::with_capacity(remap.len());
    for (old, new) in remap {
        match tree.locate(old) {
            Some(loc) => targets.push((loc, new.as_str())),
            None => tracing::warn!(id = %old, "remap entry for unknown point skipped"),
        }
    }
    let mut evicted = 0usize;
    for &(loc, new) in &targets {
        if tree.set_point_id_at(loc, new, ids).is_some() {
            evicted += 1;
        }
    }
    tracing::debug!(renamed = targets.len(), evicted, "remap applied");
    targets.len()
}

/// Log of confirmed remaps: rows of `old<TAB>new`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapFile {
    pub rows: Vec<(String, String)>,
}

impl RemapFile {
    /// Read a remap log. A missing file reads as empty.
    pub fn read(path: &Path) -> Result<Self, ProjectError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            match (record.get(0), record.get(1), record.len()) {
                (Some(old), Some(new), 2) => rows.push((old.to_string(), new.to_string())),
                _ => {
                    return Err(ProjectError::Format(format!(
                        "{}: row {} must have exactly two tab-separated fields",
                        path.display(),
                        idx + 1
                    )))
                }
            }
        }
        Ok(Self { rows })
    }

    pub fn write(&self, path: &Path) -> Result<(), ProjectError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(path)?;
        for (old, new) in &self.rows {
            writer.write_record([old.as_str(), new.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Fold a new remap into the log: existing rows `x → old` become
    /// `x → new`, then the new pairs are appended.
    pub fn merge(&mut self, remap: &BTreeMap<String, String>) {
        for (_, target) in self.rows.iter_mut() {
            if let Some(new) = remap.get(target.as_str()) {
                *target = new.clone();
            }
        }
        self.rows
            .extend(remap.iter().map(|(old, new)| (old.clone(), new.clone())));
    }

    /// Last mapping recorded for each old ID.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.rows.iter().cloned().collect()
    }
}
