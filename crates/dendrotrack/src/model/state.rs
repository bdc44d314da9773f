//! Project-level state: the time series of trees plus options.

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisError;

use super::point::Point;
use super::tree::Tree;

/// How a lone filopodium sitting on the last point of a branch is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipFilopodium {
    /// The filopodium stays `Terminal` and its parent branch is reported as a
    /// branch carrying a terminal filopodium.
    #[default]
    TerminalOfParent,
    /// The filopodium is treated as the continuation of its parent and
    /// reported as `BranchOnly`, anchored on the parent branch.
    ContinuesBranch,
}

/// Parameters shared by classification, change detection and motility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MotilityOptions {
    /// Branches shorter than this (world units) with no children are filopodia.
    pub filo_dist: f64,
    /// Filopodia closer than this to their branch tip are terminal.
    pub terminal_dist: f64,
    /// Minimum |Δlength| for a branch to count as extended or retracted.
    pub min_motility_dist: f64,
    pub exclude_axon: bool,
    pub exclude_basal: bool,
    /// Count added/subtracted filopodia as signed length changes.
    #[serde(rename = "includeAS")]
    pub include_as: bool,
    pub tip_filopodium: TipFilopodium,
}

impl Default for MotilityOptions {
    fn default() -> Self {
        Self {
            filo_dist: 10.0,
            terminal_dist: 10.0,
            min_motility_dist: 0.1,
            exclude_axon: true,
            exclude_basal: true,
            include_as: false,
            tip_filopodium: TipFilopodium::default(),
        }
    }
}

impl MotilityOptions {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.filo_dist.is_finite() || self.filo_dist <= 0.0 {
            return Err(AnalysisError::invalid("filo_dist", "must be finite and > 0"));
        }
        if !self.terminal_dist.is_finite() || self.terminal_dist < 0.0 {
            return Err(AnalysisError::invalid("terminal_dist", "must be finite and >= 0"));
        }
        if !self.min_motility_dist.is_finite() || self.min_motility_dist < 0.0 {
            return Err(AnalysisError::invalid("min_motility_dist", "must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Options for per-stack analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Radial bin width for Sholl crossings (world units).
    pub sholl_bin_size: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { sholl_bin_size: 5.0 }
    }
}

/// Project-wide options persisted with the project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectOptions {
    /// Micrometers per pixel along x, y, z.
    pub pixel_sizes: [f64; 3],
    pub motility_options: MotilityOptions,
    pub analysis_options: AnalysisOptions,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            pixel_sizes: [0.307, 0.307, 1.5],
            motility_options: MotilityOptions::default(),
            analysis_options: AnalysisOptions::default(),
        }
    }
}

impl ProjectOptions {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.pixel_sizes.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(AnalysisError::invalid("pixel_sizes", "all entries must be finite and > 0"));
        }
        let bin = self.analysis_options.sholl_bin_size;
        if !bin.is_finite() || bin <= 0.0 {
            return Err(AnalysisError::invalid("sholl_bin_size", "must be finite and > 0"));
        }
        self.motility_options.validate()
    }
}

/// Monotone counters for minting point and branch IDs (8-digit hex).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAllocator {
    next_point: u64,
    next_branch: u64,
}

impl IdAllocator {
    pub fn new(next_point: u64, next_branch: u64) -> Self {
        Self {
            next_point,
            next_branch,
        }
    }

    pub fn next_point_id(&mut self) -> String {
        let id = format!("{:08x}", self.next_point);
        self.next_point += 1;
        id
    }

    pub fn next_branch_id(&mut self) -> String {
        let id = format!("{:08x}", self.next_branch);
        self.next_branch += 1;
        id
    }

    /// Make sure future IDs never collide with `id` if it parses as hex.
    pub fn observe_point_id(&mut self, id: &str) {
        if let Ok(v) = u64::from_str_radix(id, 16) {
            self.next_point = self.next_point.max(v.saturating_add(1));
        }
    }

    pub fn observe_branch_id(&mut self, id: &str) {
        if let Ok(v) = u64::from_str_radix(id, 16) {
            self.next_branch = self.next_branch.max(v.saturating_add(1));
        }
    }

    /// Counters positioned past every ID already present in `trees` and
    /// `puncta`.
    pub fn scan(trees: &[Tree], puncta: &[Vec<Point>]) -> Self {
        let mut ids = Self::default();
        for tree in trees {
            for p in tree.flatten_points(true) {
                ids.observe_point_id(&p.id);
            }
            for b in tree.branches() {
                ids.observe_branch_id(&b.id);
            }
        }
        for p in puncta.iter().flatten() {
            ids.observe_point_id(&p.id);
        }
        ids
    }
}

/// Everything the analyses consume: one tree per stack, puncta, options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullState {
    /// Image volume paths, one per stack (opaque to the analyses).
    pub file_paths: Vec<String>,
    /// Time-ordered trees; index 0 is the earliest stack.
    pub trees: Vec<Tree>,
    /// Per-stack puncta, disjoint from tree points.
    pub puncta: Vec<Vec<Point>>,
    /// Collaborator payloads carried through persistence unchanged.
    pub traces: Vec<serde_json::Value>,
    pub ui_states: Vec<serde_json::Value>,
    pub project_options: ProjectOptions,
    pub ids: IdAllocator,
}

impl FullState {
    /// Wrap trees with default options and freshly scanned ID counters.
    pub fn from_trees(trees: Vec<Tree>, project_options: ProjectOptions) -> Self {
        let ids = IdAllocator::scan(&trees, &[]);
        Self {
            trees,
            project_options,
            ids,
            ..Default::default()
        }
    }

    pub fn n_stacks(&self) -> usize {
        self.trees.len()
    }

    pub fn pixel_sizes(&self) -> [f64; 3] {
        self.project_options.pixel_sizes
    }

    /// Puncta of stack `index`, empty when the stack has none.
    pub fn puncta_for(&self, index: usize) -> &[Point] {
        self.puncta.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rescan_ids(&mut self) {
        self.ids = IdAllocator::scan(&self.trees, &self.puncta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TreeBuilder;

    #[test]
    fn allocator_mints_hex_and_skips_existing() {
        let tree = TreeBuilder::new([0.0; 3])
            .branch("0000000a", "root", &[("0000001f", [1.0, 0.0, 0.0])])
            .build();
        let mut ids = IdAllocator::scan(&[tree], &[]);
        assert_eq!(ids.next_point_id(), "00000020");
        assert_eq!(ids.next_point_id(), "00000021");
        assert_eq!(ids.next_branch_id(), "0000000b");
    }

    #[test]
    fn options_validation_rejects_bad_values() {
        let mut opts = ProjectOptions::default();
        assert!(opts.validate().is_ok());
        opts.motility_options.filo_dist = 0.0;
        assert!(opts.validate().is_err());
        opts.motility_options.filo_dist = 10.0;
        opts.pixel_sizes[2] = -1.0;
        let err = opts.validate().expect_err("negative pixel size");
        assert!(err.to_string().contains("pixel_sizes"));
    }

    #[test]
    fn options_fill_missing_fields_with_defaults() {
        let raw = r#"{"pixelSizes":[1.0,1.0,1.0],"motilityOptions":{"filoDist":5.0,"includeAS":true}}"#;
        let opts: ProjectOptions = serde_json::from_str(raw).expect("valid options");
        assert_eq!(opts.motility_options.filo_dist, 5.0);
        assert!(opts.motility_options.include_as);
        assert_eq!(opts.motility_options.terminal_dist, 10.0);
        assert_eq!(opts.analysis_options.sholl_bin_size, 5.0);
    }
}
