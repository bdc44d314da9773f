//! dendrotrack: morphometry of time-lapse dendritic arbors.
//!
//! A project holds one traced tree per imaging stack. The crate measures each
//! tree and compares consecutive ones:
//!
//! 1. **Model** – points, branches and trees with ID-based links, collision-safe
//!    edits and pixel→world measurements.
//! 2. **Classify** – per-branch filopodial state within one stack.
//! 3. **Cross-stack** – added, subtracted and transitioned branches by ID.
//! 4. **Motility** – filopodial length changes and their normalizations.
//! 5. **TDBL / Sholl** – total dendritic branch length, radial crossing
//!    profile and its polynomial fit.
//! 6. **Align** – point matching between two stacks, producing an ID remap.
//! 7. **Pipeline** – per-tree, per-branch and per-puncta tables with CSV
//!    export.
//!
//! # Public API
//! - [`FullState`] / [`load_project`] / [`save_project`] for projects
//! - [`analyze_motility`], [`tdbl`], [`sholl_crossings`] for analyses
//! - [`align_trees`] and [`apply_remap`] for alignment
//! - [`pipeline::per_tree`] and friends for tables

pub mod align;
pub mod analysis;
pub mod geometry;
pub mod model;
pub mod pipeline;
pub mod project;

#[cfg(test)]
mod test_utils;

pub use align::{align_stacks, align_trees, apply_remap, AlignConfig, AlignError, Alignment, RemapFile};
pub use analysis::{
    analyze_motility, classify_tree, detect_changes, sholl_crossings, sholl_metrics, tdbl,
    AnalysisError, FiloState, MotilityReport, ShollFit, ShollProfile, StateGrid,
};
pub use model::{
    Branch, EditError, FullState, IdAllocator, MotilityOptions, Point, ProjectOptions,
    TipFilopodium, Tree,
};
pub use project::{load_project, save_project, ProjectError};
