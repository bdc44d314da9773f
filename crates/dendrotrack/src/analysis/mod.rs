//! Morphometric analyses over one tree or a time series of trees.
//!
//! - [`classify_tree`]: per-branch filopodial state and master set.
//! - [`StateGrid`] / [`detect_changes`]: cross-stack added, subtracted and
//!   transitioned flags by branch ID.
//! - [`analyze_motility`]: filopodial length deltas and their normalizations.
//! - [`tdbl`]: total dendritic branch length.
//! - [`sholl_crossings`] / [`sholl_metrics`]: radial crossing profile and its
//!   polynomial fit.
//!
//! Exclusions (axon, basal, missing or disconnected branches) show up as
//! `FiloState::Absent` in categorical outputs and as NaN in continuous ones.

mod classify;
mod cross_stack;
mod grid;
mod motility;
mod sholl;
mod tdbl;

pub use classify::{classify_tree, FiloState, TreeClassification};
pub use cross_stack::{detect_changes, ChangeCounts, Changes, StateGrid};
pub use grid::BranchColumns;
pub use motility::{analyze_motility, filo_lengths, MotilityCounts, MotilityRates, MotilityReport};
pub use sholl::{sholl_crossings, sholl_metrics, ShollFit, ShollProfile};
pub use tdbl::tdbl;


// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised by the analyses.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// A parameter is outside its valid range.
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
    /// Two inputs that must line up do not.
    ShapeMismatch {
        what: String,
        expected: usize,
        got: usize,
    },
}

impl AnalysisError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn shape(what: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            got,
        }
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter {}: {}", name, reason)
            }
            Self::ShapeMismatch {
                what,
                expected,
                got,
            } => write!(f, "{}: expected {} entries, got {}", what, expected, got),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Sum of the finite entries; NaN entries are skipped.
pub(crate) fn nan_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().filter(|v| !v.is_nan()).sum()
}

/// `num / den`, NaN when the denominator is zero.
pub(crate) fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}
