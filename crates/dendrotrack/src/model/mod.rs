//! Tree model: points, branches, trees and the project-wide state.
//!
//! - [`Tree`] owns an optional root point and an ordered list of branches.
//! - Structural edits keep the tree's link tables in sync (see [`EditError`]).
//! - [`FullState`] holds one tree per stack plus puncta and options.

mod branch;
mod edit;
mod measure;
mod point;
mod state;
mod transform;
mod tree;

pub use branch::Branch;
pub use edit::EditError;
pub use measure::{to_world, world_locations};
pub use point::Point;
pub use state::{
    AnalysisOptions, FullState, IdAllocator, MotilityOptions, ProjectOptions, TipFilopodium,
};
pub use transform::Transform;
pub use tree::{PointLoc, Tree};
