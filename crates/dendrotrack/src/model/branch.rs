use serde::{Deserialize, Serialize};

use super::point::Point;

/// An ordered run of points hanging off a parent point.
///
/// Parent relations are stored by point ID only; the owning [`super::Tree`]
/// rebuilds its link tables from these IDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    /// ID of the point this branch originates from. `None` only for a
    /// synthetic root branch.
    #[serde(default)]
    pub parent_point: Option<String>,
    #[serde(default)]
    pub points: Vec<Point>,
    /// Legacy attachment override: the branch keeps `parent_point` as its
    /// geometric parent but is listed among the children of this point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reparent_to: Option<String>,
}

impl Branch {
    pub fn new(id: impl Into<String>, parent_point: Option<String>) -> Self {
        Self {
            id: id.into(),
            parent_point,
            points: Vec::new(),
            reparent_to: None,
        }
    }

    pub fn with_points(mut self, points: Vec<Point>) -> Self {
        self.points = points;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Position of `point_id` within this branch's own points.
    pub fn index_for_point(&self, point_id: &str) -> Option<usize> {
        self.points.iter().position(|p| p.id == point_id)
    }

    /// The point whose child list carries this branch.
    pub fn attach_point(&self) -> Option<&str> {
        self.reparent_to
            .as_deref()
            .or(self.parent_point.as_deref())
    }

    pub fn last_point(&self) -> Option<&Point> {
        self.points.last()
    }

    pub(crate) fn any_annotation(&self, needle: &str) -> bool {
        self.points.iter().any(|p| p.annotation_contains(needle))
    }
}
