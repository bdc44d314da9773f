use serde::{Deserialize, Serialize};

/// A single traced sample on the arbor.
///
/// `location` is in pixel coordinates of the stack the point was traced in.
/// World coordinates are derived on demand from the project pixel sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    /// Stable identifier, unique within a tree. After alignment the same ID
    /// names corresponding points across stacks.
    pub id: String,
    /// Pixel location `[x, y, z]`.
    pub location: [f64; 3],
    /// Optional radius in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Free-form user annotation ("soma", "axon", "basal", "lam", ...).
    #[serde(default)]
    pub annotation: String,
    /// Set when the user explicitly marked this point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manually_marked: Option<bool>,
}

impl Point {
    pub fn new(id: impl Into<String>, location: [f64; 3]) -> Self {
        Self {
            id: id.into(),
            location,
            radius: None,
            annotation: String::new(),
            manually_marked: None,
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Case-insensitive substring match on the annotation.
    pub fn annotation_contains(&self, needle: &str) -> bool {
        self.annotation
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_match_ignores_case() {
        let p = Point::new("p", [0.0; 3]).with_annotation("Primary AXON");
        assert!(p.annotation_contains("axon"));
        assert!(!p.annotation_contains("basal"));
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let p = Point::new("00000001", [1.0, 2.0, 3.0]);
        let json = serde_json::to_string(&p).expect("serialize");
        assert!(!json.contains("radius"));
        assert!(!json.contains("manuallyMarked"));
        let back: Point = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, p);
    }
}
