use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Per-tree affine transform (`R · (p ⊙ scale) + t`).
///
/// Stored with the tree but not composed into analysis coordinates, so that
/// stacks stay directly comparable in world space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Row-major 3×3 rotation.
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
    pub scale: [f64; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let r = &self.rotation;
        Matrix3::new(
            r[0][0], r[0][1], r[0][2], //
            r[1][0], r[1][1], r[1][2], //
            r[2][0], r[2][1], r[2][2],
        )
    }

    /// Map a location through the transform.
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let scaled = Vector3::new(
            p[0] * self.scale[0],
            p[1] * self.scale[1],
            p[2] * self.scale[2],
        );
        let out = self.rotation_matrix() * scaled + Vector3::from(self.translation);
        [out[0], out[1], out[2]]
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}
