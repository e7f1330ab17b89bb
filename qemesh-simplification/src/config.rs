//! Simplification settings

use serde::{Deserialize, Serialize};

/// Settings shared by [`crate::SimplificationEngine`] and [`crate::QemSimplifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyConfig {
    /// Batches stop once the mesh is down to this many faces, and never
    /// perform a collapse that would take it below.
    pub min_faces: usize,
    /// Error budget at 0 % on the slider scale.
    pub error_floor: f64,
    /// Error budget at 100 % on the slider scale.
    pub error_ceiling: f64,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            min_faces: 5,
            error_floor: 2e-6,
            error_ceiling: 0.5,
        }
    }
}

impl SimplifyConfig {
    pub fn with_min_faces(min_faces: usize) -> Self {
        Self {
            min_faces,
            ..Default::default()
        }
    }

    /// Map a 0–100 slider value into `[error_floor, error_ceiling]`.
    /// `ignore_error` lifts the ceiling entirely.
    pub fn error_budget(&self, percent: f64, ignore_error: bool) -> f64 {
        if ignore_error {
            return f64::INFINITY;
        }
        let t = percent.clamp(0.0, 100.0) / 100.0;
        self.error_floor + t * (self.error_ceiling - self.error_floor)
    }

    /// Number of edges to collapse to remove roughly `percent` of
    /// `face_count` faces; an interior collapse removes two.
    pub fn edge_budget(&self, face_count: usize, percent: f64) -> usize {
        let t = percent.clamp(0.0, 100.0) / 100.0;
        (face_count as f64 * t / 2.0) as usize
    }
}
