//! One-shot edge collapse simplification
//!
//! Wraps the incremental [`SimplificationEngine`] behind [`MeshSimplifier`]:
//! build the half-edge mesh, spend an edge budget derived from the
//! reduction ratio in a single batch, and flatten the result.

use qemesh_core::{Error, Result, TriangleMesh};
use tracing::debug;

use crate::config::SimplifyConfig;
use crate::engine::SimplificationEngine;
use crate::half_edge::HalfEdgeMesh;
use crate::MeshSimplifier;

/// Quadric error edge-collapse simplifier.
#[derive(Debug, Clone, Default)]
pub struct QemSimplifier {
    pub config: SimplifyConfig,
    /// Stop when the cheapest collapse costs more than this; unbounded if `None`.
    pub max_error: Option<f64>,
    /// Share vertices between faces and average their normals in the output.
    pub smooth_normals: bool,
}

impl QemSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(config: SimplifyConfig, max_error: Option<f64>, smooth_normals: bool) -> Self {
        Self {
            config,
            max_error,
            smooth_normals,
        }
    }
}

impl MeshSimplifier for QemSimplifier {
    fn simplify(&self, mesh: &TriangleMesh, reduction_ratio: f32) -> Result<TriangleMesh> {
        if mesh.is_empty() {
            return Err(Error::EmptyMesh);
        }
        if !(0.0..=1.0).contains(&reduction_ratio) {
            return Err(Error::InvalidData(
                "Reduction ratio must be between 0.0 and 1.0".to_string(),
            ));
        }
        mesh.validate()?;
        if reduction_ratio == 0.0 {
            return Ok(mesh.clone());
        }

        let edges = self
            .config
            .edge_budget(mesh.face_count(), f64::from(reduction_ratio) * 100.0);
        let half_edges = HalfEdgeMesh::from_triangle_mesh(mesh)?;
        let mut engine = SimplificationEngine::with_config(half_edges, self.config.clone())?;

        let outcome = engine.simplify_batch(edges, self.max_error.unwrap_or(f64::INFINITY))?;
        if let Some(reason) = outcome.stop {
            debug!(%reason, collapsed = outcome.collapsed, requested = edges, "simplification stopped short");
        }

        Ok(engine.flatten(self.smooth_normals))
    }
}
