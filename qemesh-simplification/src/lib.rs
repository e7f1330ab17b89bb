//! Incremental mesh simplification
//!
//! This crate provides a half-edge triangle mesh and a greedy quadric error
//! metric (QEM) edge-collapse engine that runs over it in budgeted batches:
//! - Half-edge connectivity with edge contraction
//! - Per-vertex plane quadrics and three-point collapse candidates
//! - An engine that collapses the cheapest edge first and updates locally
//! - A one-shot [`MeshSimplifier`] on top of the engine

pub mod config;
pub mod edge_collapse;
pub mod engine;
pub mod half_edge;
pub mod quadric;

pub use config::*;
pub use edge_collapse::*;
pub use engine::*;
pub use half_edge::*;
pub use quadric::*;

use qemesh_core::{Result, TriangleMesh};

/// Simplify a mesh by reducing the number of faces/vertices
pub trait MeshSimplifier {
    /// Simplify mesh with target reduction ratio (0.0 = no reduction, 1.0 = maximum reduction)
    fn simplify(&self, mesh: &TriangleMesh, reduction_ratio: f32) -> Result<TriangleMesh>;
}
