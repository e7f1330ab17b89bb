//! Core data structures for qemesh
//!
//! This crate provides the geometry types shared by the simplification
//! engine and its callers: points and normals, the indexed triangle mesh,
//! the triangle soup used to build half-edge meshes, the error type, and a
//! handful of procedural shapes for tests and demos.

pub mod point;
pub mod mesh;
pub mod error;
pub mod shapes;

pub use point::*;
pub use mesh::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
