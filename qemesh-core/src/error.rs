//! Error types for qemesh

use thiserror::Error;

/// Main error type for qemesh operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Face {face} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        face: usize,
        index: usize,
        vertex_count: usize,
    },

    #[error("Mismatched {what}: expected {expected}, got {actual}")]
    MismatchedLengths {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Mesh has no faces")]
    EmptyMesh,

    #[error("Broken topology: {0}")]
    Topology(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for qemesh operations
pub type Result<T> = std::result::Result<T, Error>;
