//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh with optional per-vertex normals.
///
/// This is what a file loader hands over and what the simplifier flattens
/// back to for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
}

/// Unshared triangles: three positions and three normals per triangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleSoup {
    pub triangles: Vec<[Point3f; 3]>,
    pub normals: Vec<[Vector3f; 3]>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Check that every face index is in range and that normals, when
    /// present, match the vertex count.
    pub fn validate(&self) -> Result<()> {
        if let Some(normals) = &self.normals {
            if normals.len() != self.vertices.len() {
                return Err(Error::MismatchedLengths {
                    what: "vertex normals",
                    expected: self.vertices.len(),
                    actual: normals.len(),
                });
            }
        }
        let vertex_count = self.vertices.len();
        for (face, indices) in self.faces.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i >= vertex_count) {
                return Err(Error::IndexOutOfRange {
                    face,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Interleave positions and normals into render vertices.
    ///
    /// Vertices without a normal get the zero vector.
    pub fn interleaved(&self) -> Vec<NormalPoint3f> {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, &position)| NormalPoint3f {
                position,
                normal: self
                    .normals
                    .as_ref()
                    .and_then(|n| n.get(i).copied())
                    .unwrap_or_else(Vector3f::zeros),
            })
            .collect()
    }

    /// Expand the indexed mesh into a triangle soup.
    pub fn to_soup(&self) -> Result<TriangleSoup> {
        self.validate()?;
        let normal_at = |i: usize| {
            self.normals
                .as_ref()
                .map(|n| n[i])
                .unwrap_or_else(Vector3f::zeros)
        };
        let mut soup = TriangleSoup::with_capacity(self.faces.len());
        for &[a, b, c] in &self.faces {
            soup.push(
                [self.vertices[a], self.vertices[b], self.vertices[c]],
                [normal_at(a), normal_at(b), normal_at(c)],
            );
        }
        Ok(soup)
    }

    /// Calculate face normals; fails on out-of-range face indices.
    pub fn calculate_face_normals(&self) -> Result<Vec<Vector3f>> {
        self.validate()?;
        Ok(self
            .faces
            .iter()
            .map(|&[a, b, c]| triangle_normal(&self.vertices[a], &self.vertices[b], &self.vertices[c]))
            .collect())
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl TriangleSoup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(triangles: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(triangles),
            normals: Vec::with_capacity(triangles),
        }
    }

    /// Append one triangle with its three corner normals.
    pub fn push(&mut self, triangle: [Point3f; 3], normals: [Vector3f; 3]) {
        self.triangles.push(triangle);
        self.normals.push(normals);
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Triangles and normals must pair up one to one.
    pub fn validate(&self) -> Result<()> {
        if self.triangles.len() != self.normals.len() {
            return Err(Error::MismatchedLengths {
                what: "triangle normals",
                expected: self.triangles.len(),
                actual: self.normals.len(),
            });
        }
        Ok(())
    }
}
