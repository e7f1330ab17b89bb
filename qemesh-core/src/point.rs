//! Point types and related functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use bytemuck::{Pod, Zeroable};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A render vertex: position plus shading normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct NormalPoint3f {
    pub position: Point3f,
    pub normal: Vector3f,
}

unsafe impl Pod for NormalPoint3f {}
unsafe impl Zeroable for NormalPoint3f {}

impl Default for NormalPoint3f {
    fn default() -> Self {
        Self {
            position: Point3f::origin(),
            normal: Vector3f::new(0.0, 0.0, 1.0),
        }
    }
}

/// Normalize `v`, substituting the zero vector when the result is not finite
/// (zero-length input, degenerate triangle).
pub fn normalize_or_zero(v: Vector3f) -> Vector3f {
    let n = v.normalize();
    if n.iter().all(|x| x.is_finite()) {
        n
    } else {
        Vector3f::zeros()
    }
}

/// Unit normal of the triangle `(p1, p2, p3)` using the right-hand rule on
/// `(p2 - p1) x (p3 - p1)`. Degenerate triangles yield the zero vector.
pub fn triangle_normal(p1: &Point3f, p2: &Point3f, p3: &Point3f) -> Vector3f {
    normalize_or_zero((p2 - p1).cross(&(p3 - p1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_triangle_normal_ccw() {
        let n = triangle_normal(
            &Point3f::new(0.0, 0.0, 0.0),
            &Point3f::new(1.0, 0.0, 0.0),
            &Point3f::new(0.0, 1.0, 0.0),
        );
        assert_relative_eq!(n, Vector3f::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_triangle_normal_degenerate() {
        let p = Point3f::new(1.0, 2.0, 3.0);
        assert_eq!(triangle_normal(&p, &p, &p), Vector3f::zeros());
        let collinear = triangle_normal(
            &Point3f::new(0.0, 0.0, 0.0),
            &Point3f::new(1.0, 0.0, 0.0),
            &Point3f::new(2.0, 0.0, 0.0),
        );
        assert_eq!(collinear, Vector3f::zeros());
    }

    #[test]
    fn test_normal_point_is_pod() {
        let v = NormalPoint3f::default();
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 6 * std::mem::size_of::<f32>());
    }
}
