//! Quadric error metric
//!
//! A quadric is the symmetric 4x4 matrix `K = p pᵀ` of a plane
//! `p = [a, b, c, d]`; `vᵀ K v` on the homogeneous point `v = [x, y, z, 1]`
//! is the squared distance from the point to the plane. Summing the
//! quadrics of the triangles around a vertex measures how far a moved
//! vertex strays from its original surface.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use nalgebra::{Matrix4, Vector4};
use qemesh_core::{triangle_normal, Point3f, Vector3f};

use crate::half_edge::HalfEdgeId;

/// Accumulated plane quadric of a vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric(Matrix4<f64>);

impl Default for Quadric {
    fn default() -> Self {
        Self(Matrix4::zeros())
    }
}

impl Quadric {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Fundamental quadric of the plane through `point` with unit `normal`.
    /// A zero normal gives the zero quadric.
    pub fn from_plane(normal: &Vector3f, point: &Point3f) -> Self {
        let (a, b, c) = (normal.x as f64, normal.y as f64, normal.z as f64);
        let d = -(a * point.x as f64 + b * point.y as f64 + c * point.z as f64);
        let p = Vector4::new(a, b, c, d);
        Self(p * p.transpose())
    }

    pub fn from_triangle(triangle: &[Point3f; 3]) -> Self {
        let [p1, p2, p3] = triangle;
        Self::from_plane(&triangle_normal(p1, p2, p3), p1)
    }

    /// Sum of the fundamental quadrics of `triangles`.
    pub fn from_triangles(triangles: impl IntoIterator<Item = [Point3f; 3]>) -> Self {
        triangles.into_iter().map(|t| Self::from_triangle(&t)).sum()
    }

    /// `vᵀ Q v` for `v = [x, y, z, 1]`.
    pub fn evaluate(&self, point: &Point3f) -> f64 {
        let v = Vector4::new(point.x as f64, point.y as f64, point.z as f64, 1.0);
        (v.transpose() * self.0 * v)[0]
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }
}

impl Add for Quadric {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Quadric {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc + q)
    }
}

/// Cost of collapsing one half-edge, and where the merged vertex goes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollapseCandidate {
    pub edge: HalfEdgeId,
    pub merge_position: Point3f,
    pub error: f64,
}

impl CollapseCandidate {
    /// Evaluate `far_quadric + own_quadric` at the far endpoint, the own
    /// endpoint and their midpoint, keeping the first smallest in that order.
    ///
    /// `far` is where the half-edge starts and `own` the vertex it points to.
    pub fn evaluate(
        edge: HalfEdgeId,
        far: &Point3f,
        own: &Point3f,
        far_quadric: &Quadric,
        own_quadric: &Quadric,
    ) -> Self {
        let q = *far_quadric + *own_quadric;
        let midpoint = Point3f::from((far.coords + own.coords) * 0.5);

        let mut merge_position = *far;
        let mut error = q.evaluate(far);
        for candidate in [*own, midpoint] {
            let e = q.evaluate(&candidate);
            if e < error {
                merge_position = candidate;
                error = e;
            }
        }

        Self {
            edge,
            merge_position,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ground_plane() -> Quadric {
        Quadric::from_plane(&Vector3f::z(), &Point3f::new(3.0, -2.0, 0.0))
    }

    #[test]
    fn test_plane_quadric_is_squared_distance() {
        let q = ground_plane();
        assert_relative_eq!(q.evaluate(&Point3f::new(5.0, 7.0, 0.0)), 0.0);
        assert_relative_eq!(q.evaluate(&Point3f::new(1.0, 1.0, 2.0)), 4.0);
        assert_relative_eq!(q.evaluate(&Point3f::new(0.0, 0.0, -3.0)), 9.0);
    }

    #[test]
    fn test_quadric_is_symmetric() {
        let q = Quadric::from_plane(
            &Vector3f::new(1.0, 2.0, 2.0).normalize(),
            &Point3f::new(0.5, -1.0, 4.0),
        );
        assert_relative_eq!(*q.matrix(), q.matrix().transpose());
    }

    #[test]
    fn test_degenerate_triangle_contributes_nothing() {
        let p = Point3f::new(1.0, 2.0, 3.0);
        assert_eq!(Quadric::from_triangle(&[p, p, p]), Quadric::zero());
    }

    #[test]
    fn test_sum_of_planes() {
        let x_plane = Quadric::from_plane(&Vector3f::x(), &Point3f::origin());
        let total = ground_plane() + x_plane;
        // distance² to z = 0 plus distance² to x = 0
        assert_relative_eq!(total.evaluate(&Point3f::new(2.0, 5.0, 3.0)), 13.0);

        let mut acc = Quadric::zero();
        acc += ground_plane();
        acc += x_plane;
        assert_eq!(acc, total);
    }

    #[test]
    fn test_from_triangles() {
        let q = Quadric::from_triangles([
            [
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            [
                Point3f::new(0.0, 0.0, 1.0),
                Point3f::new(1.0, 0.0, 1.0),
                Point3f::new(0.0, 1.0, 1.0),
            ],
        ]);
        // Halfway between two parallel planes one unit apart
        assert_relative_eq!(q.evaluate(&Point3f::new(0.3, 0.3, 0.5)), 0.5);
    }

    #[test]
    fn test_candidate_prefers_midpoint() {
        let a = Point3f::new(0.0, 0.0, -1.0);
        let b = Point3f::new(0.0, 0.0, 1.0);
        let c = CollapseCandidate::evaluate(
            HalfEdgeId::new(0),
            &a,
            &b,
            &ground_plane(),
            &Quadric::zero(),
        );
        assert_eq!(c.merge_position, Point3f::origin());
        assert_relative_eq!(c.error, 0.0);
    }

    #[test]
    fn test_candidate_prefers_own_endpoint() {
        let far = Point3f::new(0.0, 0.0, 2.0);
        let own = Point3f::new(0.0, 0.0, 0.0);
        let c = CollapseCandidate::evaluate(
            HalfEdgeId::new(0),
            &far,
            &own,
            &ground_plane(),
            &ground_plane(),
        );
        assert_eq!(c.merge_position, own);
        assert_relative_eq!(c.error, 0.0);
    }

    #[test]
    fn test_candidate_ties_keep_far_endpoint() {
        let far = Point3f::new(0.0, 0.0, 0.0);
        let own = Point3f::new(4.0, 0.0, 0.0);
        // Everything lies on the plane, every candidate costs zero
        let c = CollapseCandidate::evaluate(
            HalfEdgeId::new(0),
            &far,
            &own,
            &ground_plane(),
            &ground_plane(),
        );
        assert_eq!(c.merge_position, far);
        assert_eq!(c.error, 0.0);
    }
}
