//! Procedural test and demo meshes

use std::collections::HashMap;

use crate::mesh::TriangleMesh;
use crate::point::Point3f;

/// Consistently wound tetrahedron: each shared edge appears in opposite directions.
pub fn tetrahedron() -> TriangleMesh {
    TriangleMesh::from_vertices_and_faces(
        vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.5, 1.0, 0.0),
            Point3f::new(0.5, 0.5, 1.0),
        ],
        vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
    )
}

/// Unit octahedron with outward-facing triangles.
pub fn octahedron() -> TriangleMesh {
    TriangleMesh::from_vertices_and_faces(
        vec![
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(-1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
            Point3f::new(0.0, -1.0, 0.0),
            Point3f::new(0.0, 0.0, 1.0),
            Point3f::new(0.0, 0.0, -1.0),
        ],
        vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ],
    )
}

/// Unit icosphere: an icosahedron split `subdivisions` times, 20 * 4^n faces.
pub fn icosphere(subdivisions: u32) -> TriangleMesh {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let mut vertices: Vec<Point3f> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Point3f::from(Point3f::new(x, y, z).coords.normalize()))
    .collect();

    let mut faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Point3f>| {
            *midpoints.entry((a.min(b), a.max(b))).or_insert_with(|| {
                let m = (vertices[a].coords + vertices[b].coords).normalize();
                vertices.push(Point3f::from(m));
                vertices.len() - 1
            })
        };
        let mut next = Vec::with_capacity(faces.len() * 4);
        for &[a, b, c] in &faces {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            next.push([a, ab, ca]);
            next.push([b, bc, ab]);
            next.push([c, ca, bc]);
            next.push([ab, bc, ca]);
        }
        faces = next;
    }

    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

/// Flat `size` x `size` vertex grid in the z = 0 plane with unit spacing.
pub fn plane_grid(size: usize) -> TriangleMesh {
    height_grid(size, |_, _| 0.0)
}

/// Grid with a single sine bump, z = 2 sin(pi u) sin(pi v).
pub fn curved_grid(size: usize) -> TriangleMesh {
    let span = (size.max(2) - 1) as f32;
    height_grid(size, |x, y| {
        let fx = x / span * std::f32::consts::PI;
        let fy = y / span * std::f32::consts::PI;
        (fx.sin() * fy.sin()) * 2.0
    })
}

fn height_grid(size: usize, height: impl Fn(f32, f32) -> f32) -> TriangleMesh {
    let mut vertices = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let (fx, fy) = (x as f32, y as f32);
            vertices.push(Point3f::new(fx, fy, height(fx, fy)));
        }
    }
    let mut faces = Vec::new();
    for y in 0..size.saturating_sub(1) {
        for x in 0..size.saturating_sub(1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            let br = bl + 1;
            faces.push([tl, bl, tr]);
            faces.push([tr, bl, br]);
        }
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}
