//! Half-edge connectivity for triangle meshes
//!
//! Vertices, faces and half-edges live in index arenas. Removed elements
//! leave a tombstone (`None`) behind and their slots are never reused, so a
//! handle held elsewhere either resolves to the element it was issued for or
//! to nothing at all.
//!
//! Triangles are not welded at construction: every input triangle owns its
//! three vertices, and neighboring triangles are joined only through
//! opposite half-edges. Contracting an edge moves all surviving vertices of
//! both endpoints onto the merge position, so one geometric vertex is the set
//! of vertex records sharing a position.

use std::collections::{HashMap, HashSet};

use qemesh_core::{
    normalize_or_zero, triangle_normal, Error, Point3f, Result, TriangleMesh, TriangleSoup,
    Vector3f,
};
use tracing::debug;

/// Handle to a vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(usize);

/// Handle to a half-edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalfEdgeId(usize);

/// Handle to a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(usize);

impl VertexId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl HalfEdgeId {
    pub fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }
}

impl FaceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Hashable bit pattern of a position.
///
/// Positions that converged through a collapse are bit-identical, so exact
/// comparison is what we want here. `-0.0` is folded onto `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionKey([u32; 3]);

impl PositionKey {
    pub fn new(p: &Point3f) -> Self {
        Self([(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits(), (p.z + 0.0).to_bits()])
    }
}

impl From<&Point3f> for PositionKey {
    fn from(p: &Point3f) -> Self {
        Self::new(p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: Point3f,
    /// Shading normal, overwritten by [`HalfEdgeMesh::flatten`].
    pub normal: Vector3f,
    /// A half-edge pointing to this vertex.
    pub half_edge: Option<HalfEdgeId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub half_edge: Option<HalfEdgeId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfEdge {
    /// Vertex this half-edge points to.
    pub vertex: VertexId,
    pub face: Option<FaceId>,
    /// Next half-edge around the same face.
    pub next: HalfEdgeId,
    /// Twin on the adjacent face; `None` on a boundary.
    pub opposite: Option<HalfEdgeId>,
}

/// Triangle-only half-edge mesh.
#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    vertices: Vec<Option<Vertex>>,
    faces: Vec<Option<Face>>,
    half_edges: Vec<Option<HalfEdge>>,
    live_vertices: usize,
    live_faces: usize,
    live_half_edges: usize,
}

impl HalfEdgeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_capacity(triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(triangles * 3),
            faces: Vec::with_capacity(triangles),
            half_edges: Vec::with_capacity(triangles * 3),
            ..Self::default()
        }
    }

    /// Build from parallel sequences of triangles and per-corner normals.
    ///
    /// Fails without building anything when the sequences differ in length.
    pub fn from_triangles(triangles: &[[Point3f; 3]], normals: &[[Vector3f; 3]]) -> Result<Self> {
        if triangles.len() != normals.len() {
            return Err(Error::MismatchedLengths {
                what: "triangle normals",
                expected: triangles.len(),
                actual: normals.len(),
            });
        }
        let mut mesh = Self::with_capacity(triangles.len());
        for (positions, corner_normals) in triangles.iter().zip(normals) {
            mesh.add_triangle(positions, corner_normals);
        }
        mesh.connect_opposites();
        Ok(mesh)
    }

    pub fn from_soup(soup: &TriangleSoup) -> Result<Self> {
        soup.validate()?;
        Self::from_triangles(&soup.triangles, &soup.normals)
    }

    /// Build from an indexed mesh. Shared indices are split into one vertex
    /// per triangle corner like any other input.
    pub fn from_triangle_mesh(mesh: &TriangleMesh) -> Result<Self> {
        Self::from_soup(&mesh.to_soup()?)
    }

    fn add_triangle(&mut self, positions: &[Point3f; 3], normals: &[Vector3f; 3]) -> FaceId {
        let first_vertex = self.vertices.len();
        let first_edge = self.half_edges.len();
        let face = FaceId(self.faces.len());

        for corner in 0..3 {
            self.vertices.push(Some(Vertex {
                position: positions[corner],
                normal: normals[corner],
                half_edge: Some(HalfEdgeId(first_edge + corner)),
            }));
            self.half_edges.push(Some(HalfEdge {
                vertex: VertexId(first_vertex + corner),
                face: Some(face),
                next: HalfEdgeId(first_edge + (corner + 1) % 3),
                opposite: None,
            }));
        }
        self.faces.push(Some(Face {
            half_edge: Some(HalfEdgeId(first_edge)),
        }));

        self.live_vertices += 3;
        self.live_half_edges += 3;
        self.live_faces += 1;
        face
    }

    /// Pair every half-edge with the one running the other way between the
    /// same two positions.
    ///
    /// The first half-edge seen is parked under its (tail, head) key, which is
    /// exactly the (head, tail) lookup its twin performs. Once paired the entry
    /// is dropped, so a third half-edge on a non-manifold edge starts over
    /// instead of stealing an existing twin.
    fn connect_opposites(&mut self) {
        let mut pending: HashMap<(PositionKey, PositionKey), HalfEdgeId> =
            HashMap::with_capacity(self.half_edges.len());

        for index in 0..self.half_edges.len() {
            let id = HalfEdgeId(index);
            let Some((tail, head)) = self.edge_positions(id) else {
                continue;
            };
            let (tail, head) = (PositionKey::new(&tail), PositionKey::new(&head));

            if let Some(twin) = pending.remove(&(head, tail)) {
                self.link_opposites(id, twin);
            } else {
                pending.entry((tail, head)).or_insert(id);
            }
        }
    }

    fn link_opposites(&mut self, a: HalfEdgeId, b: HalfEdgeId) {
        if let Some(he) = self.half_edge_mut(a) {
            he.opposite = Some(b);
        }
        if let Some(he) = self.half_edge_mut(b) {
            he.opposite = Some(a);
        }
    }

    // ------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.0)?.as_ref()
    }

    fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(id.0)?.as_mut()
    }

    pub fn half_edge(&self, id: HalfEdgeId) -> Option<&HalfEdge> {
        self.half_edges.get(id.0)?.as_ref()
    }

    fn half_edge_mut(&mut self, id: HalfEdgeId) -> Option<&mut HalfEdge> {
        self.half_edges.get_mut(id.0)?.as_mut()
    }

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id.0)?.as_ref()
    }

    /// Live vertex records.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (VertexId(i), v)))
    }

    /// Live half-edges.
    pub fn half_edges(&self) -> impl Iterator<Item = (HalfEdgeId, &HalfEdge)> + '_ {
        self.half_edges
            .iter()
            .enumerate()
            .filter_map(|(i, he)| he.as_ref().map(|he| (HalfEdgeId(i), he)))
    }

    /// Live faces.
    pub fn faces(&self) -> impl Iterator<Item = (FaceId, &Face)> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (FaceId(i), f)))
    }

    pub fn face_count(&self) -> usize {
        self.live_faces
    }

    pub fn half_edge_count(&self) -> usize {
        self.live_half_edges
    }

    /// Number of live vertex records (three per face, see module docs).
    pub fn vertex_count(&self) -> usize {
        self.live_vertices
    }

    /// Number of distinct live vertex positions, i.e. geometric vertices.
    pub fn position_count(&self) -> usize {
        self.vertices()
            .map(|(_, v)| PositionKey::new(&v.position))
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of undirected edges; a twin pair counts once.
    pub fn edge_count(&self) -> usize {
        self.half_edges()
            .filter(|(id, he)| he.opposite.map_or(true, |o| o > *id))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.live_faces == 0
    }

    /// Whether `id` still borders a face that has not been removed.
    pub fn is_live(&self, id: HalfEdgeId) -> bool {
        self.half_edge(id)
            .and_then(|he| he.face)
            .and_then(|f| self.face(f))
            .is_some_and(|f| f.half_edge.is_some())
    }

    pub fn is_boundary(&self, id: HalfEdgeId) -> bool {
        self.is_live(id) && self.half_edge(id).is_some_and(|he| he.opposite.is_none())
    }

    pub fn position(&self, id: VertexId) -> Option<Point3f> {
        self.vertex(id).map(|v| v.position)
    }

    /// Vertex the half-edge starts from (`next.next.vertex`).
    pub fn source(&self, id: HalfEdgeId) -> Option<VertexId> {
        let next = self.half_edge(id)?.next;
        let prev = self.half_edge(next)?.next;
        self.half_edge(prev).map(|he| he.vertex)
    }

    /// `(from, to)` positions of a half-edge.
    pub fn edge_positions(&self, id: HalfEdgeId) -> Option<(Point3f, Point3f)> {
        let to = self.position(self.half_edge(id)?.vertex)?;
        let from = self.position(self.source(id)?)?;
        Some((from, to))
    }

    pub fn face_half_edges(&self, id: FaceId) -> Option<[HalfEdgeId; 3]> {
        let e1 = self.face(id)?.half_edge?;
        let e2 = self.half_edge(e1)?.next;
        let e3 = self.half_edge(e2)?.next;
        Some([e1, e2, e3])
    }

    pub fn face_vertices(&self, id: FaceId) -> Option<[VertexId; 3]> {
        let [e1, e2, e3] = self.face_half_edges(id)?;
        Some([
            self.half_edge(e1)?.vertex,
            self.half_edge(e2)?.vertex,
            self.half_edge(e3)?.vertex,
        ])
    }

    /// Corner positions of the face bordered by `id`, starting at the vertex
    /// `id` points to and following `next`.
    pub fn face_positions(&self, id: HalfEdgeId) -> Option<[Point3f; 3]> {
        let e1 = self.half_edge(id)?;
        let e2 = self.half_edge(e1.next)?;
        let e3 = self.half_edge(e2.next)?;
        Some([
            self.position(e1.vertex)?,
            self.position(e2.vertex)?,
            self.position(e3.vertex)?,
        ])
    }

    pub fn face_normal(&self, id: FaceId) -> Option<Vector3f> {
        let [a, b, c] = self.face_vertices(id)?;
        Some(triangle_normal(
            &self.position(a)?,
            &self.position(b)?,
            &self.position(c)?,
        ))
    }

    /// Faces a contraction of `id` would delete: its own, plus the opposite
    /// one when that is still live and distinct.
    pub fn faces_removed_by(&self, id: HalfEdgeId) -> usize {
        let Some(he) = self.half_edge(id).filter(|_| self.is_live(id)) else {
            return 0;
        };
        let opposite_face = he
            .opposite
            .filter(|&o| self.is_live(o))
            .and_then(|o| self.half_edge(o))
            .and_then(|twin| twin.face);
        1 + usize::from(opposite_face.is_some_and(|f| Some(f) != he.face))
    }

    /// All half-edges pointing to `vertex`.
    ///
    /// Walks `opposite.next.next` around the fan from the vertex anchor. If the
    /// walk hits a half-edge without a twin it falls back to scanning every
    /// half-edge for one that points to the same position. The fallback on a
    /// non-manifold vertex returns whatever edges match, in arena order.
    pub fn edges_pointing_to(&self, vertex: VertexId) -> Vec<HalfEdgeId> {
        if let Some(fan) = self.walk_fan(vertex) {
            return fan;
        }
        let Some(target) = self.position(vertex) else {
            return Vec::new();
        };
        debug!(
            vertex = vertex.index(),
            position = ?target,
            "incomplete vertex fan, scanning all half-edges"
        );
        self.half_edges()
            .filter(|(_, he)| self.position(he.vertex) == Some(target))
            .map(|(id, _)| id)
            .collect()
    }

    /// Fan walk without fallback; `None` when the fan is open.
    pub(crate) fn walk_fan(&self, vertex: VertexId) -> Option<Vec<HalfEdgeId>> {
        let start = self.vertex(vertex)?.half_edge?;
        let mut fan = Vec::new();
        let mut current = start;
        loop {
            let opposite = self.half_edge(current)?.opposite?;
            fan.push(current);
            let next = self.half_edge(opposite)?.next;
            current = self.half_edge(next)?.next;
            if current == start {
                return Some(fan);
            }
            // Corrupt twin links could cycle without reaching the anchor
            if fan.len() >= self.live_half_edges {
                return None;
            }
        }
    }

    // ------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------

    /// Remove a vertex record. Half-edges still pointing to it must be
    /// removed by the caller, as triangle removal does.
    pub fn remove_vertex(&mut self, id: VertexId) -> bool {
        match self.vertices.get_mut(id.0).and_then(Option::take) {
            Some(_) => {
                self.live_vertices -= 1;
                true
            }
            None => false,
        }
    }

    /// Remove a half-edge, clearing its twin's back-reference and its
    /// vertex's anchor when the anchor is this half-edge. The twin itself stays.
    pub fn remove_half_edge(&mut self, id: HalfEdgeId) -> bool {
        let Some(removed) = self.half_edges.get_mut(id.0).and_then(Option::take) else {
            return false;
        };
        self.live_half_edges -= 1;
        if let Some(vertex) = self.vertex_mut(removed.vertex) {
            if vertex.half_edge == Some(id) {
                vertex.half_edge = None;
            }
        }
        if let Some(twin) = removed.opposite.and_then(|o| self.half_edge_mut(o)) {
            if twin.opposite == Some(id) {
                twin.opposite = None;
            }
        }
        true
    }

    pub fn remove_face(&mut self, id: FaceId) -> bool {
        let Some(slot) = self.faces.get_mut(id.0) else {
            return false;
        };
        if let Some(face) = slot.as_mut() {
            face.half_edge = None;
        }
        match slot.take() {
            Some(_) => {
                self.live_faces -= 1;
                true
            }
            None => false,
        }
    }

    fn remove_triangle(&mut self, face: FaceId) {
        if let Some(edges) = self.face_half_edges(face) {
            for id in edges {
                if let Some(vertex) = self.half_edge(id).map(|he| he.vertex) {
                    self.remove_vertex(vertex);
                }
                self.remove_half_edge(id);
            }
        }
        self.remove_face(face);
    }

    /// Remove the triangle bordered by `edge` and zip the twins of its other
    /// two sides together so the hole closes.
    fn remove_triangle_and_connect(&mut self, edge: HalfEdgeId) -> Result<()> {
        let missing = || Error::Topology(format!("half-edge {} has no live triangle", edge.index()));
        let he = *self.half_edge(edge).ok_or_else(missing)?;
        let face = he.face.ok_or_else(missing)?;
        let second = *self.half_edge(he.next).ok_or_else(missing)?;
        let third = *self.half_edge(second.next).ok_or_else(missing)?;

        self.remove_triangle(face);

        let outer_second = second.opposite.filter(|&o| self.half_edge(o).is_some());
        let outer_third = third.opposite.filter(|&o| self.half_edge(o).is_some());
        if let Some(a) = outer_second {
            if let Some(twin) = self.half_edge_mut(a) {
                twin.opposite = outer_third.filter(|&b| b != a);
            }
        }
        if let Some(b) = outer_third {
            if let Some(twin) = self.half_edge_mut(b) {
                twin.opposite = outer_second.filter(|&a| a != b);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------
    // Contraction
    // ------------------------------------------------------------

    /// Collapse `edge` onto `merge_position`.
    ///
    /// Deletes the triangle bordering `edge` and, when it is still live, the
    /// one bordering its twin. Every surviving half-edge that pointed to
    /// either endpoint is moved onto `merge_position` and returned; those
    /// are the edges whose collapse costs are now stale.
    pub fn contract_half_edge(
        &mut self,
        edge: HalfEdgeId,
        merge_position: Point3f,
    ) -> Result<Vec<HalfEdgeId>> {
        if !self.is_live(edge) {
            return Err(Error::Algorithm(format!(
                "cannot contract half-edge {}: it borders no live face",
                edge.index()
            )));
        }
        let dangling = || Error::Topology(format!("half-edge {} has a dangling cycle", edge.index()));
        let far = self.source(edge).ok_or_else(dangling)?;
        let he = *self.half_edge(edge).ok_or_else(dangling)?;

        // Fans must be captured before anything is unlinked.
        let far_fan = self.edges_pointing_to(far);
        let own_fan = self.edges_pointing_to(he.vertex);

        self.remove_triangle_and_connect(edge)?;
        if let Some(opposite) = he.opposite.filter(|&o| self.is_live(o)) {
            self.remove_triangle_and_connect(opposite)?;
        }

        let mut seen = HashSet::with_capacity(far_fan.len() + own_fan.len());
        let mut incident = Vec::with_capacity(far_fan.len() + own_fan.len());
        for id in far_fan.into_iter().chain(own_fan) {
            if !self.is_live(id) || !seen.insert(id) {
                continue;
            }
            let Some(vertex) = self.half_edge(id).map(|he| he.vertex) else {
                continue;
            };
            if let Some(v) = self.vertex_mut(vertex) {
                v.position = merge_position;
            }
            incident.push(id);
        }
        Ok(incident)
    }

    // ------------------------------------------------------------
    // Conversion
    // ------------------------------------------------------------

    /// Flatten to an indexed mesh for rendering.
    ///
    /// Face normals are recomputed from the current positions and written to
    /// the face's vertex records. Without `smooth` every face emits three
    /// unshared vertices carrying its flat normal. With `smooth` one vertex is
    /// emitted per distinct position, carrying the average normal of the faces
    /// in its fan; an empty fan yields the zero normal.
    pub fn flatten(&mut self, smooth: bool) -> TriangleMesh {
        let live_faces: Vec<FaceId> = self.faces().map(|(id, _)| id).collect();
        let mut vertices = Vec::new();
        let mut normals = Vec::new();
        let mut faces = Vec::with_capacity(live_faces.len());

        for &face in &live_faces {
            let Some(corners) = self.face_vertices(face) else {
                continue;
            };
            let Some(positions) = self.corner_positions(corners) else {
                continue;
            };
            let normal = triangle_normal(&positions[0], &positions[1], &positions[2]);
            for id in corners {
                if let Some(v) = self.vertex_mut(id) {
                    v.normal = normal;
                }
            }
            if !smooth {
                let base = vertices.len();
                vertices.extend(positions);
                normals.extend([normal; 3]);
                faces.push([base, base + 1, base + 2]);
            }
        }

        if smooth {
            let mut index_of: HashMap<PositionKey, usize> = HashMap::new();
            for (id, vertex) in self.vertices() {
                let key = PositionKey::new(&vertex.position);
                if index_of.contains_key(&key) {
                    continue;
                }
                let fan = self.edges_pointing_to(id);
                let sum = fan
                    .iter()
                    .filter_map(|&e| self.half_edge(e))
                    .filter_map(|he| self.vertex(he.vertex))
                    .fold(Vector3f::zeros(), |acc, v| acc + v.normal);
                index_of.insert(key, vertices.len());
                vertices.push(vertex.position);
                normals.push(normalize_or_zero(sum / fan.len() as f32));
            }

            let lookup = |id: VertexId| {
                self.position(id)
                    .and_then(|p| index_of.get(&PositionKey::new(&p)).copied())
            };
            for &face in &live_faces {
                if let Some([a, b, c]) = self.face_vertices(face) {
                    if let (Some(a), Some(b), Some(c)) = (lookup(a), lookup(b), lookup(c)) {
                        faces.push([a, b, c]);
                    }
                }
            }
        }

        let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
        mesh.normals = Some(normals);
        mesh
    }

    fn corner_positions(&self, corners: [VertexId; 3]) -> Option<[Point3f; 3]> {
        Some([
            self.position(corners[0])?,
            self.position(corners[1])?,
            self.position(corners[2])?,
        ])
    }

    // ------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------

    /// Check the structural invariants:
    /// every face's `next` cycle has period three and agrees on the face,
    /// twins are mutual and live, vertex anchors point to their vertex, and
    /// no live half-edge references a removed element.
    pub fn validate(&self) -> Result<()> {
        let broken = |msg: String| Err(Error::Topology(msg));

        for (face_id, face) in self.faces() {
            let Some(start) = face.half_edge else {
                return broken(format!("live face {} has no anchor", face_id.index()));
            };
            let mut current = start;
            for step in 0..3 {
                let Some(he) = self.half_edge(current) else {
                    return broken(format!(
                        "face {} reaches removed half-edge {}",
                        face_id.index(),
                        current.index()
                    ));
                };
                if he.face != Some(face_id) {
                    return broken(format!(
                        "half-edge {} in the cycle of face {} borders {:?}",
                        current.index(),
                        face_id.index(),
                        he.face
                    ));
                }
                current = he.next;
                if step < 2 && current == start {
                    return broken(format!("face {} cycle is shorter than three", face_id.index()));
                }
            }
            if current != start {
                return broken(format!("face {} cycle does not close", face_id.index()));
            }
        }

        for (id, he) in self.half_edges() {
            if self.vertex(he.vertex).is_none() {
                return broken(format!("half-edge {} points to a removed vertex", id.index()));
            }
            if self.half_edge(he.next).is_none() {
                return broken(format!("half-edge {} has a removed next", id.index()));
            }
            if he.face.and_then(|f| self.face(f)).is_none() {
                return broken(format!("half-edge {} borders no live face", id.index()));
            }
            if let Some(o) = he.opposite {
                match self.half_edge(o) {
                    Some(twin) if twin.opposite == Some(id) => {}
                    Some(_) => {
                        return broken(format!("half-edge {} and {} are not mutual twins", id.index(), o.index()))
                    }
                    None => {
                        return broken(format!("half-edge {} has a removed opposite", id.index()))
                    }
                }
            }
        }

        for (id, vertex) in self.vertices() {
            if let Some(anchor) = vertex.half_edge {
                if self.half_edge(anchor).map(|he| he.vertex) != Some(id) {
                    return broken(format!(
                        "vertex {} anchor {} does not point to it",
                        id.index(),
                        anchor.index()
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use qemesh_core::shapes;

    fn single_triangle() -> HalfEdgeMesh {
        HalfEdgeMesh::from_triangles(
            &[[
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ]],
            &[[Vector3f::zeros(); 3]],
        )
        .unwrap()
    }

    fn tetrahedron() -> HalfEdgeMesh {
        HalfEdgeMesh::from_triangle_mesh(&shapes::tetrahedron()).unwrap()
    }

    // ---- Construction tests ----

    #[test]
    fn test_single_triangle_construction() {
        let mesh = single_triangle();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.half_edge_count(), 3);
        assert_eq!(mesh.vertex_count(), 3);
        for (id, he) in mesh.half_edges() {
            assert!(he.opposite.is_none());
            assert!(mesh.is_boundary(id));
        }
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_mismatched_normals_rejected() {
        let result = HalfEdgeMesh::from_triangles(
            &[[Point3f::origin(); 3], [Point3f::origin(); 3]],
            &[[Vector3f::zeros(); 3]],
        );
        assert!(matches!(
            result,
            Err(Error::MismatchedLengths { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut mesh = shapes::tetrahedron();
        mesh.faces.push([0, 1, 9]);
        assert!(matches!(
            HalfEdgeMesh::from_triangle_mesh(&mesh),
            Err(Error::IndexOutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn test_tetrahedron_twins() {
        let mesh = tetrahedron();
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(mesh.half_edge_count(), 12);
        assert_eq!(mesh.edge_count(), 6);
        assert_eq!(mesh.position_count(), 4);
        for (id, he) in mesh.half_edges() {
            let opposite = he.opposite.expect("closed mesh: every half-edge has a twin");
            assert_eq!(mesh.half_edge(opposite).unwrap().opposite, Some(id));
            let (from, to) = mesh.edge_positions(id).unwrap();
            let (twin_from, twin_to) = mesh.edge_positions(opposite).unwrap();
            assert_eq!((from, to), (twin_to, twin_from));
        }
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_tetrahedron_fan_walk() {
        let mesh = tetrahedron();
        for (id, vertex) in mesh.vertices() {
            let fan = mesh.walk_fan(id).expect("closed fan should not need the fallback");
            assert_eq!(fan.len(), 3);
            for e in &fan {
                let head = mesh.half_edge(*e).unwrap().vertex;
                assert_eq!(mesh.position(head), Some(vertex.position));
            }
            assert_eq!(mesh.edges_pointing_to(id), fan);
        }
    }

    #[test]
    fn test_open_fan_falls_back_to_scan() {
        let grid = shapes::plane_grid(3);
        let mesh = HalfEdgeMesh::from_triangle_mesh(&grid).unwrap();
        // Corner (0, 0) touches a single triangle
        let corner = mesh
            .vertices()
            .find(|(_, v)| v.position == Point3f::new(0.0, 0.0, 0.0))
            .map(|(id, _)| id)
            .unwrap();
        assert!(mesh.walk_fan(corner).is_none());
        assert_eq!(mesh.edges_pointing_to(corner).len(), 1);

        // Interior vertex (1, 1) is closed
        let center = mesh
            .vertices()
            .find(|(_, v)| v.position == Point3f::new(1.0, 1.0, 0.0))
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(mesh.walk_fan(center).map(|f| f.len()), Some(6));
    }

    // ---- Flatten tests ----

    #[test]
    fn test_flatten_single_triangle() {
        let mut mesh = single_triangle();
        let flat = mesh.flatten(false);
        assert_eq!(flat.face_count(), 1);
        assert_eq!(flat.vertex_count(), 3);
        let normals = flat.normals.as_ref().unwrap();
        let expected = flat.calculate_face_normals().unwrap()[0];
        assert_relative_eq!(expected, Vector3f::new(0.0, 0.0, 1.0));
        for n in normals {
            assert_relative_eq!(*n, expected);
        }
    }

    #[test]
    fn test_flatten_reversed_winding_flips_normal() {
        let mut mesh = HalfEdgeMesh::from_triangles(
            &[[
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
            ]],
            &[[Vector3f::zeros(); 3]],
        )
        .unwrap();
        let flat = mesh.flatten(false);
        assert_relative_eq!(flat.normals.unwrap()[0], Vector3f::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let mut mesh = HalfEdgeMesh::from_triangle_mesh(&shapes::icosphere(1)).unwrap();
        assert_eq!(mesh.flatten(false), mesh.flatten(false));
        assert_eq!(mesh.flatten(true), mesh.flatten(true));
    }

    #[test]
    fn test_flatten_smooth_shares_positions() {
        let mut mesh = HalfEdgeMesh::from_triangle_mesh(&shapes::octahedron()).unwrap();
        let smooth = mesh.flatten(true);
        assert_eq!(smooth.vertex_count(), 6);
        assert_eq!(smooth.face_count(), 8);
        assert!(smooth.validate().is_ok());
        // Octahedron vertex normals point straight out
        for (p, n) in smooth.vertices.iter().zip(smooth.normals.as_ref().unwrap()) {
            assert_relative_eq!(*n, p.coords.normalize(), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_flatten_degenerate_face_has_zero_normal() {
        let p = Point3f::new(1.0, 1.0, 1.0);
        let mut mesh = HalfEdgeMesh::from_triangles(&[[p, p, p]], &[[Vector3f::z(); 3]]).unwrap();
        let flat = mesh.flatten(false);
        assert_eq!(flat.normals.as_ref().unwrap()[0], Vector3f::zeros());
        let smooth = mesh.flatten(true);
        assert_eq!(smooth.vertex_count(), 1);
        assert_eq!(smooth.normals.unwrap()[0], Vector3f::zeros());
    }

    // ---- Removal and contraction tests ----

    #[test]
    fn test_remove_half_edge_clears_twin() {
        let mut mesh = tetrahedron();
        let (id, he) = mesh.half_edges().next().map(|(id, he)| (id, *he)).unwrap();
        let twin = he.opposite.unwrap();
        assert!(mesh.remove_half_edge(id));
        assert!(!mesh.remove_half_edge(id));
        assert_eq!(mesh.half_edge(twin).unwrap().opposite, None);
        assert_eq!(mesh.half_edge_count(), 11);
    }

    #[test]
    fn test_remove_half_edge_clears_vertex_anchor() {
        let mut mesh = single_triangle();
        let (id, vertex) = mesh
            .half_edges()
            .next()
            .map(|(id, he)| (id, he.vertex))
            .unwrap();
        assert_eq!(mesh.vertex(vertex).unwrap().half_edge, Some(id));

        assert!(mesh.remove_half_edge(id));
        assert_eq!(mesh.vertex(vertex).unwrap().half_edge, None);
        // The anchor-less vertex falls back to the scan instead of walking a dead slot
        assert!(mesh.walk_fan(vertex).is_none());
        assert!(mesh.edges_pointing_to(vertex).is_empty());
    }

    #[test]
    fn test_remove_face() {
        let mut mesh = single_triangle();
        let face = mesh.faces().next().map(|(id, _)| id).unwrap();
        assert!(mesh.remove_face(face));
        assert!(mesh.face(face).is_none());
        assert_eq!(mesh.face_count(), 0);
        for (id, _) in mesh.half_edges() {
            assert!(!mesh.is_live(id));
        }
    }

    #[test]
    fn test_contract_tetrahedron_edge() {
        let mut mesh = tetrahedron();
        let edge = mesh.half_edges().next().map(|(id, _)| id).unwrap();
        let (from, to) = mesh.edge_positions(edge).unwrap();
        let merge = Point3f::from((from.coords + to.coords) * 0.5);

        let incident = mesh.contract_half_edge(edge, merge).unwrap();

        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.position_count(), 3);
        assert!(mesh.validate().is_ok());
        assert!(!incident.is_empty());
        for id in &incident {
            assert!(mesh.is_live(*id));
            let head = mesh.half_edge(*id).unwrap().vertex;
            assert_eq!(mesh.position(head), Some(merge));
        }
        // Nothing still sits at the old endpoints
        for (_, v) in mesh.vertices() {
            assert_ne!(v.position, from);
            assert_ne!(v.position, to);
        }
    }

    #[test]
    fn test_contract_boundary_edge_removes_one_face() {
        let mut mesh = HalfEdgeMesh::from_triangle_mesh(&shapes::plane_grid(3)).unwrap();
        let before = mesh.face_count();
        let boundary = mesh
            .half_edges()
            .map(|(id, _)| id)
            .find(|&id| mesh.is_boundary(id))
            .unwrap();
        assert_eq!(mesh.faces_removed_by(boundary), 1);
        let (_, to) = mesh.edge_positions(boundary).unwrap();
        mesh.contract_half_edge(boundary, to).unwrap();
        assert_eq!(mesh.face_count(), before - 1);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_contract_dead_edge_fails() {
        let mut mesh = tetrahedron();
        let edge = mesh.half_edges().next().map(|(id, _)| id).unwrap();
        mesh.contract_half_edge(edge, Point3f::origin()).unwrap();
        assert!(matches!(
            mesh.contract_half_edge(edge, Point3f::origin()),
            Err(Error::Algorithm(_))
        ));
    }

    #[test]
    fn test_repeated_contraction_keeps_invariants() {
        let mut mesh = HalfEdgeMesh::from_triangle_mesh(&shapes::icosphere(1)).unwrap();
        for _ in 0..20 {
            let edge = mesh
                .half_edges()
                .map(|(id, _)| id)
                .find(|&id| mesh.is_live(id))
                .unwrap();
            let before = mesh.face_count();
            let removes = mesh.faces_removed_by(edge);
            let (_, to) = mesh.edge_positions(edge).unwrap();
            mesh.contract_half_edge(edge, to).unwrap();
            assert_eq!(mesh.face_count(), before - removes);
            assert!(mesh.validate().is_ok());
        }
    }

    #[test]
    fn test_position_key_folds_negative_zero() {
        let a = PositionKey::new(&Point3f::new(0.0, -0.0, 1.0));
        let b = PositionKey::new(&Point3f::new(-0.0, 0.0, 1.0));
        assert_eq!(a, b);
    }
}
