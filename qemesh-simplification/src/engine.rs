//! Incremental edge-collapse simplification
//!
//! The engine keeps one collapse candidate per live half-edge in an indexed
//! priority queue ordered by ascending quadric error. Each collapse replaces
//! the candidates of the edges around the merged vertex; candidates of edges
//! that disappeared stay in the queue and are skimmed off when the next best
//! candidate is drawn.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use priority_queue::PriorityQueue;
use qemesh_core::{Error, Point3f, Result, TriangleMesh};
use tracing::{debug, info, trace};

use crate::config::SimplifyConfig;
use crate::half_edge::{HalfEdgeId, HalfEdgeMesh, PositionKey, VertexId};
use crate::quadric::{CollapseCandidate, Quadric};

/// Queue priority of a candidate: lowest error first, then the candidate
/// queued earliest.
#[derive(Debug, Clone, Copy)]
pub struct QueuedCollapse {
    pub candidate: CollapseCandidate,
    sequence: u64,
}

impl PartialEq for QueuedCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for QueuedCollapse {}

impl PartialOrd for QueuedCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCollapse {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-queue: smallest error, then smallest sequence, is greatest
        other
            .candidate
            .error
            .total_cmp(&self.candidate.error)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// Why a batch ended before spending its edge budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    /// The mesh is at the face floor, or the next collapse would go below it.
    FaceFloor { faces: usize },
    /// The best remaining candidate costs more than the batch allows.
    ErrorCeiling { error: f64, max_error: f64 },
    /// No live candidate remains; with a zero floor this is how a fully
    /// collapsed mesh reports.
    Exhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FaceFloor { faces } => write!(f, "face floor reached at {} faces", faces),
            Self::ErrorCeiling { error, max_error } => {
                write!(f, "next collapse error {:e} exceeds {:e}", error, max_error)
            }
            Self::Exhausted => write!(f, "no collapse candidates left"),
        }
    }
}

/// Result of [`SimplificationEngine::simplify_batch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplifyOutcome {
    pub collapsed: usize,
    /// `None` when the whole edge budget was spent.
    pub stop: Option<StopReason>,
}

impl SimplifyOutcome {
    pub fn is_complete(&self) -> bool {
        self.stop.is_none()
    }
}

/// Greedy QEM edge-collapse driver over an owned [`HalfEdgeMesh`].
#[derive(Debug)]
pub struct SimplificationEngine {
    mesh: HalfEdgeMesh,
    config: SimplifyConfig,
    /// Vertex quadrics keyed by position, so converged vertex records share one.
    quadrics: HashMap<PositionKey, Quadric>,
    queue: PriorityQueue<HalfEdgeId, QueuedCollapse>,
    current: Option<CollapseCandidate>,
    next_suggested: Option<(Point3f, Point3f)>,
    sequence: u64,
    collapses: usize,
}

impl SimplificationEngine {
    pub fn new(mesh: HalfEdgeMesh) -> Result<Self> {
        Self::with_config(mesh, SimplifyConfig::default())
    }

    /// Compute every vertex quadric and every half-edge candidate, then draw
    /// the first best candidate.
    pub fn with_config(mesh: HalfEdgeMesh, config: SimplifyConfig) -> Result<Self> {
        if mesh.is_empty() {
            return Err(Error::EmptyMesh);
        }

        let mut engine = Self {
            queue: PriorityQueue::with_capacity(mesh.half_edge_count()),
            mesh,
            config,
            quadrics: HashMap::new(),
            current: None,
            next_suggested: None,
            sequence: 0,
            collapses: 0,
        };

        let vertices: Vec<VertexId> = engine.mesh.vertices().map(|(id, _)| id).collect();
        for vertex in vertices {
            engine.quadric_at(vertex);
        }
        let edges: Vec<HalfEdgeId> = engine.mesh.half_edges().map(|(id, _)| id).collect();
        for edge in edges {
            engine.refresh_candidate(edge);
        }

        info!(
            vertices = engine.mesh.vertex_count(),
            positions = engine.quadrics.len(),
            faces = engine.mesh.face_count(),
            candidates = engine.queue.len(),
            "simplification engine initialized"
        );

        engine.reseed();
        Ok(engine)
    }

    pub fn mesh(&self) -> &HalfEdgeMesh {
        &self.mesh
    }

    pub fn into_mesh(self) -> HalfEdgeMesh {
        self.mesh
    }

    pub fn config(&self) -> &SimplifyConfig {
        &self.config
    }

    /// Re-flatten the simplified mesh for rendering.
    pub fn flatten(&mut self, smooth: bool) -> TriangleMesh {
        self.mesh.flatten(smooth)
    }

    /// The best candidate not yet applied.
    pub fn current_candidate(&self) -> Option<&CollapseCandidate> {
        self.current.as_ref()
    }

    /// Endpoints of the current best candidate as `(from, to)`: the vertex
    /// its half-edge starts at, then the vertex it points to. Only for
    /// highlighting; it does not affect simplification.
    pub fn next_suggested_edge(&self) -> Option<(Point3f, Point3f)> {
        self.next_suggested
    }

    /// Collapses performed over the engine's lifetime.
    pub fn collapse_count(&self) -> usize {
        self.collapses
    }

    /// Queued candidate records, including stale ones not yet skimmed off.
    pub fn queued_candidates(&self) -> usize {
        self.queue.len()
    }

    /// Collapse up to `max_edges` edges, cheapest first.
    ///
    /// Stops early at the face floor, when the best candidate costs more
    /// than `max_error`, or when no candidate is left. A stop leaves the mesh
    /// as it was after the last completed collapse.
    pub fn simplify_batch(&mut self, max_edges: usize, max_error: f64) -> Result<SimplifyOutcome> {
        let faces_before = self.mesh.face_count();
        let mut collapsed = 0;
        let mut stop = None;

        while collapsed < max_edges {
            if let Some(reason) = self.stop_reason(max_error) {
                debug!(%reason, collapsed, "simplification batch stopped early");
                stop = Some(reason);
                break;
            }
            self.collapse_current()?;
            collapsed += 1;
        }

        info!(
            collapsed,
            faces_before,
            faces = self.mesh.face_count(),
            complete = stop.is_none(),
            "simplification batch finished"
        );
        Ok(SimplifyOutcome { collapsed, stop })
    }

    fn stop_reason(&self, max_error: f64) -> Option<StopReason> {
        let Some(candidate) = self.current else {
            return Some(StopReason::Exhausted);
        };
        let faces = self.mesh.face_count();
        if faces <= self.config.min_faces {
            return Some(StopReason::FaceFloor { faces });
        }
        let removed = self.mesh.faces_removed_by(candidate.edge);
        if faces.saturating_sub(removed) < self.config.min_faces {
            return Some(StopReason::FaceFloor { faces });
        }
        if candidate.error > max_error {
            return Some(StopReason::ErrorCeiling {
                error: candidate.error,
                max_error,
            });
        }
        None
    }

    fn collapse_current(&mut self) -> Result<()> {
        let Some(candidate) = self.current else {
            return Err(Error::Algorithm("no collapse candidate to apply".to_string()));
        };

        if let Some((from, to)) = self.mesh.edge_positions(candidate.edge) {
            self.quadrics.remove(&PositionKey::new(&from));
            self.quadrics.remove(&PositionKey::new(&to));
        }

        let incident = self
            .mesh
            .contract_half_edge(candidate.edge, candidate.merge_position)?;

        if !incident.is_empty() {
            let merged = fan_quadric(&self.mesh, &incident);
            self.quadrics
                .insert(PositionKey::new(&candidate.merge_position), merged);
        }

        // Edges arriving at the merged vertex, and the ones leaving it
        for &edge in &incident {
            self.refresh_candidate(edge);
            if let Some(next) = self.mesh.half_edge(edge).map(|he| he.next) {
                self.refresh_candidate(next);
            }
        }

        self.collapses += 1;
        trace!(
            edge = candidate.edge.index(),
            position = ?candidate.merge_position,
            error = candidate.error,
            faces = self.mesh.face_count(),
            "collapsed edge"
        );

        self.reseed();
        Ok(())
    }

    /// Cached quadric of the vertex's position, computed from its fan on a miss.
    fn quadric_at(&mut self, vertex: VertexId) -> Quadric {
        let Some(position) = self.mesh.position(vertex) else {
            return Quadric::zero();
        };
        let mesh = &self.mesh;
        *self
            .quadrics
            .entry(PositionKey::new(&position))
            .or_insert_with(|| fan_quadric(mesh, &mesh.edges_pointing_to(vertex)))
    }

    /// Recompute the candidate of a live half-edge and replace its queued record.
    fn refresh_candidate(&mut self, edge: HalfEdgeId) {
        if !self.mesh.is_live(edge) {
            return;
        }
        let (Some(far), Some(own)) = (
            self.mesh.source(edge),
            self.mesh.half_edge(edge).map(|he| he.vertex),
        ) else {
            return;
        };
        let (Some(far_position), Some(own_position)) =
            (self.mesh.position(far), self.mesh.position(own))
        else {
            return;
        };

        let far_quadric = self.quadric_at(far);
        let own_quadric = self.quadric_at(own);
        let candidate = CollapseCandidate::evaluate(
            edge,
            &far_position,
            &own_position,
            &far_quadric,
            &own_quadric,
        );

        self.sequence += 1;
        self.queue.push(
            edge,
            QueuedCollapse {
                candidate,
                sequence: self.sequence,
            },
        );
    }

    /// Pop until a candidate whose half-edge still borders a live face turns up.
    fn reseed(&mut self) {
        self.current = None;
        while let Some((edge, queued)) = self.queue.pop() {
            if self.mesh.is_live(edge) {
                self.current = Some(queued.candidate);
                break;
            }
        }
        self.next_suggested = self
            .current
            .and_then(|candidate| self.mesh.edge_positions(candidate.edge));
    }
}

/// Sum of the plane quadrics of the live faces bordered by `fan`.
fn fan_quadric(mesh: &HalfEdgeMesh, fan: &[HalfEdgeId]) -> Quadric {
    Quadric::from_triangles(
        fan.iter()
            .filter(|&&edge| mesh.is_live(edge))
            .filter_map(|&edge| mesh.face_positions(edge)),
    )
}
