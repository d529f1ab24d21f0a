//! The kinetic data structure: vertices moving at constant velocity, the
//! triangles watching them, and the skeleton nodes they trace.
//!
//! Everything is allocated from arenas owned by the [`Skeleton`]; triangles
//! and vertices reference each other through plain index ids. Stopped
//! triangles and vertices are kept in the arenas so that the history of the
//! propagation can be inspected after the run.

use crate::error::{SkeletonError, SkeletonResult};
use arrayvec::ArrayVec;
use skel_geom::math::{Point, Vector};
use skel_geom::{Line, WavefrontEdge};

/// Index of the next side / vertex, counter clockwise.
#[inline]
pub fn ccw(i: usize) -> usize {
    (i + 1) % 3
}

/// Index of the next side / vertex, clockwise.
#[inline]
pub fn cw(i: usize) -> usize {
    (i + 2) % 3
}

/// Rotation direction of a fan walk around a vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rotation {
    Cw,
    Ccw,
}

impl Rotation {
    #[inline]
    pub fn apply(self, i: usize) -> usize {
        match self {
            Rotation::Cw => cw(i),
            Rotation::Ccw => ccw(i),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u32);

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriangleId(pub u32);

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WavefrontId(pub u32);

impl std::fmt::Debug for VertexId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "v{}", self.0)
    }
}

impl std::fmt::Debug for TriangleId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "t{}", self.0)
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "n{}", self.0)
    }
}

impl std::fmt::Debug for WavefrontId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "w{}", self.0)
    }
}

/// A node of the output straight skeleton graph.
///
/// Created once, when one or more kinetic vertices stop; never destroyed. A
/// node may acquire more stopping vertices over time.
#[derive(Clone, Debug)]
pub struct SkeletonNode {
    pub pos: Point,
    /// The event-loop step that created this node (-1 for input vertices).
    pub step: i32,
    /// The info of the input vertex this node was created for, if any.
    pub info: Option<u32>,
}

/// One entry of a time-indexed neighbour log: `vertex` is the neighbour from
/// `from` until `to` (`None` while the entry is still open).
#[derive(Copy, Clone, Debug)]
struct LogEntry {
    from: f64,
    to: Option<f64>,
    vertex: VertexId,
}

/// Append-only log of the wavefront neighbours of a kinetic vertex, so that
/// the circular list can be reconstructed at any past time.
#[derive(Clone, Debug, Default)]
pub struct NeighbourLog {
    entries: Vec<LogEntry>,
}

impl NeighbourLog {
    /// The current neighbour.
    pub fn current(&self) -> Option<VertexId> {
        self.entries.last().map(|e| e.vertex)
    }

    /// The neighbour at time `t`.
    pub fn at(&self, t: f64) -> Option<VertexId> {
        for e in &self.entries {
            let open_at_t = match e.to {
                Some(to) => e.from <= t && to > t,
                None => e.from <= t,
            };
            if open_at_t {
                return Some(e.vertex);
            }
        }
        None
    }

    /// Record `vertex` as the neighbour from time `now` on, closing the
    /// validity interval of the previous entry.
    pub fn set(&mut self, vertex: VertexId, now: f64) {
        if let Some(last) = self.entries.last_mut() {
            last.to = Some(now);
        }
        self.entries.push(LogEntry {
            from: now,
            to: None,
            vertex,
        });
    }

    /// Rewrite the logged ids through an arena compaction map, dropping
    /// entries whose vertex was filtered out.
    fn remap(&mut self, map: &[Option<VertexId>]) {
        self.entries
            .retain_mut(|e| match map[e.vertex.0 as usize] {
                Some(v) => {
                    e.vertex = v;
                    true
                }
                None => false,
            });
    }
}

/// A corner of the propagating wavefront, moving at constant velocity
/// between events.
#[derive(Clone, Debug)]
pub struct KineticVertex {
    /// Position at t = 0 (extrapolated backwards for vertices created later).
    pub origin: Point,
    pub velocity: Vector,
    /// The vertex moves infinitely fast: the two incident wavefront normals
    /// cancel. Such a vertex has no straight trajectory; its velocity is kept
    /// zero and its origin pinned to the node it forms at.
    pub inf_fast: bool,
    pub starts_at: f64,
    pub stops_at: Option<f64>,
    pub start_node: NodeId,
    pub stop_node: Option<NodeId>,
    /// The wavefront edges to the left and right of this vertex.
    pub wfl: WavefrontId,
    pub wfr: WavefrontId,
    /// The supporting lines of those wavefronts at t = 0, kept for
    /// re-deriving velocities after topology surgery.
    pub ul: Line,
    pub ur: Line,
    /// Whether the vertex lies on the interior side of the polygon boundary.
    pub internal: bool,
    /// Stable identifier for logging.
    pub info: u32,
    pub(crate) left: NeighbourLog,
    pub(crate) right: NeighbourLog,
}

impl KineticVertex {
    #[inline]
    pub fn position_at(&self, t: f64) -> Point {
        self.origin + self.velocity * t
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop_node.is_some()
    }

    /// Current wavefront neighbour to the left.
    pub fn left(&self) -> Option<VertexId> {
        self.left.current()
    }

    /// Current wavefront neighbour to the right.
    pub fn right(&self) -> Option<VertexId> {
        self.right.current()
    }

    pub fn left_at(&self, t: f64) -> Option<VertexId> {
        self.left.at(t)
    }

    pub fn right_at(&self, t: f64) -> Option<VertexId> {
        self.right.at(t)
    }
}

/// A vertex of the kinetic triangulation: either a kinetic wavefront corner
/// or the stationary far vertex closing the triangulation around the hull.
#[derive(Clone, Debug)]
pub enum Vertex {
    Kinetic(KineticVertex),
    Stationary { pos: Point },
}

impl Vertex {
    #[inline]
    pub fn position_at(&self, t: f64) -> Point {
        match self {
            Vertex::Kinetic(kv) => kv.position_at(t),
            Vertex::Stationary { pos } => *pos,
        }
    }

    pub fn is_kinetic(&self) -> bool {
        matches!(self, Vertex::Kinetic(_))
    }

    /// Whether the vertex is on the interior side of the input boundary.
    /// The stationary far vertex never is.
    pub fn internal(&self) -> bool {
        match self {
            Vertex::Kinetic(kv) => kv.internal,
            Vertex::Stationary { .. } => false,
        }
    }

    pub fn inf_fast(&self) -> bool {
        match self {
            Vertex::Kinetic(kv) => kv.inf_fast,
            Vertex::Stationary { .. } => false,
        }
    }

    pub fn as_kinetic(&self) -> Option<&KineticVertex> {
        match self {
            Vertex::Kinetic(kv) => Some(kv),
            Vertex::Stationary { .. } => None,
        }
    }
}

/// What a triangle is about to do when its collapse event fires.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// One or more sides collapse to zero length.
    Edge,
    /// A reflex vertex crashes into the interior of the opposite wavefront.
    Split,
    /// The triangle degenerates without a side collapsing; the spoke is
    /// flipped away.
    Flip,
}

/// A pending collapse of one kinetic triangle, as computed by the oracle.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub time: f64,
    pub triangle: TriangleId,
    /// The collapsing side(s): one side, or all three for a point collapse.
    pub sides: ArrayVec<usize, 3>,
    pub kind: EventKind,
    /// Number of wavefront sides of the triangle when the event was
    /// computed; used by the deterministic tie-break.
    pub triangle_kind: usize,
}

/// A triangle of the kinetic triangulation.
///
/// `vertices` are in counter clockwise order; `neighbours[i]` is the
/// triangle opposite `vertices[i]`, `None` iff side i is a wavefront edge,
/// in which case `wavefronts[i]` carries the supporting line.
#[derive(Clone, Debug)]
pub struct KineticTriangle {
    pub vertices: [VertexId; 3],
    pub neighbours: [Option<TriangleId>; 3],
    pub wavefronts: [Option<WavefrontId>; 3],
    /// Stable identifier, used for logging and event tie-breaking.
    pub info: u32,
    pub stops_at: Option<f64>,
    /// The cached pending event, kept coherent with the event queue.
    pub event: Option<Event>,
    pub internal: bool,
}

impl KineticTriangle {
    /// The number of wavefront sides (0..=3).
    pub fn kind(&self) -> usize {
        self.neighbours.iter().filter(|n| n.is_none()).count()
    }

    pub fn index_of(&self, v: VertexId) -> Option<usize> {
        self.vertices.iter().position(|&x| x == v)
    }

    pub fn neighbour_index(&self, t: TriangleId) -> Option<usize> {
        self.neighbours.iter().position(|&n| n == Some(t))
    }
}

/// A segment of the output skeleton, with the infos of the input vertices
/// its end nodes correspond to (if any).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SkeletonSegment {
    pub from: Point,
    pub to: Point,
    pub from_info: Option<u32>,
    pub to_info: Option<u32>,
}

/// A straight skeleton: the arenas of skeleton nodes, kinetic vertices,
/// kinetic triangles and wavefront edges built up during propagation.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    pub nodes: Vec<SkeletonNode>,
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<KineticTriangle>,
    pub wavefronts: Vec<WavefrontEdge>,
    /// The normalization applied by the pre-normalizer, to be undone on
    /// output.
    pub transform: Option<crate::transform::Transform>,
}

impl Skeleton {
    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0 as usize]
    }

    #[inline]
    pub fn tri(&self, id: TriangleId) -> &KineticTriangle {
        &self.triangles[id.0 as usize]
    }

    #[inline]
    pub(crate) fn tri_mut(&mut self, id: TriangleId) -> &mut KineticTriangle {
        &mut self.triangles[id.0 as usize]
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &SkeletonNode {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn wavefront(&self, id: WavefrontId) -> &WavefrontEdge {
        &self.wavefronts[id.0 as usize]
    }

    pub(crate) fn add_node(&mut self, node: SkeletonNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub(crate) fn add_vertex(&mut self, v: Vertex) -> VertexId {
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(v);
        id
    }

    pub(crate) fn add_wavefront(&mut self, wf: WavefrontEdge) -> WavefrontId {
        let id = WavefrontId(self.wavefronts.len() as u32);
        self.wavefronts.push(wf);
        id
    }

    /// The kinetic vertex behind `id`, or an invariant violation if the slot
    /// holds the stationary far vertex.
    pub fn kinetic(&self, id: VertexId) -> SkeletonResult<&KineticVertex> {
        match self.vertex(id) {
            Vertex::Kinetic(kv) => Ok(kv),
            Vertex::Stationary { .. } => Err(SkeletonError::InvariantViolation {
                message: "expected a kinetic vertex, found the far vertex",
                time: f64::NAN,
            }),
        }
    }

    pub(crate) fn kinetic_mut(&mut self, id: VertexId) -> SkeletonResult<&mut KineticVertex> {
        match &mut self.vertices[id.0 as usize] {
            Vertex::Kinetic(kv) => Ok(kv),
            Vertex::Stationary { .. } => Err(SkeletonError::InvariantViolation {
                message: "expected a kinetic vertex, found the far vertex",
                time: f64::NAN,
            }),
        }
    }

    #[inline]
    pub fn position_at(&self, id: VertexId, t: f64) -> Point {
        self.vertex(id).position_at(t)
    }

    /// Distance between two triangulation vertices at time `t`.
    pub fn distance_at(&self, a: VertexId, b: VertexId, t: f64) -> f64 {
        self.position_at(a, t).distance_to(self.position_at(b, t))
    }

    /// Length of side `side` of triangle `tri` at time `t`.
    pub fn side_length_at(&self, tri: &KineticTriangle, side: usize, t: f64) -> f64 {
        self.distance_at(tri.vertices[ccw(side)], tri.vertices[cw(side)], t)
    }

    /// Lengths of the three sides at time `t` (side i opposite vertex i).
    pub fn side_lengths_at(&self, tri: &KineticTriangle, t: f64) -> [f64; 3] {
        [
            self.side_length_at(tri, 0, t),
            self.side_length_at(tri, 1, t),
            self.side_length_at(tri, 2, t),
        ]
    }

    /// Whether all three vertices of the triangle are kinetic.
    pub fn tri_is_finite(&self, tri: &KineticTriangle) -> bool {
        tri.vertices.iter().all(|&v| self.vertex(v).is_kinetic())
    }

    fn backward(&self, p: Point) -> Point {
        match &self.transform {
            Some(tr) => tr.backward(p),
            None => p,
        }
    }

    /// The segments of the skeleton, in input coordinates.
    ///
    /// A stopped vertex contributes the segment between its start and stop
    /// node (skipped if both are the same node); a vertex that never stopped
    /// contributes an unbounded ray, sampled far along its trajectory.
    pub fn segments(&self) -> Vec<SkeletonSegment> {
        let mut segments = Vec::new();
        for v in &self.vertices {
            let kv = match v {
                Vertex::Kinetic(kv) => kv,
                Vertex::Stationary { .. } => continue,
            };
            let start = self.node(kv.start_node);
            let segment = match kv.stop_node {
                Some(stop_node) => {
                    if stop_node == kv.start_node {
                        log::info!("skipping segment with same start / end node");
                        continue;
                    }
                    let stop = self.node(stop_node);
                    SkeletonSegment {
                        from: self.backward(start.pos),
                        to: self.backward(stop.pos),
                        from_info: start.info,
                        to_info: stop.info,
                    }
                }
                None => SkeletonSegment {
                    from: self.backward(start.pos),
                    to: self.backward(kv.position_at(1000.0)),
                    from_info: start.info,
                    to_info: None,
                },
            };
            segments.push(segment);
        }
        segments
    }

    /// Sample the offset contours at time `t`: one small segment per kinetic
    /// vertex alive at `t`, from the vertex to its left neighbour, in
    /// normalized coordinates.
    pub fn offsets(&self, t: f64) -> Vec<(Point, Point)> {
        let mut out = Vec::new();
        for v in &self.vertices {
            let kv = match v {
                Vertex::Kinetic(kv) => kv,
                Vertex::Stationary { .. } => continue,
            };
            let alive = kv.starts_at <= t
                && match kv.stops_at {
                    Some(stop) => stop > t,
                    None => true,
                };
            if !alive {
                continue;
            }
            if let Some(left) = kv.left_at(t) {
                out.push((kv.position_at(t), self.position_at(left, t)));
            }
        }
        out
    }

    /// A filtered copy retaining only the elements on the interior side of
    /// the input boundary. Both arenas are compacted, so every id embedded
    /// in the kept elements is rewritten; links into discarded elements are
    /// cleared. The result is meant for output inspection only.
    pub fn internal_only(&self) -> Skeleton {
        let mut vert_map = vec![None; self.vertices.len()];
        let mut vertices: Vec<Vertex> = Vec::new();
        for (i, v) in self.vertices.iter().enumerate() {
            if v.internal() || !v.is_kinetic() {
                vert_map[i] = Some(VertexId(vertices.len() as u32));
                vertices.push(v.clone());
            }
        }
        for v in &mut vertices {
            if let Vertex::Kinetic(kv) = v {
                kv.left.remap(&vert_map);
                kv.right.remap(&vert_map);
            }
        }

        let mut tri_map = vec![None; self.triangles.len()];
        let mut triangles = Vec::new();
        for (i, t) in self.triangles.iter().enumerate() {
            let kept = t.internal
                && t.vertices
                    .iter()
                    .all(|&v| vert_map[v.0 as usize].is_some());
            if kept {
                tri_map[i] = Some(TriangleId(triangles.len() as u32));
                triangles.push(t.clone());
            }
        }
        for t in &mut triangles {
            for v in t.vertices.iter_mut() {
                if let Some(new) = vert_map[v.0 as usize] {
                    *v = new;
                }
            }
            for n in t.neighbours.iter_mut() {
                *n = n.and_then(|id| tri_map[id.0 as usize]);
            }
        }
        Skeleton {
            nodes: self.nodes.clone(),
            vertices,
            triangles,
            wavefronts: self.wavefronts.clone(),
            transform: self.transform.clone(),
        }
    }

    /// Check the structural invariants of the alive part of the kinetic
    /// triangulation: neighbour symmetry, shared edge vertices, wavefront
    /// circular linkage and wavefront edge identity.
    pub fn verify_topology(&self, now: f64) -> SkeletonResult<()> {
        for (i, t) in self.triangles.iter().enumerate() {
            if t.stops_at.is_some() {
                continue;
            }
            let tid = TriangleId(i as u32);
            for (side, n) in t.neighbours.iter().enumerate() {
                let n = match n {
                    Some(n) => *n,
                    None => continue,
                };
                let other = self.tri(n);
                let j = match other.neighbour_index(tid) {
                    Some(j) => j,
                    None => {
                        return Err(SkeletonError::InvariantViolation {
                            message: "neighbour link is not symmetric",
                            time: now,
                        })
                    }
                };
                if other.vertices[cw(j)] != t.vertices[ccw(side)]
                    || other.vertices[ccw(j)] != t.vertices[cw(side)]
                {
                    return Err(SkeletonError::InvariantViolation {
                        message: "neighbours disagree about their shared edge",
                        time: now,
                    });
                }
            }
        }
        for v in &self.vertices {
            let kv = match v {
                Vertex::Kinetic(kv) => kv,
                Vertex::Stationary { .. } => continue,
            };
            if kv.is_stopped() {
                continue;
            }
            match (kv.left(), kv.right()) {
                (Some(left), Some(right)) => {
                    let lv = self.kinetic(left)?;
                    let rv = self.kinetic(right)?;
                    if lv.wfr != kv.wfl || rv.wfl != kv.wfr {
                        return Err(SkeletonError::InvariantViolation {
                            message: "wavefront edge identity broken",
                            time: now,
                        });
                    }
                }
                _ => {
                    return Err(SkeletonError::InvariantViolation {
                        message: "alive vertex is not on a wavefront loop",
                        time: now,
                    })
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbour_log_history() {
        let mut log = NeighbourLog::default();
        log.set(VertexId(1), 0.0);
        log.set(VertexId(2), 1.0);
        log.set(VertexId(3), 2.5);

        assert_eq!(log.current(), Some(VertexId(3)));
        assert_eq!(log.at(0.0), Some(VertexId(1)));
        assert_eq!(log.at(0.99), Some(VertexId(1)));
        assert_eq!(log.at(1.0), Some(VertexId(2)));
        assert_eq!(log.at(2.5), Some(VertexId(3)));
        assert_eq!(log.at(100.0), Some(VertexId(3)));
        assert_eq!(log.at(-1.0), None);
    }

    #[test]
    fn rotation_indices() {
        assert_eq!(ccw(0), 1);
        assert_eq!(ccw(2), 0);
        assert_eq!(cw(0), 2);
        assert_eq!(cw(1), 0);
        assert_eq!(Rotation::Cw.apply(1), 0);
        assert_eq!(Rotation::Ccw.apply(1), 2);
    }
}
