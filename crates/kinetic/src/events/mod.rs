//! The event loop and its handlers.
//!
//! Events are consumed in non-decreasing time order; cascades triggered by
//! the current event go through the `immediate` FIFO and are processed
//! before the clock advances. Every handler restores the structural
//! invariants of the kinetic triangulation before returning.

mod edge;
mod flip;
mod parallel;
mod split;

use crate::collapse::{compute_collapse_time, reclassified_edge_event, Sieve};
use crate::error::{SkeletonError, SkeletonResult};
use crate::kds::{
    Event, EventKind, KineticVertex, NodeId, Rotation, Skeleton, SkeletonNode, TriangleId, Vertex,
    VertexId, WavefrontId,
};
use crate::queue::EventQueue;
use crate::Tolerances;
use skel_geom::math::{point, Point, Vector};
use skel_geom::utils::near_zero;
use skel_geom::{intersect, Line, LineIntersection};
use std::collections::VecDeque;

/// Hard guard against runs that stopped making progress.
const MAX_EVENTS: u32 = 50_000;

pub(crate) struct EventLoop<'l> {
    skel: &'l mut Skeleton,
    queue: EventQueue,
    immediate: VecDeque<Event>,
    tol: Tolerances,
    now: f64,
    step: i32,
}

impl<'l> EventLoop<'l> {
    /// Compute the initial event of every triangle (strictly-future sieve)
    /// and queue them.
    pub fn new(skel: &'l mut Skeleton, tol: Tolerances) -> SkeletonResult<Self> {
        let mut this = EventLoop {
            skel,
            queue: EventQueue::new(),
            immediate: VecDeque::new(),
            tol,
            now: 0.0,
            step: 0,
        };
        for i in 0..this.skel.triangles.len() {
            let tri = TriangleId(i as u32);
            if let Some(evt) = compute_collapse_time(this.skel, tri, 0.0, Sieve::Gt, &this.tol)? {
                this.queue.insert(&evt)?;
            }
        }
        Ok(this)
    }

    /// Run until both queues are drained. Returns the time of the last
    /// event.
    pub fn run(&mut self) -> SkeletonResult<f64> {
        let mut guard = 0u32;
        loop {
            let evt = match self.immediate.pop_front() {
                Some(evt) => evt,
                None => match self.queue.pop(self.skel)? {
                    Some(evt) => evt,
                    None => break,
                },
            };
            guard += 1;
            if guard > MAX_EVENTS {
                return Err(SkeletonError::NumericStall { steps: MAX_EVENTS });
            }
            self.step += 1;
            self.now = evt.time;

            let tri = self.skel.tri(evt.triangle);
            if tri.stops_at.is_some() {
                log::warn!("triangle [{}] already stopped, but still queued", tri.info);
                continue;
            }
            log::debug!(
                "step {}: {:?} event for {}-triangle [{}] at t={:.12}",
                self.step,
                evt.kind,
                evt.triangle_kind,
                tri.info,
                evt.time
            );

            match evt.kind {
                EventKind::Edge => {
                    if evt.sides.len() == 3 {
                        self.handle_edge_event_3sides(&evt)?;
                    } else if evt.sides.len() == 2 {
                        return Err(SkeletonError::ImpossibleConfiguration {
                            message: "triangle with exactly two collapsing sides",
                            triangle: self.skel.tri(evt.triangle).info,
                            time: evt.time,
                        });
                    } else if self.skel.tri(evt.triangle).kind() == 3 {
                        self.handle_edge_event_1side(&evt)?;
                    } else {
                        self.handle_edge_event(&evt)?;
                    }
                }
                EventKind::Flip => self.handle_flip_event(&evt)?,
                EventKind::Split => self.handle_split_event(&evt)?,
            }
        }

        // Every triangle interior to the input must have collapsed.
        for tri in &self.skel.triangles {
            let all_internal = tri
                .vertices
                .iter()
                .all(|&v| self.skel.vertex(v).internal());
            if all_internal && tri.stops_at.is_none() {
                log::error!("triangle [{}] not stopped at loop exit", tri.info);
                return Err(SkeletonError::InvariantViolation {
                    message: "interior triangles still alive at loop exit",
                    time: self.now,
                });
            }
        }
        Ok(self.now)
    }

    // ------------------------------------------------------------------
    // Shared surgery helpers.

    /// Drop the triangle's pending event from both queues (its cache entry
    /// is left alone; rescheduling overwrites it).
    fn discard_event(&mut self, tri: TriangleId) {
        if let Some(evt) = &self.skel.tri(tri).event {
            self.queue.remove(evt);
        }
        self.immediate.retain(|e| e.triangle != tri);
    }

    /// Re-run the oracle on a triangle and queue the fresh event.
    fn reschedule(&mut self, tri: TriangleId) -> SkeletonResult<()> {
        self.discard_event(tri);
        if let Some(evt) = compute_collapse_time(self.skel, tri, self.now, Sieve::Gte, &self.tol)? {
            self.queue.insert(&evt)?;
        }
        Ok(())
    }

    /// Move a triangle that is known to collapse right now onto the
    /// immediate FIFO, re-classifying which of its sides collapse from the
    /// side lengths at the current time.
    fn schedule_immediately(&mut self, tri: TriangleId) -> SkeletonResult<()> {
        log::debug!(
            "scheduling triangle [{}] for direct collapse",
            self.skel.tri(tri).info
        );
        self.discard_event(tri);
        let mut evt = reclassified_edge_event(self.skel, tri, self.now, &self.tol);
        if self.skel.tri(tri).kind() == 3 {
            evt.sides.clear();
            evt.sides.extend(0..3);
        }
        self.skel.tri_mut(tri).event = Some(evt.clone());
        self.immediate.push_back(evt);
        Ok(())
    }

    /// Stop the given kinetic vertices at the current time.
    ///
    /// If one of them already carries a node (it was stopped before, or it
    /// was born at this very time), that node is reused for all of them;
    /// otherwise a new node is created at `pos`, or at the centroid of the
    /// vertices' positions when no position is supplied.
    fn stop_kinetic_vertices(
        &mut self,
        vs: &[VertexId],
        pos: Option<Point>,
    ) -> SkeletonResult<NodeId> {
        let now = self.now;
        let mut sk_node = None;
        for &v in vs {
            let kv = self.skel.kinetic(v)?;
            log::debug!("stopping kv [{}] (inf_fast: {})", kv.info, kv.inf_fast);
            if kv.stops_at.is_some() {
                sk_node = kv.stop_node;
            } else if near_zero(kv.starts_at - now, self.tol.eps_time) {
                sk_node = Some(kv.start_node);
            } else {
                self.skel.kinetic_mut(v)?.stops_at = Some(now);
            }
        }
        let node = match sk_node {
            Some(node) => {
                for &v in vs {
                    let kv = self.skel.kinetic_mut(v)?;
                    kv.stop_node = Some(node);
                    kv.stops_at = Some(now);
                }
                node
            }
            None => {
                let pos = match pos {
                    Some(pos) => pos,
                    None => {
                        let mut sum = point(0.0, 0.0);
                        for &v in vs {
                            let p = self.skel.position_at(v, now);
                            sum.x += p.x;
                            sum.y += p.y;
                        }
                        let ct = vs.len() as f64;
                        point(sum.x / ct, sum.y / ct)
                    }
                };
                let node = self.skel.add_node(SkeletonNode {
                    pos,
                    step: self.step,
                    info: None,
                });
                for &v in vs {
                    self.skel.kinetic_mut(v)?.stop_node = Some(node);
                }
                node
            }
        };
        Ok(node)
    }

    /// Create the kinetic vertex emerging at `node` between the two
    /// wavefronts whose t = 0 supporting lines are `ul` and `ur`.
    ///
    /// When the wavefront normals cancel (or the lines are parallel and
    /// distinct) the vertex has no straight trajectory: it is marked
    /// infinitely fast, with zero velocity and its origin pinned at the
    /// node.
    fn new_kinetic_vertex(
        &mut self,
        ul: Line,
        ur: Line,
        wfl: WavefrontId,
        wfr: WavefrontId,
        node: NodeId,
        internal: bool,
    ) -> SkeletonResult<VertexId> {
        let now = self.now;
        let node_pos = self.skel.node(node).pos;
        let eps = self.tol.eps_dist;

        let direction = ul.w + ur.w;
        let d = ul.w.dot(ur.w).clamp(-1.0, 1.0);
        let nearly_opposite = (near_zero(direction.x, eps) && near_zero(direction.y, eps))
            || near_zero(d.acos() - std::f64::consts::PI, self.tol.eps_angle)
            || d < (179.999_999f64).to_radians().cos();

        let mut inf_fast = false;
        let mut origin = node_pos;
        let mut velocity = Vector::zero();
        if nearly_opposite {
            log::debug!("wavefront normals cancel, marking the new vertex infinitely fast");
            inf_fast = true;
        } else {
            match intersect(&ul, &ur, eps) {
                LineIntersection::None => inf_fast = true,
                LineIntersection::Point(p0) => {
                    let lt = ul.translated(ul.w);
                    let rt = ur.translated(ur.w);
                    match intersect(&lt, &rt, eps) {
                        LineIntersection::Point(p1) => {
                            velocity = p1 - p0;
                            origin = p0;
                        }
                        // Translation cannot change the classification.
                        _ => inf_fast = true,
                    }
                }
                LineIntersection::Coincident => {
                    velocity = ul.w;
                    origin = node_pos - velocity * now;
                }
            }
        }
        if inf_fast {
            velocity = Vector::zero();
            origin = node_pos;
        }

        let info = self.skel.vertices.len() as u32 + 1;
        log::debug!(
            "new kv [{}] at {:?}, velocity {:?}, inf_fast: {}",
            info,
            origin,
            velocity,
            inf_fast
        );
        Ok(self.skel.add_vertex(Vertex::Kinetic(KineticVertex {
            origin,
            velocity,
            inf_fast,
            starts_at: now,
            stops_at: None,
            start_node: node,
            stop_node: None,
            wfl,
            wfr,
            ul,
            ur,
            internal,
            info,
            left: Default::default(),
            right: Default::default(),
        })))
    }

    /// Stitch the circular wavefront list: `right` comes after `left`, from
    /// the current time on.
    fn update_circular(
        &mut self,
        left: Option<VertexId>,
        right: Option<VertexId>,
    ) -> SkeletonResult<()> {
        let now = self.now;
        if let (Some(l), Some(r)) = (left, right) {
            self.skel.kinetic_mut(l)?.right.set(r, now);
            self.skel.kinetic_mut(r)?.left.set(l, now);
        } else {
            if let Some(l) = left {
                log::warn!("updating wavefront link of [{}] without a right side", self.skel.kinetic(l)?.info);
            }
            if let Some(r) = right {
                log::warn!("updating wavefront link of [{}] without a left side", self.skel.kinetic(r)?.info);
            }
        }
        Ok(())
    }

    /// Replace `v` by `newv` in the fan of triangles reached from `start` by
    /// rotating in `direction`, re-running the oracle on each one. When the
    /// new vertex is infinitely fast the fan is left without events; the
    /// parallel-fan protocol takes over.
    ///
    /// Returns the fan, in walk order.
    fn replace_kvertex(
        &mut self,
        start: TriangleId,
        v: VertexId,
        newv: VertexId,
        direction: Rotation,
    ) -> SkeletonResult<Vec<TriangleId>> {
        let inf_fast = self.skel.vertex(newv).inf_fast();
        let mut fan = Vec::new();
        let mut next = Some(start);
        while let Some(tid) = next {
            let tri = self.skel.tri(tid);
            if let Some(evt) = &tri.event {
                if near_zero(self.now - evt.time, self.tol.eps_time) && evt.kind == EventKind::Flip
                {
                    log::error!(
                        "skipping a same-time flip of [{}] while replacing a vertex",
                        tri.info
                    );
                }
            }
            let side = tri.index_of(v).ok_or(SkeletonError::InvariantViolation {
                message: "fan walk lost the vertex being replaced",
                time: self.now,
            })?;
            fan.push(tid);
            self.skel.tri_mut(tid).vertices[side] = newv;
            if inf_fast && self.skel.tri(tid).event.is_some() {
                self.discard_event(tid);
            } else {
                self.reschedule(tid)?;
            }
            next = self.skel.tri(tid).neighbours[direction.apply(side)];
        }
        Ok(fan)
    }
}

/// Propagate the wavefront until every interior triangle has collapsed.
/// Returns the time of the last processed event.
pub(crate) fn propagate(skel: &mut Skeleton, tol: &Tolerances) -> SkeletonResult<f64> {
    EventLoop::new(skel, tol.clone())?.run()
}
