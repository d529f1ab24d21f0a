//! Edge events: a triangle side collapses to zero length.

use super::EventLoop;
use crate::error::{SkeletonError, SkeletonResult};
use crate::kds::{ccw, cw, Event, Rotation};
use skel_geom::utils::near_zero;
use skel_geom::wavefront_intersection;

impl<'l> EventLoop<'l> {
    /// Exactly one side collapses: its two vertices meet and stop, and a
    /// single new kinetic vertex continues from the meeting point between
    /// the two outer wavefronts.
    pub(super) fn handle_edge_event(&mut self, evt: &Event) -> SkeletonResult<()> {
        let t = evt.triangle;
        let tri = self.skel.tri(t).clone();
        let e = evt.sides[0];
        let now = evt.time;
        let v1 = tri.vertices[ccw(e)];
        let v2 = tri.vertices[cw(e)];

        let kv1 = self.skel.kinetic(v1)?;
        let kv2 = self.skel.kinetic(v2)?;
        let ul = kv1.ul;
        let ur = kv2.ur;
        let wfl = kv1.wfl;
        let wfr = kv2.wfr;
        let internal = kv1.internal || kv2.internal;

        // Where the two outer wavefronts meet at this time; parallel
        // wavefronts leave the node at the midpoint of the stopping pair.
        let left_line = self.skel.wavefront(wfl).line;
        let right_line = self.skel.wavefront(wfr).line;
        let pos = wavefront_intersection(&left_line, &right_line, now, self.tol.eps_dist);

        let sk_node = self.stop_kinetic_vertices(&[v1, v2], pos)?;
        let kv = self.new_kinetic_vertex(ul, ur, wfl, wfr, sk_node, internal)?;

        let v1_left = self.skel.kinetic(v1)?.left();
        let v2_right = self.skel.kinetic(v2)?.right();
        self.update_circular(v1_left, Some(kv))?;
        self.update_circular(Some(kv), v2_right)?;

        let a = tri.neighbours[ccw(e)];
        let b = tri.neighbours[cw(e)];
        let n = tri.neighbours[e];

        let mut fan_a = Vec::new();
        let mut fan_b = Vec::new();
        if let Some(a) = a {
            let a_idx =
                self.skel
                    .tri(a)
                    .neighbour_index(t)
                    .ok_or(SkeletonError::InvariantViolation {
                        message: "neighbour link is not symmetric",
                        time: now,
                    })?;
            self.skel.tri_mut(a).neighbours[a_idx] = b;
            fan_a = self.replace_kvertex(a, v2, kv, Rotation::Cw)?;
            if let Some(&last) = fan_a.last() {
                // The far end of the fan may collapse at this same moment.
                let side = self.skel.tri(last).index_of(kv).map(cw).ok_or({
                    SkeletonError::InvariantViolation {
                        message: "fan end lost the replacement vertex",
                        time: now,
                    }
                })?;
                let len = self.skel.side_length_at(self.skel.tri(last), side, now);
                if near_zero(len, self.tol.eps_dist) {
                    self.schedule_immediately(last)?;
                }
            }
        }
        if let Some(b) = b {
            let b_idx =
                self.skel
                    .tri(b)
                    .neighbour_index(t)
                    .ok_or(SkeletonError::InvariantViolation {
                        message: "neighbour link is not symmetric",
                        time: now,
                    })?;
            self.skel.tri_mut(b).neighbours[b_idx] = a;
            fan_b = self.replace_kvertex(b, v1, kv, Rotation::Ccw)?;
            if let Some(&last) = fan_b.last() {
                let side = self.skel.tri(last).index_of(kv).map(ccw).ok_or({
                    SkeletonError::InvariantViolation {
                        message: "fan end lost the replacement vertex",
                        time: now,
                    }
                })?;
                let len = self.skel.side_length_at(self.skel.tri(last), side, now);
                if near_zero(len, self.tol.eps_dist) {
                    self.schedule_immediately(last)?;
                }
            }
        }
        if let Some(n) = n {
            // A spoke collapsed: the neighbour is about to collapse at the
            // same point, process it without advancing the clock.
            if let Some(n_idx) = self.skel.tri(n).neighbour_index(t) {
                self.skel.tri_mut(n).neighbours[n_idx] = None;
            }
            let nt = self.skel.tri(n);
            if nt.event.is_some() && nt.stops_at.is_none() {
                self.schedule_immediately(n)?;
            }
        }
        self.skel.tri_mut(t).stops_at = Some(now);

        if self.skel.vertex(kv).inf_fast() {
            if !fan_a.is_empty() && !fan_b.is_empty() {
                fan_a.reverse();
                fan_a.extend(fan_b);
                self.handle_parallel_fan(&fan_a, kv, Rotation::Ccw)?;
            } else if !fan_a.is_empty() {
                self.handle_parallel_fan(&fan_a, kv, Rotation::Cw)?;
            } else if !fan_b.is_empty() {
                self.handle_parallel_fan(&fan_b, kv, Rotation::Ccw)?;
            }
        }
        Ok(())
    }

    /// All three sides collapse: the triangle shrinks to a point. All three
    /// vertices stop there and every alive neighbour collapses to the same
    /// point immediately after.
    pub(super) fn handle_edge_event_3sides(&mut self, evt: &Event) -> SkeletonResult<()> {
        let t = evt.triangle;
        let now = evt.time;
        let tri = self.skel.tri(t).clone();
        self.stop_kinetic_vertices(&tri.vertices, None)?;
        for n in tri.neighbours.iter().flatten() {
            let nt = self.skel.tri(*n);
            if nt.event.is_some() && nt.stops_at.is_none() {
                if let Some(n_idx) = self.skel.tri(*n).neighbour_index(t) {
                    self.skel.tri_mut(*n).neighbours[n_idx] = None;
                }
                self.schedule_immediately(*n)?;
            }
        }
        self.skel.tri_mut(t).stops_at = Some(now);
        Ok(())
    }

    /// One side of a triangle bounded by three wavefronts collapses: the
    /// triangle degenerates to a segment rather than a point. There are no
    /// neighbours to re-link.
    pub(super) fn handle_edge_event_1side(&mut self, evt: &Event) -> SkeletonResult<()> {
        let t = evt.triangle;
        let now = evt.time;
        let tri = self.skel.tri(t).clone();
        let e = evt.sides[0];
        let v0 = tri.vertices[e];
        let v1 = tri.vertices[ccw(e)];
        let v2 = tri.vertices[cw(e)];

        let kv1 = self.skel.kinetic(v1)?;
        let kv2 = self.skel.kinetic(v2)?;
        let ul = kv1.ul;
        let ur = kv2.ur;
        let wfl = kv1.wfl;
        let wfr = kv2.wfr;
        let internal = kv1.internal || kv2.internal;

        let sk_node = self.stop_kinetic_vertices(&[v1, v2], None)?;
        let kv = self.new_kinetic_vertex(ul, ur, wfl, wfr, sk_node, internal)?;
        self.stop_kinetic_vertices(&[v0, kv], None)?;
        self.skel.tri_mut(t).stops_at = Some(now);
        Ok(())
    }
}
