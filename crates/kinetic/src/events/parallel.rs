//! The parallel-fan protocol.
//!
//! When surgery produces an infinitely fast vertex, the wavefronts around it
//! are parallel and the whole fan of triangles sharing the vertex collapses
//! at the current time. The fan is retired triangle by triangle: equal-leg
//! triangles collapse to a node, a shorter leg is retired first when the
//! legs differ, and an irreducible pair is unlocked with one diagonal flip.

use super::EventLoop;
use crate::error::{SkeletonError, SkeletonResult};
use crate::kds::{ccw, cw, Rotation, TriangleId, VertexId};
use skel_geom::utils::near_zero;

impl<'l> EventLoop<'l> {
    pub(super) fn handle_parallel_fan(
        &mut self,
        fan: &[TriangleId],
        pivot: VertexId,
        direction: Rotation,
    ) -> SkeletonResult<()> {
        let now = self.now;
        let first = *fan.first().ok_or(SkeletonError::ImpossibleConfiguration {
            message: "parallel fan without triangles",
            triangle: 0,
            time: now,
        })?;
        let last = *fan.last().unwrap_or(&first);
        log::debug!(
            "parallel fan of {} triangle(s) around [{}]",
            fan.len(),
            self.skel.kinetic(pivot)?.info
        );

        // A fan that is a single triangle bounded by three wavefronts
        // collapses on its own.
        if self.skel.tri(first).kind() == 3 {
            let tri = self.skel.tri(first);
            let lengths = self.skel.side_lengths_at(tri, now);
            let min = lengths.iter().cloned().fold(f64::INFINITY, f64::min);
            let minimal: Vec<usize> = (0..3)
                .filter(|&i| near_zero(lengths[i] - min, self.tol.eps_dist))
                .collect();
            if near_zero(min, self.tol.eps_dist) && minimal.len() == 1 {
                // One leg has already shrunk to nothing; the vertex opposite
                // it is the actual pivot of the collapse.
                let side = minimal[0];
                let pivot = self.skel.tri(first).vertices[side];
                return self.handle_parallel_even_legs(first, side, pivot);
            }
            return self.handle_parallel_3wavefronts(first, pivot);
        }

        let (left, right) = match direction {
            Rotation::Cw => (first, last),
            Rotation::Ccw => (last, first),
        };
        let left_leg = self
            .skel
            .tri(left)
            .index_of(pivot)
            .map(ccw)
            .ok_or(SkeletonError::InvariantViolation {
                message: "parallel fan lost its pivot",
                time: now,
            })?;
        let right_leg = self
            .skel
            .tri(right)
            .index_of(pivot)
            .map(cw)
            .ok_or(SkeletonError::InvariantViolation {
                message: "parallel fan lost its pivot",
                time: now,
            })?;
        let left_dist = self.skel.side_length_at(self.skel.tri(left), left_leg, now);
        let right_dist = self
            .skel
            .side_length_at(self.skel.tri(right), right_leg, now);
        let min = left_dist.min(right_dist);
        let legs_even = near_zero(left_dist - min, self.tol.eps_dist)
            && near_zero(right_dist - min, self.tol.eps_dist);

        if !legs_even {
            // Retire the triangle behind the shorter leg first; it recurses
            // into the remaining fan if the replacement vertex is again
            // infinitely fast.
            return if right_dist < left_dist {
                self.handle_parallel_shorter_leg(right, right_leg, pivot)
            } else {
                self.handle_parallel_shorter_leg(left, left_leg, pivot)
            };
        }

        match fan.len() {
            1 => {
                let e = self.skel.tri(first).index_of(pivot).ok_or({
                    SkeletonError::InvariantViolation {
                        message: "parallel fan lost its pivot",
                        time: now,
                    }
                })?;
                self.handle_parallel_even_legs(first, e, pivot)
            }
            2 => {
                // Both outer legs match; check whether each triangle's own
                // legs do as well.
                let mut all_even = true;
                for &t in fan {
                    let e = self.skel.tri(t).index_of(pivot).ok_or({
                        SkeletonError::InvariantViolation {
                            message: "parallel fan lost its pivot",
                            time: now,
                        }
                    })?;
                    let l = self.skel.side_length_at(self.skel.tri(t), ccw(e), now);
                    let r = self.skel.side_length_at(self.skel.tri(t), cw(e), now);
                    let m = l.min(r);
                    if !(near_zero(l - m, self.tol.eps_dist) && near_zero(r - m, self.tol.eps_dist))
                    {
                        all_even = false;
                    }
                }
                if all_even {
                    for &t in fan {
                        let e = self.skel.tri(t).index_of(pivot).ok_or({
                            SkeletonError::InvariantViolation {
                                message: "parallel fan lost its pivot",
                                time: now,
                            }
                        })?;
                        self.handle_parallel_even_legs(t, e, pivot)?;
                    }
                    Ok(())
                } else {
                    // Neither triangle can be retired on its own: one flip
                    // between them re-distributes the legs.
                    let t0 = fan[0];
                    let t1 = fan[1];
                    let side0 = self.skel.tri(t0).neighbour_index(t1).ok_or({
                        SkeletonError::InvariantViolation {
                            message: "parallel fan triangles are not neighbours",
                            time: now,
                        }
                    })?;
                    let side1 = self.skel.tri(t1).neighbour_index(t0).ok_or({
                        SkeletonError::InvariantViolation {
                            message: "parallel fan triangles are not neighbours",
                            time: now,
                        }
                    })?;
                    self.flip(t0, side0, t1, side1)?;
                    for &t in &[t0, t1] {
                        let has_inf_fast = self
                            .skel
                            .tri(t)
                            .vertices
                            .iter()
                            .any(|&v| self.skel.vertex(v).inf_fast());
                        if has_inf_fast {
                            let e = self.skel.tri(t).index_of(pivot).ok_or({
                                SkeletonError::InvariantViolation {
                                    message: "flipped fan triangle lost the pivot",
                                    time: now,
                                }
                            })?;
                            self.handle_parallel_even_legs(t, e, pivot)?;
                        }
                    }
                    Ok(())
                }
            }
            _ => Err(SkeletonError::ImpossibleConfiguration {
                message: "parallel fan with equal outer legs and more than two triangles",
                triangle: self.skel.tri(first).info,
                time: now,
            }),
        }
    }

    /// Both legs of the triangle have the same length: the two non-pivot
    /// vertices meet in a single node and the pivot stops there as well.
    fn handle_parallel_even_legs(
        &mut self,
        t: TriangleId,
        e: usize,
        pivot: VertexId,
    ) -> SkeletonResult<()> {
        let now = self.now;
        let tri = self.skel.tri(t).clone();
        debug_assert_eq!(tri.vertices[e], pivot);
        let v1 = tri.vertices[ccw(e)];
        let v2 = tri.vertices[cw(e)];
        let sk_node = self.stop_kinetic_vertices(&[v1, v2], None)?;
        {
            let kv = self.skel.kinetic_mut(pivot)?;
            kv.stop_node = Some(sk_node);
            kv.stops_at = Some(now);
        }
        self.skel.tri_mut(t).stops_at = Some(now);

        if let Some(n) = tri.neighbours[e] {
            if let Some(n_idx) = self.skel.tri(n).neighbour_index(t) {
                self.skel.tri_mut(n).neighbours[n_idx] = None;
            }
            let nt = self.skel.tri(n);
            if nt.event.is_some() && nt.stops_at.is_none() {
                self.schedule_immediately(n)?;
            }
        }
        Ok(())
    }

    /// One leg is shorter: collapse it like a single-side edge event, with
    /// the difference that one of its vertices moves infinitely fast.
    fn handle_parallel_shorter_leg(
        &mut self,
        t: TriangleId,
        e: usize,
        pivot: VertexId,
    ) -> SkeletonResult<()> {
        let now = self.now;
        let tri = self.skel.tri(t).clone();
        let v1 = tri.vertices[ccw(e)];
        let v2 = tri.vertices[cw(e)];
        debug_assert!(v1 == pivot || v2 == pivot);
        debug_assert_ne!(tri.index_of(pivot), Some(e));

        let mut to_stop = Vec::new();
        for &v in &[v1, v2] {
            if !self.skel.vertex(v).inf_fast() {
                to_stop.push(v);
            }
        }
        if to_stop.is_empty() {
            return Err(SkeletonError::ImpossibleConfiguration {
                message: "both leg vertices of a parallel fan are infinitely fast",
                triangle: tri.info,
                time: now,
            });
        }
        let sk_node = self.stop_kinetic_vertices(&to_stop, None)?;
        if self.skel.kinetic(pivot)?.stop_node.is_none() {
            let kv = self.skel.kinetic_mut(pivot)?;
            kv.stop_node = Some(sk_node);
            kv.stops_at = Some(now);
        }
        self.skel.tri_mut(t).stops_at = Some(now);

        let kv1 = self.skel.kinetic(v1)?;
        let ul = kv1.ul;
        let internal1 = kv1.internal;
        let v1_left = kv1.left();
        let kv2 = self.skel.kinetic(v2)?;
        let ur = kv2.ur;
        let internal2 = kv2.internal;
        let v2_right = kv2.right();
        // The wavefronts flanking the new vertex come from beyond the
        // stopped pair; the pivot's own wavefronts die with it.
        let wfl = match v1_left {
            Some(l) => self.skel.kinetic(l)?.wfr,
            None => kv1.wfl,
        };
        let wfr = match v2_right {
            Some(r) => self.skel.kinetic(r)?.wfl,
            None => kv2.wfr,
        };
        let kv = self.new_kinetic_vertex(ul, ur, wfl, wfr, sk_node, internal1 || internal2)?;

        let a = tri.neighbours[ccw(e)];
        let b = tri.neighbours[cw(e)];
        let n = tri.neighbours[e];

        self.update_circular(v1_left, Some(kv))?;
        self.update_circular(Some(kv), v2_right)?;

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
        }
        if let Some(n) = n {
            if let Some(n_idx) = self.skel.tri(n).neighbour_index(t) {
                self.skel.tri_mut(n).neighbours[n_idx] = None;
            }
            let nt = self.skel.tri(n);
            if nt.event.is_some() && nt.stops_at.is_none() {
                self.schedule_immediately(n)?;
            }
        }

        if self.skel.vertex(kv).inf_fast() {
            if !fan_a.is_empty() && !fan_b.is_empty() {
                let mut fan = fan_a;
                fan.reverse();
                fan.extend(fan_b);
                self.handle_parallel_fan(&fan, kv, Rotation::Ccw)?;
            } else if !fan_a.is_empty() {
                self.handle_parallel_fan(&fan_a, kv, Rotation::Cw)?;
            } else if !fan_b.is_empty() {
                self.handle_parallel_fan(&fan_b, kv, Rotation::Ccw)?;
            }
        }
        Ok(())
    }

    /// A triangle bounded by three wavefronts whose legs are all distinct at
    /// the collapse time: the slower outer vertex forms the node, the other
    /// two stop on it.
    fn handle_parallel_3wavefronts(
        &mut self,
        t: TriangleId,
        pivot: VertexId,
    ) -> SkeletonResult<()> {
        let now = self.now;
        let tri = self.skel.tri(t).clone();
        let e = tri
            .index_of(pivot)
            .ok_or(SkeletonError::InvariantViolation {
                message: "parallel fan lost its pivot",
                time: now,
            })?;
        let v1 = tri.vertices[ccw(e)];
        let v2 = tri.vertices[cw(e)];
        let magn_v1 = self.skel.kinetic(v1)?.velocity.length();
        let magn_v2 = self.skel.kinetic(v2)?.velocity.length();
        let sk_node = if magn_v2 < magn_v1 {
            let node = self.stop_kinetic_vertices(&[v2], None)?;
            let kv1 = self.skel.kinetic_mut(v1)?;
            kv1.stop_node = Some(node);
            kv1.stops_at = Some(now);
            node
        } else {
            let node = self.stop_kinetic_vertices(&[v1], None)?;
            let kv2 = self.skel.kinetic_mut(v2)?;
            kv2.stop_node = Some(node);
            kv2.stops_at = Some(now);
            node
        };
        {
            let kv = self.skel.kinetic_mut(pivot)?;
            kv.stop_node = Some(sk_node);
            kv.stops_at = Some(now);
        }
        self.skel.tri_mut(t).stops_at = Some(now);
        Ok(())
    }
}
