//! Split events: a reflex kinetic vertex crashes into the interior of the
//! wavefront edge opposite it, splitting that wavefront in two.

use super::EventLoop;
use crate::error::{SkeletonError, SkeletonResult};
use crate::kds::{ccw, cw, Event, Rotation};

impl<'l> EventLoop<'l> {
    pub(super) fn handle_split_event(&mut self, evt: &Event) -> SkeletonResult<()> {
        let t = evt.triangle;
        let tri = self.skel.tri(t).clone();
        let e = evt.sides[0];
        let now = evt.time;
        if tri.neighbours[e].is_some() {
            return Err(SkeletonError::ImpossibleConfiguration {
                message: "split event on a spoke",
                triangle: tri.info,
                time: now,
            });
        }
        let v = tri.vertices[e];
        let v1 = tri.vertices[ccw(e)];
        let v2 = tri.vertices[cw(e)];
        log::debug!("splitting the wavefront opposite [{}]", tri.info);

        let kv = self.skel.kinetic(v)?;
        let v_left = kv.left();
        let v_right = kv.right();
        let v_ul = kv.ul;
        let v_ur = kv.ur;
        let v_wfl = kv.wfl;
        let v_wfr = kv.wfr;
        let v_internal = kv.internal;
        let kv1 = self.skel.kinetic(v1)?;
        let v1_ur = kv1.ur;
        let v1_wfr = kv1.wfr;
        let v1_internal = kv1.internal;
        let kv2 = self.skel.kinetic(v2)?;
        let v2_ul = kv2.ul;
        let v2_wfl = kv2.wfl;
        let v2_internal = kv2.internal;

        let sk_node = self.stop_kinetic_vertices(&[v], None)?;

        // The left fragment of the split wavefront continues between v's
        // left wavefront and the collapsed edge's line; the right fragment
        // symmetrically.
        let vb = self.new_kinetic_vertex(v_ul, v2_ul, v_wfl, v2_wfl, sk_node, v_internal || v2_internal)?;
        let va = self.new_kinetic_vertex(v1_ur, v_ur, v1_wfr, v_wfr, sk_node, v_internal || v1_internal)?;

        self.update_circular(v_left, Some(vb))?;
        self.update_circular(Some(vb), Some(v2))?;
        self.update_circular(Some(v1), Some(va))?;
        self.update_circular(Some(va), v_right)?;

        let b = tri.neighbours[ccw(e)].ok_or(SkeletonError::ImpossibleConfiguration {
            message: "split triangle without a spoke on its left side",
            triangle: tri.info,
            time: now,
        })?;
        let b_idx = self
            .skel
            .tri(b)
            .neighbour_index(t)
            .ok_or(SkeletonError::InvariantViolation {
                message: "neighbour link is not symmetric",
                time: now,
            })?;
        self.skel.tri_mut(b).neighbours[b_idx] = None;
        let fan_b = self.replace_kvertex(b, v, vb, Rotation::Ccw)?;

        let a = tri.neighbours[cw(e)].ok_or(SkeletonError::ImpossibleConfiguration {
            message: "split triangle without a spoke on its right side",
            triangle: tri.info,
            time: now,
        })?;
        let a_idx = self
            .skel
            .tri(a)
            .neighbour_index(t)
            .ok_or(SkeletonError::InvariantViolation {
                message: "neighbour link is not symmetric",
                time: now,
            })?;
        self.skel.tri_mut(a).neighbours[a_idx] = None;
        let fan_a = self.replace_kvertex(a, v, va, Rotation::Cw)?;

        self.skel.tri_mut(t).stops_at = Some(now);

        if self.skel.vertex(va).inf_fast() {
            self.handle_parallel_fan(&fan_a, va, Rotation::Cw)?;
        }
        if self.skel.vertex(vb).inf_fast() {
            self.handle_parallel_fan(&fan_b, vb, Rotation::Ccw)?;
        }
        Ok(())
    }
}
