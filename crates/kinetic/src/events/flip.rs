//! Flip events: a triangle degenerates without any side collapsing; the
//! shared spoke is exchanged for the opposite diagonal of the surrounding
//! quadrilateral. No vertex starts or stops.

use super::EventLoop;
use crate::error::{SkeletonError, SkeletonResult};
use crate::kds::{ccw, cw, Event, TriangleId};

impl<'l> EventLoop<'l> {
    pub(super) fn handle_flip_event(&mut self, evt: &Event) -> SkeletonResult<()> {
        let t = evt.triangle;
        let side = evt.sides[0];
        let n = self.skel.tri(t).neighbours[side].ok_or({
            SkeletonError::ImpossibleConfiguration {
                message: "flip event on a wavefront side",
                triangle: self.skel.tri(t).info,
                time: evt.time,
            }
        })?;
        let side_n =
            self.skel
                .tri(n)
                .neighbour_index(t)
                .ok_or(SkeletonError::InvariantViolation {
                    message: "neighbour link is not symmetric",
                    time: evt.time,
                })?;
        log::debug!(
            "flipping spoke between [{}] and [{}]",
            self.skel.tri(t).info,
            self.skel.tri(n).info
        );
        self.discard_event(t);
        self.discard_event(n);
        self.flip(t, side, n, side_n)?;
        self.reschedule(t)?;
        self.reschedule(n)?;
        Ok(())
    }

    /// Exchange the edge shared by `t0` and `t1`: if they span the
    /// quadrilateral A B C D with diagonal B D, the diagonal becomes A C.
    /// Four neighbour pointers on the surrounding triangles are rewritten.
    pub(super) fn flip(
        &mut self,
        t0: TriangleId,
        side0: usize,
        t1: TriangleId,
        side1: usize,
    ) -> SkeletonResult<()> {
        let tri0 = self.skel.tri(t0).clone();
        let tri1 = self.skel.tri(t1).clone();
        debug_assert_eq!(tri0.vertices[ccw(side0)], tri1.vertices[cw(side1)]);
        debug_assert_eq!(tri0.vertices[cw(side0)], tri1.vertices[ccw(side1)]);

        let a = tri0.vertices[side0];
        let b = tri0.vertices[ccw(side0)];
        let c = tri1.vertices[side1];
        let d = tri0.vertices[cw(side0)];
        let ab = tri0.neighbours[cw(side0)];
        let bc = tri1.neighbours[ccw(side1)];
        let cd = tri1.neighbours[cw(side1)];
        let da = tri0.neighbours[ccw(side0)];

        // Point the surrounding triangles at their new owners.
        for (neighbour, corner, owner) in [(ab, a, t0), (bc, b, t0), (cd, c, t1), (da, d, t1)] {
            if let Some(nb) = neighbour {
                let i = self.skel.tri(nb).index_of(corner).map(ccw).ok_or({
                    SkeletonError::InvariantViolation {
                        message: "flip neighbour lost its corner vertex",
                        time: self.now,
                    }
                })?;
                self.skel.tri_mut(nb).neighbours[i] = Some(owner);
            }
        }
        {
            let tri = self.skel.tri_mut(t0);
            tri.vertices = [a, b, c];
            tri.neighbours = [bc, Some(t1), ab];
        }
        {
            let tri = self.skel.tri_mut(t1);
            tri.vertices = [c, d, a];
            tri.neighbours = [da, Some(t0), cd];
        }
        Ok(())
    }
}
