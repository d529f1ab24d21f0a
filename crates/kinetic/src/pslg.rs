//! Input description: a planar straight line graph built from points and
//! segments, usually as one or more closed polygon rings.

use crate::error::{SkeletonError, SkeletonResult};
use geometry_predicates::orient2d;
use skel_geom::math::Point;

/// A planar straight line graph: points and the segments connecting them.
///
/// ```
/// use skel_kinetic::Pslg;
/// use skel_geom::math::point;
///
/// let mut pslg = Pslg::new();
/// pslg.add_polygon(&[
///     point(0.0, 0.0),
///     point(10.0, 0.0),
///     point(10.0, 5.0),
///     point(0.0, 5.0),
/// ]);
/// assert_eq!(pslg.points().len(), 4);
/// assert_eq!(pslg.segments().len(), 4);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Pslg {
    points: Vec<Point>,
    segments: Vec<(usize, usize)>,
}

fn orient(a: Point, b: Point, c: Point) -> f64 {
    orient2d([a.x, a.y], [b.x, b.y], [c.x, c.y])
}

/// Whether `p`, known to be collinear with `a`-`b`, lies on the closed
/// segment between them.
fn on_segment(p: Point, a: Point, b: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

impl Pslg {
    pub fn new() -> Self {
        Pslg::default()
    }

    /// Add a point, returning its index.
    pub fn add_point(&mut self, p: Point) -> usize {
        self.points.push(p);
        self.points.len() - 1
    }

    /// Add a segment between two existing points.
    pub fn add_segment(&mut self, a: usize, b: usize) {
        self.segments.push((a, b));
    }

    /// Add a closed polygon ring (the closing segment is implied; the ring
    /// may wind either way).
    pub fn add_polygon(&mut self, ring: &[Point]) {
        let base = self.points.len();
        for &p in ring {
            self.add_point(p);
        }
        for i in 0..ring.len() {
            self.add_segment(base + i, base + (i + 1) % ring.len());
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn segments(&self) -> &[(usize, usize)] {
        &self.segments
    }

    /// Reject inputs the simulator cannot handle: too few points, duplicate
    /// points, degenerate segments, and segment pairs that cross, touch in
    /// their interior, or overlap.
    pub fn validate(&self) -> SkeletonResult<()> {
        if self.points.len() < 3 {
            return Err(SkeletonError::InvalidInput("fewer than three input points"));
        }
        for i in 0..self.points.len() {
            for j in (i + 1)..self.points.len() {
                if self.points[i] == self.points[j] {
                    return Err(SkeletonError::InvalidInput(
                        "duplicate input vertices at the same position",
                    ));
                }
            }
        }
        for &(a, b) in &self.segments {
            if a >= self.points.len() || b >= self.points.len() {
                return Err(SkeletonError::InvalidInput("segment index out of range"));
            }
            if a == b {
                return Err(SkeletonError::InvalidInput("degenerate input segment"));
            }
        }
        for i in 0..self.segments.len() {
            for j in (i + 1)..self.segments.len() {
                if self.segments_conflict(self.segments[i], self.segments[j]) {
                    return Err(SkeletonError::InvalidInput(
                        "input segments intersect each other",
                    ));
                }
            }
        }
        // A vertex sitting on the interior of a segment creates a T-joint
        // the wavefront cannot emerge from.
        for &(a, b) in &self.segments {
            for (k, &p) in self.points.iter().enumerate() {
                if k == a || k == b {
                    continue;
                }
                if orient(self.points[a], self.points[b], p) == 0.0
                    && on_segment(p, self.points[a], self.points[b])
                {
                    return Err(SkeletonError::InvalidInput(
                        "input vertex on the interior of a segment",
                    ));
                }
            }
        }
        Ok(())
    }

    fn segments_conflict(&self, (a, b): (usize, usize), (c, d): (usize, usize)) -> bool {
        let shared = a == c || a == d || b == c || b == d;
        let (pa, pb, pc, pd) = (
            self.points[a],
            self.points[b],
            self.points[c],
            self.points[d],
        );
        let d1 = orient(pc, pd, pa);
        let d2 = orient(pc, pd, pb);
        let d3 = orient(pa, pb, pc);
        let d4 = orient(pa, pb, pd);
        if shared {
            // Segments sharing an endpoint only conflict when they overlap
            // along a common line.
            if d1 == 0.0 && d2 == 0.0 {
                let other_ab = if a == c || a == d { pb } else { pa };
                let other_cd = if c == a || c == b { pd } else { pc };
                let joint = if a == c || a == d { pa } else { pb };
                return on_segment(other_ab, joint, other_cd)
                    || on_segment(other_cd, joint, other_ab);
            }
            return false;
        }
        // Proper crossing.
        if d1 * d2 < 0.0 && d3 * d4 < 0.0 {
            return true;
        }
        // An endpoint in the interior of the other segment, or collinear
        // overlap.
        (d1 == 0.0 && on_segment(pa, pc, pd))
            || (d2 == 0.0 && on_segment(pb, pc, pd))
            || (d3 == 0.0 && on_segment(pc, pa, pb))
            || (d4 == 0.0 && on_segment(pd, pa, pb))
    }
}

/// Whether any two segments properly cross at an interior point. Shared
/// endpoints do not count; used by post-run sanity checks.
pub fn segments_properly_intersect(segments: &[(Point, Point)]) -> bool {
    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            let (pa, pb) = segments[i];
            let (pc, pd) = segments[j];
            if pa == pc || pa == pd || pb == pc || pb == pd {
                continue;
            }
            let d1 = orient(pc, pd, pa);
            let d2 = orient(pc, pd, pb);
            let d3 = orient(pa, pb, pc);
            let d4 = orient(pa, pb, pd);
            if d1 * d2 < 0.0 && d3 * d4 < 0.0 {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use skel_geom::math::point;

    #[test]
    fn polygon_ring_closes() {
        let mut pslg = Pslg::new();
        pslg.add_polygon(&[point(0.0, 0.0), point(1.0, 0.0), point(0.0, 1.0)]);
        assert_eq!(pslg.segments(), &[(0, 1), (1, 2), (2, 0)]);
        assert!(pslg.validate().is_ok());
    }

    #[test]
    fn rejects_self_intersecting_ring() {
        let mut pslg = Pslg::new();
        // A bow tie.
        pslg.add_polygon(&[
            point(0.0, 0.0),
            point(2.0, 2.0),
            point(2.0, 0.0),
            point(0.0, 2.0),
        ]);
        assert_eq!(
            pslg.validate(),
            Err(SkeletonError::InvalidInput(
                "input segments intersect each other"
            ))
        );
    }

    #[test]
    fn rejects_duplicate_points() {
        let mut pslg = Pslg::new();
        pslg.add_polygon(&[point(0.0, 0.0), point(1.0, 0.0), point(0.0, 0.0)]);
        assert!(matches!(
            pslg.validate(),
            Err(SkeletonError::InvalidInput(_))
        ));
    }

    #[test]
    fn accepts_touching_rings_at_distinct_points() {
        let mut pslg = Pslg::new();
        pslg.add_polygon(&[point(0.0, 0.0), point(4.0, 0.0), point(4.0, 4.0), point(0.0, 4.0)]);
        assert!(pslg.validate().is_ok());
    }

    #[test]
    fn rejects_vertex_on_segment_interior() {
        let mut pslg = Pslg::new();
        pslg.add_polygon(&[point(0.0, 0.0), point(4.0, 0.0), point(4.0, 4.0)]);
        pslg.add_point(point(2.0, 0.0));
        assert_eq!(
            pslg.validate(),
            Err(SkeletonError::InvalidInput(
                "input vertex on the interior of a segment"
            ))
        );
    }
}
