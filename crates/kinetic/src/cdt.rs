//! Constrained Delaunay triangulation of the input PSLG.
//!
//! The triangulation is seeded with a large triangle whose three corners
//! close the convex hull of the input; the corners play the role of the
//! "infinite" vertices expected by the skeleton initializer and are replaced
//! by a single stationary vertex there. Input points are inserted
//! incrementally with a point location walk and recursive diagonal swaps;
//! input segments are forced afterwards by flipping the edges they cross.
//!
//! Triangles store their vertices in counter clockwise order; `neighbours[i]`
//! is the triangle across the side opposite `vertices[i]` and
//! `constrained[i]` tells whether that side lies on the input.

use crate::error::{SkeletonError, SkeletonResult};
use crate::kds::{ccw, cw};
use geometry_predicates::{incircle, orient2d};
use skel_geom::math::{point, Point};
use std::collections::VecDeque;

/// Number of far corners closing the hull.
pub const FAR_CORNERS: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct DtTriangle {
    pub vertices: [usize; 3],
    pub neighbours: [Option<usize>; 3],
    pub constrained: [bool; 3],
    /// Region nesting depth: 0 outside everything, 1 inside a polygon.
    pub depth: u32,
}

impl DtTriangle {
    pub fn index_of(&self, v: usize) -> Option<usize> {
        self.vertices.iter().position(|&x| x == v)
    }

    pub fn neighbour_index(&self, t: usize) -> Option<usize> {
        self.neighbours.iter().position(|&n| n == Some(t))
    }
}

/// A constrained Delaunay triangulation closed by three far corners.
#[derive(Clone, Debug, PartialEq)]
pub struct Triangulation {
    pub points: Vec<Point>,
    /// Info of the input vertex behind each point (`None` for far corners).
    pub infos: Vec<Option<u32>>,
    pub triangles: Vec<DtTriangle>,
    locate_hint: usize,
}

/// Whether vertex `v` is one of the input vertices (as opposed to a far
/// hull corner).
#[inline]
pub fn is_finite(v: usize) -> bool {
    v >= FAR_CORNERS
}

enum Location {
    InTriangle(usize),
    OnEdge(usize, usize),
    OnVertex(usize),
}

#[inline]
fn orient(a: Point, b: Point, c: Point) -> f64 {
    orient2d([a.x, a.y], [b.x, b.y], [c.x, c.y])
}

impl Triangulation {
    /// An empty triangulation whose far corners enclose the given bounding
    /// box with a wide margin.
    pub fn new(min: Point, max: Point) -> Self {
        let centre = point((min.x + max.x) * 0.5, (min.y + max.y) * 0.5);
        let half = ((max.x - min.x).max(max.y - min.y) * 0.5).max(1.0);
        let r = half * 64.0;
        let cos30 = 3f64.sqrt() * 0.5;
        let corners = [
            point(centre.x, centre.y + r),
            point(centre.x - r * cos30, centre.y - r * 0.5),
            point(centre.x + r * cos30, centre.y - r * 0.5),
        ];
        Triangulation {
            points: corners.to_vec(),
            infos: vec![None; FAR_CORNERS],
            triangles: vec![DtTriangle {
                vertices: [0, 1, 2],
                neighbours: [None, None, None],
                constrained: [false, false, false],
                depth: 0,
            }],
            locate_hint: 0,
        }
    }

    #[inline]
    pub fn tri(&self, t: usize) -> &DtTriangle {
        &self.triangles[t]
    }

    #[inline]
    pub fn pos(&self, v: usize) -> Point {
        self.points[v]
    }

    /// Endpoints of side `side` of triangle `t`, in the order that traverses
    /// the triangle boundary counter clockwise.
    pub fn segment(&self, t: usize, side: usize) -> (usize, usize) {
        let tri = self.tri(t);
        (tri.vertices[ccw(side)], tri.vertices[cw(side)])
    }

    fn locate(&self, p: Point) -> SkeletonResult<Location> {
        let mut t = self.locate_hint.min(self.triangles.len() - 1);
        // The walk visits each triangle at most once on valid input; the
        // guard catches cycles caused by degenerate geometry.
        let mut guard = self.triangles.len() * 4 + 16;
        loop {
            guard -= 1;
            if guard == 0 {
                return Err(SkeletonError::InvalidInput(
                    "point location walk did not terminate",
                ));
            }
            let tri = self.tri(t);
            let mut on_edge = None;
            let mut next = None;
            for side in 0..3 {
                let (a, b) = self.segment(t, side);
                let o = orient(self.pos(a), self.pos(b), p);
                if o < 0.0 {
                    next = Some(side);
                    break;
                } else if o == 0.0 {
                    on_edge = Some(side);
                }
            }
            match next {
                Some(side) => {
                    t = self.tri(t).neighbours[side].ok_or(SkeletonError::InvalidInput(
                        "point outside the bounding triangle",
                    ))?;
                }
                None => {
                    if let Some(side) = on_edge {
                        let (a, b) = self.segment(t, side);
                        if p == self.pos(a) {
                            return Ok(Location::OnVertex(a));
                        }
                        if p == self.pos(b) {
                            return Ok(Location::OnVertex(b));
                        }
                        return Ok(Location::OnEdge(t, side));
                    }
                    return Ok(Location::InTriangle(t));
                }
            }
        }
    }

    fn add_tri(&mut self, tri: DtTriangle) -> usize {
        self.triangles.push(tri);
        self.triangles.len() - 1
    }

    fn set_neighbour(&mut self, t: Option<usize>, old: usize, new: Option<usize>) {
        if let Some(t) = t {
            if let Some(i) = self.triangles[t].neighbour_index(old) {
                self.triangles[t].neighbours[i] = new;
            }
        }
    }

    /// Insert an input point. Rejects duplicates and points colliding with
    /// the far corners.
    pub fn insert(&mut self, p: Point, info: u32) -> SkeletonResult<usize> {
        if self.points.iter().any(|&q| q == p) {
            return Err(SkeletonError::InvalidInput(
                "duplicate input vertices at the same position",
            ));
        }
        let location = self.locate(p)?;
        let v = self.points.len();
        self.points.push(p);
        self.infos.push(Some(info));
        match location {
            Location::OnVertex(_) => Err(SkeletonError::InvalidInput(
                "duplicate input vertices at the same position",
            )),
            Location::InTriangle(t0) => {
                let old = self.triangles[t0].clone();
                let [v0, v1, v2] = old.vertices;
                let [n0, n1, n2] = old.neighbours;
                let [c0, c1, c2] = old.constrained;
                // Three fans around the new vertex; t0 is reused for the
                // first one.
                let t1 = self.add_tri(DtTriangle {
                    vertices: [v, v2, v0],
                    neighbours: [n1, None, None],
                    constrained: [c1, false, false],
                    depth: 0,
                });
                let t2 = self.add_tri(DtTriangle {
                    vertices: [v, v0, v1],
                    neighbours: [n2, None, None],
                    constrained: [c2, false, false],
                    depth: 0,
                });
                self.triangles[t0] = DtTriangle {
                    vertices: [v, v1, v2],
                    neighbours: [n0, Some(t1), Some(t2)],
                    constrained: [c0, false, false],
                    depth: 0,
                };
                self.triangles[t1].neighbours[1] = Some(t2);
                self.triangles[t1].neighbours[2] = Some(t0);
                self.triangles[t2].neighbours[1] = Some(t0);
                self.triangles[t2].neighbours[2] = Some(t1);
                self.set_neighbour(n1, t0, Some(t1));
                self.set_neighbour(n2, t0, Some(t2));
                self.locate_hint = t0;
                self.legalize(t0, 0)?;
                self.legalize(t1, 0)?;
                self.legalize(t2, 0)?;
                Ok(v)
            }
            Location::OnEdge(t0, side) => {
                if self.triangles[t0].constrained[side] {
                    return Err(SkeletonError::InvalidInput(
                        "input vertex on the interior of a segment",
                    ));
                }
                // Split both triangles sharing the edge in two.
                let old0 = self.triangles[t0].clone();
                let (a, b) = self.segment(t0, side);
                let apex0 = old0.vertices[side];
                let t0b = self.add_tri(DtTriangle {
                    vertices: [v, b, apex0],
                    neighbours: [old0.neighbours[ccw(side)], None, None],
                    constrained: [old0.constrained[ccw(side)], false, false],
                    depth: 0,
                });
                self.set_neighbour(old0.neighbours[ccw(side)], t0, Some(t0b));
                self.triangles[t0] = DtTriangle {
                    vertices: [v, apex0, a],
                    neighbours: [old0.neighbours[cw(side)], None, Some(t0b)],
                    constrained: [old0.constrained[cw(side)], false, false],
                    depth: 0,
                };
                self.triangles[t0b].neighbours[1] = Some(t0);

                match old0.neighbours[side] {
                    Some(t1) => {
                        let old1 = self.triangles[t1].clone();
                        let j = old1.neighbour_index(t0).ok_or({
                            SkeletonError::InvalidInput("asymmetric triangulation neighbours")
                        })?;
                        let apex1 = old1.vertices[j];
                        let t1b = self.add_tri(DtTriangle {
                            vertices: [v, apex1, b],
                            neighbours: [old1.neighbours[cw(j)], Some(t0b), None],
                            constrained: [old1.constrained[cw(j)], false, false],
                            depth: 0,
                        });
                        self.set_neighbour(old1.neighbours[cw(j)], t1, Some(t1b));
                        self.triangles[t1] = DtTriangle {
                            vertices: [v, a, apex1],
                            neighbours: [old1.neighbours[ccw(j)], Some(t1b), Some(t0)],
                            constrained: [old1.constrained[ccw(j)], false, false],
                            depth: 0,
                        };
                        self.triangles[t1b].neighbours[2] = Some(t1);
                        self.triangles[t0].neighbours[1] = Some(t1);
                        self.triangles[t0b].neighbours[2] = Some(t1b);
                        self.locate_hint = t0;
                        self.legalize(t0, 0)?;
                        self.legalize(t0b, 0)?;
                        self.legalize(t1, 0)?;
                        self.legalize(t1b, 0)?;
                    }
                    None => {
                        self.locate_hint = t0;
                        self.legalize(t0, 0)?;
                        self.legalize(t0b, 0)?;
                    }
                }
                Ok(v)
            }
        }
    }

    /// Restore the Delaunay criterion across side `side` of `t`, flipping
    /// recursively. Constrained sides are never flipped; swaps involving the
    /// far corners are decided by the far corner rule rather than the
    /// in-circle test.
    fn legalize(&mut self, t: usize, side: usize) -> SkeletonResult<()> {
        let tri = self.triangles[t].clone();
        if tri.constrained[side] {
            return Ok(());
        }
        let n = match tri.neighbours[side] {
            Some(n) => n,
            None => return Ok(()),
        };
        let j = self.triangles[n].neighbour_index(t).ok_or({
            SkeletonError::InvalidInput("asymmetric triangulation neighbours")
        })?;
        // Current diagonal (a, b); candidate diagonal (c, d).
        let (a, b) = self.segment(t, side);
        let c = tri.vertices[side];
        let d = self.triangles[n].vertices[j];

        let (pa, pb, pc, pd) = (self.pos(a), self.pos(b), self.pos(c), self.pos(d));
        // Only strictly convex quadrilaterals can be flipped.
        let convex = orient(pc, pd, pa) > 0.0
            && orient(pd, pc, pb) > 0.0
            && orient(pa, pb, pc) > 0.0
            && orient(pb, pa, pd) > 0.0;
        if !convex {
            return Ok(());
        }
        let should_swap = if !is_finite(a) || !is_finite(b) {
            true
        } else if !is_finite(c) || !is_finite(d) {
            false
        } else {
            incircle([pa.x, pa.y], [pb.x, pb.y], [pc.x, pc.y], [pd.x, pd.y]) > 0.0
        };
        if !should_swap {
            return Ok(());
        }
        self.flip(t, side)?;
        // The two triangles now share the diagonal (c, d); re-check their
        // outer sides facing away from c.
        for idx in [t, n] {
            if let Some(i) = self.triangles[idx].index_of(c) {
                self.legalize(idx, i)?;
            }
        }
        Ok(())
    }

    /// Exchange the diagonal shared by `t0` and its neighbour across
    /// `side0`.
    fn flip(&mut self, t0: usize, side0: usize) -> SkeletonResult<()> {
        let t1 = self.triangles[t0].neighbours[side0].ok_or({
            SkeletonError::InvalidInput("flip across a boundary side")
        })?;
        let side1 = self.triangles[t1].neighbour_index(t0).ok_or({
            SkeletonError::InvalidInput("asymmetric triangulation neighbours")
        })?;
        let old0 = self.triangles[t0].clone();
        let old1 = self.triangles[t1].clone();
        let c = old0.vertices[side0];
        let d = old1.vertices[side1];
        let a = old0.vertices[ccw(side0)];
        let b = old0.vertices[cw(side0)];

        // Quad c, a, d, b; the diagonal a-b becomes c-d.
        let na = old0.neighbours[cw(side0)]; // side c-a
        let nb = old0.neighbours[ccw(side0)]; // side b-c
        let nc = old1.neighbours[cw(side1)]; // side d-b
        let nd = old1.neighbours[ccw(side1)]; // side a-d
        let ca = old0.constrained[cw(side0)];
        let cb = old0.constrained[ccw(side0)];
        let cc = old1.constrained[cw(side1)];
        let cd = old1.constrained[ccw(side1)];

        self.triangles[t0] = DtTriangle {
            vertices: [c, a, d],
            neighbours: [nd, Some(t1), na],
            constrained: [cd, false, ca],
            depth: 0,
        };
        self.triangles[t1] = DtTriangle {
            vertices: [c, d, b],
            neighbours: [nc, nb, Some(t0)],
            constrained: [cc, cb, false],
            depth: 0,
        };
        // na and nc keep their triangle; nb and nd switch sides.
        self.set_neighbour(nd, t1, Some(t0));
        self.set_neighbour(nb, t0, Some(t1));
        Ok(())
    }

    /// The triangle and side carrying the edge between `a` and `b`, if the
    /// edge is part of the triangulation.
    fn find_edge(&self, a: usize, b: usize) -> Option<(usize, usize)> {
        for t in 0..self.triangles.len() {
            for side in 0..3 {
                let (p, q) = self.segment(t, side);
                if (p, q) == (a, b) || (p, q) == (b, a) {
                    return Some((t, side));
                }
            }
        }
        None
    }

    /// Force the edge between vertices `va` and `vb` into the triangulation
    /// and mark it constrained.
    pub fn constrain_edge(&mut self, va: usize, vb: usize) -> SkeletonResult<()> {
        if va == vb {
            return Err(SkeletonError::InvalidInput("degenerate input segment"));
        }
        let pa = self.pos(va);
        let pb = self.pos(vb);

        // Collect the edges crossing the segment, walking from va to vb.
        let mut crossing: VecDeque<(usize, usize)> = VecDeque::new();
        if self.find_edge(va, vb).is_none() {
            let (mut t, mut side) = self.first_crossing(va, vb)?;
            loop {
                let (p, q) = self.segment(t, side);
                crossing.push_back((p, q));
                let n = self.triangles[t].neighbours[side].ok_or({
                    SkeletonError::InvalidInput("constraint leaves the triangulation")
                })?;
                let j = self.triangles[n].neighbour_index(t).ok_or({
                    SkeletonError::InvalidInput("asymmetric triangulation neighbours")
                })?;
                let far = self.triangles[n].vertices[j];
                if far == vb {
                    break;
                }
                let o = orient(pa, pb, self.pos(far));
                if o == 0.0 {
                    return Err(SkeletonError::InvalidInput(
                        "input vertex on the interior of a segment",
                    ));
                }
                side = if o > 0.0 { ccw(j) } else { cw(j) };
                t = n;
            }
        }

        // Flip the crossing edges away. Non-convex quadrilaterals are
        // deferred until a neighbouring flip unlocks them.
        let mut new_edges = Vec::new();
        let mut guard = (crossing.len() + 1) * (crossing.len() + 1) * 4 + 64;
        while let Some((p, q)) = crossing.pop_front() {
            guard -= 1;
            if guard == 0 {
                return Err(SkeletonError::InvalidInput(
                    "could not restore an input segment",
                ));
            }
            let (t, side) = self.find_edge(p, q).ok_or({
                SkeletonError::InvalidInput("lost track of a crossing edge")
            })?;
            let tri = self.triangles[t].clone();
            let n = tri.neighbours[side].ok_or({
                SkeletonError::InvalidInput("constraint leaves the triangulation")
            })?;
            let j = self.triangles[n].neighbour_index(t).ok_or({
                SkeletonError::InvalidInput("asymmetric triangulation neighbours")
            })?;
            let c = tri.vertices[side];
            let d = self.triangles[n].vertices[j];
            let (pp, pq, pc, pd) = (self.pos(p), self.pos(q), self.pos(c), self.pos(d));
            let convex = orient(pc, pd, pp) > 0.0
                && orient(pd, pc, pq) > 0.0
                && orient(pp, pq, pc) > 0.0
                && orient(pq, pp, pd) > 0.0;
            if !convex {
                crossing.push_back((p, q));
                continue;
            }
            self.flip(t, side)?;
            let still_crossing = {
                let oc = orient(pa, pb, pc);
                let od = orient(pa, pb, pd);
                let ocd_a = orient(pc, pd, pa);
                let ocd_b = orient(pc, pd, pb);
                oc * od < 0.0 && ocd_a * ocd_b < 0.0
            };
            if still_crossing {
                crossing.push_back((c, d));
            } else {
                new_edges.push((c, d));
            }
        }

        let (t, side) = self.find_edge(va, vb).ok_or({
            SkeletonError::InvalidInput("could not restore an input segment")
        })?;
        self.triangles[t].constrained[side] = true;
        if let Some(n) = self.triangles[t].neighbours[side] {
            let j = self.triangles[n].neighbour_index(t).ok_or({
                SkeletonError::InvalidInput("asymmetric triangulation neighbours")
            })?;
            self.triangles[n].constrained[j] = true;
        }

        // The forced flips may have spoiled the Delaunay criterion nearby.
        for (p, q) in new_edges {
            if let Some((t, side)) = self.find_edge(p, q) {
                self.legalize(t, side)?;
            }
        }
        Ok(())
    }

    /// The side of a triangle incident to `va` that the open segment
    /// `va → vb` crosses first.
    fn first_crossing(&self, va: usize, vb: usize) -> SkeletonResult<(usize, usize)> {
        let pa = self.pos(va);
        let pb = self.pos(vb);
        for (t, tri) in self.triangles.iter().enumerate() {
            let i = match tri.index_of(va) {
                Some(i) => i,
                None => continue,
            };
            let (u, w) = self.segment(t, i);
            let ou = orient(pa, pb, self.pos(u));
            let ow = orient(pa, pb, self.pos(w));
            if ou > 0.0 && ow < 0.0 {
                return Ok((t, i));
            }
        }
        Err(SkeletonError::InvalidInput(
            "could not restore an input segment",
        ))
    }

    /// Assign region depths: triangles reachable from the far corners
    /// without crossing a constrained side are at depth 0; every constrained
    /// crossing increments the depth.
    pub fn classify_regions(&mut self) -> SkeletonResult<()> {
        let start = self
            .triangles
            .iter()
            .position(|t| t.vertices.iter().any(|&v| !is_finite(v)))
            .ok_or(SkeletonError::InvalidInput("no far corner triangle"))?;
        let mut depth = vec![u32::MAX; self.triangles.len()];
        let mut deque = VecDeque::new();
        depth[start] = 0;
        deque.push_front(start);
        while let Some(t) = deque.pop_front() {
            let d = depth[t];
            for side in 0..3 {
                let n = match self.triangles[t].neighbours[side] {
                    Some(n) => n,
                    None => continue,
                };
                let cost = self.triangles[t].constrained[side] as u32;
                if d + cost < depth[n] {
                    depth[n] = d + cost;
                    if cost == 0 {
                        deque.push_front(n);
                    } else {
                        deque.push_back(n);
                    }
                }
            }
        }
        for (t, d) in depth.iter().enumerate() {
            if *d == u32::MAX {
                return Err(SkeletonError::InvalidInput(
                    "triangulation is not connected",
                ));
            }
            self.triangles[t].depth = *d;
        }
        Ok(())
    }
}

/// Triangulate a set of points and constraint segments (indices into
/// `points`), classifying the regions bounded by the segments.
pub fn triangulate(
    points: &[Point],
    segments: &[(usize, usize)],
) -> SkeletonResult<Triangulation> {
    if points.len() < 3 {
        return Err(SkeletonError::InvalidInput("fewer than three input points"));
    }
    let (min, max) = crate::transform::bounding_box(points);
    let mut dt = Triangulation::new(min, max);
    let mut ids = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        ids.push(dt.insert(*p, i as u32)?);
    }
    for &(a, b) in segments {
        if a >= points.len() || b >= points.len() {
            return Err(SkeletonError::InvalidInput("segment index out of range"));
        }
        dt.constrain_edge(ids[a], ids[b])?;
    }
    dt.classify_regions()?;
    Ok(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            point(0.0, 0.0),
            point(1.0, 0.0),
            point(1.0, 1.0),
            point(0.0, 1.0),
        ]
    }

    fn check_symmetry(dt: &Triangulation) {
        for (t, tri) in dt.triangles.iter().enumerate() {
            for side in 0..3 {
                if let Some(n) = tri.neighbours[side] {
                    let j = dt.triangles[n].neighbour_index(t).expect("symmetry");
                    let (a, b) = dt.segment(t, side);
                    let (c, d) = dt.segment(n, j);
                    assert_eq!((a, b), (d, c));
                    assert_eq!(tri.constrained[side], dt.triangles[n].constrained[j]);
                }
            }
            // All triangles stay counter clockwise.
            let [a, b, c] = tri.vertices;
            assert!(orient(dt.pos(a), dt.pos(b), dt.pos(c)) > 0.0);
        }
    }

    #[test]
    fn insert_points() {
        let dt = triangulate(&square(), &[]).unwrap();
        check_symmetry(&dt);
        // 4 points in a 3-corner bounding triangle: n + 3 vertices make
        // 2 * (n + 3) - 2 - 3 triangles.
        assert_eq!(dt.triangles.len(), 2 * 7 - 5);
        assert_eq!(dt.points.len(), 7);
    }

    #[test]
    fn duplicate_point_rejected() {
        let mut pts = square();
        pts.push(point(1.0, 0.0));
        assert_eq!(
            triangulate(&pts, &[]),
            Err(SkeletonError::InvalidInput(
                "duplicate input vertices at the same position"
            ))
        );
    }

    #[test]
    fn constrained_square_regions() {
        let dt = triangulate(&square(), &[(0, 1), (1, 2), (2, 3), (3, 0)]).unwrap();
        check_symmetry(&dt);
        let inside: Vec<_> = dt.triangles.iter().filter(|t| t.depth == 1).collect();
        assert_eq!(inside.len(), 2);
        for t in &inside {
            assert!(t.vertices.iter().all(|&v| is_finite(v)));
        }
        // Exactly three triangles lean on two far corners.
        let double_far = dt
            .triangles
            .iter()
            .filter(|t| t.vertices.iter().filter(|&&v| !is_finite(v)).count() == 2)
            .count();
        assert_eq!(double_far, 3);
    }

    #[test]
    fn forced_edge_survives() {
        // A segment that is not a Delaunay edge of the point set.
        let pts = vec![
            point(0.0, 0.0),
            point(2.0, 0.1),
            point(4.0, 0.0),
            point(2.0, -0.1),
        ];
        let dt = triangulate(&pts, &[(0, 2)]).unwrap();
        check_symmetry(&dt);
        let mut found = false;
        for (t, tri) in dt.triangles.iter().enumerate() {
            for side in 0..3 {
                let (a, b) = dt.segment(t, side);
                let pair = (dt.infos[a], dt.infos[b]);
                if pair == (Some(0), Some(2)) || pair == (Some(2), Some(0)) {
                    assert!(tri.constrained[side]);
                    found = true;
                }
            }
        }
        assert!(found, "constrained edge missing from the triangulation");
    }

    #[test]
    fn l_shape_regions() {
        let pts = vec![
            point(0.0, 0.0),
            point(4.0, 0.0),
            point(4.0, 2.0),
            point(2.0, 2.0),
            point(2.0, 4.0),
            point(0.0, 4.0),
        ];
        let segs: Vec<_> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        let dt = triangulate(&pts, &segs).unwrap();
        check_symmetry(&dt);
        let inside = dt.triangles.iter().filter(|t| t.depth == 1).count();
        assert_eq!(inside, 4);
    }
}
