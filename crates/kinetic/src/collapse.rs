//! The collapse time oracle: for a kinetic triangle and the current time,
//! compute the next event (time, kind, collapsing sides), or nothing when
//! the triangle never degenerates in the future.
//!
//! The oracle is pure apart from refreshing the event cache on the triangle;
//! all queue manipulation lives with the event loop.

use crate::error::{SkeletonError, SkeletonResult};
use crate::kds::{
    ccw, cw, Event, EventKind, KineticTriangle, KineticVertex, Skeleton, TriangleId, Vertex,
};
use crate::Tolerances;
use arrayvec::ArrayVec;
use geometry_predicates::orient2d;
use skel_geom::math::{Point, Vector};
use skel_geom::utils::{near_zero, solve_quadratic};

/// Which side of "now" the sieve accepts: strictly greater for the initial
/// pass, greater-or-equal while re-evaluating during the loop so that chains
/// of immediate events are not lost.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sieve {
    Gt,
    Gte,
}

/// Tolerance-aware filter picking the earliest time not in the past.
pub(crate) fn sieve(
    times: impl IntoIterator<Item = Option<f64>>,
    now: f64,
    mode: Sieve,
    eps: f64,
) -> Option<f64> {
    let mut best: Option<f64> = None;
    for t in times.into_iter().flatten() {
        let accept = match mode {
            Sieve::Gt => t > now && !near_zero(t - now, eps),
            Sieve::Gte => t >= now,
        };
        if accept && best.map_or(true, |b| t < b) {
            best = Some(t);
        }
    }
    best
}

/// Deduplicate a list of candidate times, collapsing values within `eps` of
/// each other.
fn unique_times(mut times: Vec<f64>, eps: f64) -> Vec<f64> {
    times.sort_by(f64::total_cmp);
    times.dedup_by(|a, b| near_zero(*a - *b, eps));
    times
}

/// A moving point: the position at t = 0 and a constant velocity. The
/// stationary far vertex is a motion with zero velocity.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Motion {
    pub origin: Point,
    pub velocity: Vector,
}

impl Motion {
    fn of(v: &Vertex) -> Motion {
        match v {
            Vertex::Kinetic(kv) => Motion {
                origin: kv.origin,
                velocity: kv.velocity,
            },
            Vertex::Stationary { pos } => Motion {
                origin: *pos,
                velocity: Vector::zero(),
            },
        }
    }
}

/// The time at which two kinetic vertices are closest to each other.
///
/// The distance between two constant-velocity points is minimised by a
/// linear equation; the minimum distance is not necessarily zero, callers
/// check. Vertices moving in parallel never approach; a time in the past is
/// returned so that the sieve drops the candidate.
pub(crate) fn edge_collapse_time(v1: &KineticVertex, v2: &KineticVertex, eps: f64) -> f64 {
    let dv = v1.velocity - v2.velocity;
    let denominator = dv.dot(dv);
    if near_zero(denominator, eps) {
        log::debug!("vertices [{}] and [{}] move in parallel", v1.info, v2.info);
        return -1.0;
    }
    let w0 = v2.origin - v1.origin;
    dv.dot(w0) / denominator
}

/// The time at which `apx` meets the supporting line of the wavefront edge
/// between `org` and `dst`, assuming unit propagation speed. Undefined when
/// the vertex travels with the line.
pub(crate) fn vertex_crash_time(
    org: &KineticVertex,
    dst: &KineticVertex,
    apx: &KineticVertex,
    eps: f64,
) -> Option<f64> {
    // Both flanking vertices carry the same supporting line.
    debug_assert!((org.ur.w - dst.ul.w).length() < 1e-9 && (org.ur.b - dst.ul.b).abs() < 1e-9);
    let mv = apx.origin - org.origin;
    let n = org.ur.w;
    // Distance from the vertex to the wavefront line, and the combined speed
    // of approach per time unit.
    let dist_v_e = mv.dot(n);
    let s_proj = apx.velocity.dot(n);
    let denom = 1.0 - s_proj;
    if near_zero(denom, eps) {
        None
    } else {
        Some(dist_v_e / denom)
    }
}

/// Coefficients (A, B, C) of the quadratic in t describing the signed area
/// of the triangle spanned by three moving points (derivative form of the
/// determinant, with the common factor 0.5 dropped).
pub(crate) fn area_collapse_coeff(a: &Motion, b: &Motion, c: &Motion) -> (f64, f64, f64) {
    let (xa, ya) = (a.origin.x, a.origin.y);
    let (xb, yb) = (b.origin.x, b.origin.y);
    let (xc, yc) = (c.origin.x, c.origin.y);
    let (dxa, dya) = (a.velocity.x, a.velocity.y);
    let (dxb, dyb) = (b.velocity.x, b.velocity.y);
    let (dxc, dyc) = (c.velocity.x, c.velocity.y);
    let qa = dxa * dyb - dxb * dya + dxb * dyc - dxc * dyb + dxc * dya - dxa * dyc;
    let qb = xa * dyb - xb * dya + xb * dyc - xc * dyb + xc * dya - xa * dyc + dxa * yb - dxb * ya
        + dxb * yc
        - dxc * yb
        + dxc * ya
        - dxa * yc;
    let qc = xa * yb - xb * ya + xb * yc - xc * yb + xc * ya - xa * yc;
    (qa, qb, qc)
}

/// Roots of the area quadratic, ascending.
pub(crate) fn area_collapse_times(a: &Motion, b: &Motion, c: &Motion, eps: f64) -> ArrayVec<f64, 2> {
    let (qa, qb, qc) = area_collapse_coeff(a, b, c);
    solve_quadratic(qa, qb, qc, eps)
}

fn make_event(
    time: f64,
    tri_id: TriangleId,
    tri: &KineticTriangle,
    sides: &[usize],
    kind: EventKind,
) -> Event {
    let mut s = ArrayVec::new();
    for &side in sides {
        s.push(side);
    }
    Event {
        time,
        triangle: tri_id,
        sides: s,
        kind,
        triangle_kind: tri.kind(),
    }
}

fn kinetic_verts<'l>(
    skel: &'l Skeleton,
    tri: &KineticTriangle,
) -> SkeletonResult<[&'l KineticVertex; 3]> {
    Ok([
        skel.kinetic(tri.vertices[0])?,
        skel.kinetic(tri.vertices[1])?,
        skel.kinetic(tri.vertices[2])?,
    ])
}

fn motions(skel: &Skeleton, tri: &KineticTriangle) -> [Motion; 3] {
    [
        Motion::of(skel.vertex(tri.vertices[0])),
        Motion::of(skel.vertex(tri.vertices[1])),
        Motion::of(skel.vertex(tri.vertices[2])),
    ]
}

/// Per-side edge collapse times: side i is opposite vertex i.
fn side_collapse_times(verts: &[&KineticVertex; 3], eps: f64) -> [f64; 3] {
    [
        edge_collapse_time(verts[1], verts[2], eps),
        edge_collapse_time(verts[2], verts[0], eps),
        edge_collapse_time(verts[0], verts[1], eps),
    ]
}

fn longest_side(lengths: &[f64; 3]) -> usize {
    let mut side = 0;
    for i in 1..3 {
        if lengths[i] > lengths[side] {
            side = i;
        }
    }
    side
}

fn shortest_side(lengths: &[f64; 3]) -> usize {
    let mut side = 0;
    for i in 1..3 {
        if lengths[i] < lengths[side] {
            side = i;
        }
    }
    side
}

fn zero_sides(lengths: &[f64; 3], eps: f64) -> ArrayVec<usize, 3> {
    let mut out = ArrayVec::new();
    for (i, l) in lengths.iter().enumerate() {
        if near_zero(*l, eps) {
            out.push(i);
        }
    }
    out
}

/// Sides whose length is within `eps` of the shortest one.
fn minimal_sides(lengths: &[f64; 3], eps: f64) -> ArrayVec<usize, 3> {
    let min = lengths[shortest_side(lengths)];
    let mut out = ArrayVec::new();
    for (i, l) in lengths.iter().enumerate() {
        if near_zero(*l - min, eps) {
            out.push(i);
        }
    }
    out
}

/// A triangle bounded only by spokes collapses either because a vertex
/// sweeps across the opposing spoke (flip) or because a spoke collapses to
/// zero length (handled as an edge event even though it involves a reflex
/// vertex).
fn compute_event_0triangle(
    skel: &Skeleton,
    tri_id: TriangleId,
    tri: &KineticTriangle,
    now: f64,
    mode: Sieve,
    tol: &Tolerances,
) -> SkeletonResult<Option<Event>> {
    let verts = kinetic_verts(skel, tri)?;
    let ms = motions(skel, tri);
    let area_times = area_collapse_times(&ms[0], &ms[1], &ms[2], tol.eps_time);

    // Degenerate right now: flip it, or treat a collapsed spoke as an edge.
    for &time in &area_times {
        if near_zero(time - now, tol.eps_time) {
            let lengths = skel.side_lengths_at(tri, now);
            let zeros = zero_sides(&lengths, tol.eps_dist);
            match zeros.len() {
                1 => {
                    return Ok(Some(make_event(now, tri_id, tri, &zeros, EventKind::Edge)));
                }
                3 => {
                    return Err(SkeletonError::ImpossibleConfiguration {
                        message: "0-triangle collapsing to a point",
                        triangle: tri.info,
                        time: now,
                    })
                }
                _ => {
                    let side = longest_side(&lengths);
                    return Ok(Some(make_event(now, tri_id, tri, &[side], EventKind::Flip)));
                }
            }
        }
    }

    // A spoke collapse only counts when the side really has zero length at
    // its own time of closest approach.
    let side_times = side_collapse_times(&verts, tol.eps_time);
    let candidates = (0..3).map(|i| {
        if near_zero(skel.side_length_at(tri, i, side_times[i]), tol.eps_dist) {
            Some(side_times[i])
        } else {
            None
        }
    });
    let time_edge = sieve(candidates, now, mode, tol.eps_time);
    let time_area = sieve(area_times.iter().map(|&t| Some(t)), now, mode, tol.eps_time);

    match (time_edge, time_area) {
        (None, None) => Ok(None),
        (Some(te), Some(ta)) => {
            if near_zero(ta - te, tol.eps_time) {
                let lengths = skel.side_lengths_at(tri, te);
                let minimal = minimal_sides(&lengths, tol.eps_dist);
                match minimal.len() {
                    3 => Ok(Some(make_event(
                        te,
                        tri_id,
                        tri,
                        &[0, 1, 2],
                        EventKind::Edge,
                    ))),
                    1 => Ok(Some(make_event(te, tri_id, tri, &minimal, EventKind::Edge))),
                    _ => {
                        let lengths = skel.side_lengths_at(tri, ta);
                        let side = longest_side(&lengths);
                        Ok(Some(make_event(ta, tri_id, tri, &[side], EventKind::Flip)))
                    }
                }
            } else if ta < te {
                let lengths = skel.side_lengths_at(tri, ta);
                let side = longest_side(&lengths);
                Ok(Some(make_event(ta, tri_id, tri, &[side], EventKind::Flip)))
            } else {
                let lengths = skel.side_lengths_at(tri, te);
                let zeros = zero_sides(&lengths, tol.eps_dist);
                match zeros.len() {
                    3 => Ok(Some(make_event(
                        te,
                        tri_id,
                        tri,
                        &[0, 1, 2],
                        EventKind::Edge,
                    ))),
                    1 => Ok(Some(make_event(te, tri_id, tri, &zeros, EventKind::Edge))),
                    _ => Err(SkeletonError::ImpossibleConfiguration {
                        message: "spoke collapse with neither one nor three zero sides",
                        triangle: tri.info,
                        time: te,
                    }),
                }
            }
        }
        (Some(te), None) => {
            let lengths = skel.side_lengths_at(tri, te);
            let zeros = zero_sides(&lengths, tol.eps_dist);
            match zeros.len() {
                3 => Ok(Some(make_event(
                    te,
                    tri_id,
                    tri,
                    &[0, 1, 2],
                    EventKind::Edge,
                ))),
                1 => Ok(Some(make_event(te, tri_id, tri, &zeros, EventKind::Edge))),
                _ => Err(SkeletonError::ImpossibleConfiguration {
                    message: "0-triangle with two or zero sides collapsing",
                    triangle: tri.info,
                    time: te,
                }),
            }
        }
        (None, Some(ta)) => {
            let lengths = skel.side_lengths_at(tri, ta);
            let side = longest_side(&lengths);
            Ok(Some(make_event(ta, tri_id, tri, &[side], EventKind::Flip)))
        }
    }
}

/// A triangle with one wavefront edge either loses that edge (edge event) or
/// its apex crashes into the edge's supporting line; the latter is a split
/// when the wavefront is the longest side at crash time and a flip
/// otherwise.
fn compute_event_1triangle(
    skel: &Skeleton,
    tri_id: TriangleId,
    tri: &KineticTriangle,
    now: f64,
    mode: Sieve,
    tol: &Tolerances,
) -> SkeletonResult<Option<Event>> {
    let verts = kinetic_verts(skel, tri)?;
    let ms = motions(skel, tri);
    let wavefront_side = tri
        .neighbours
        .iter()
        .position(|n| n.is_none())
        .ok_or(SkeletonError::ImpossibleConfiguration {
            message: "1-triangle without a wavefront side",
            triangle: tri.info,
            time: now,
        })?;
    let ow = verts[ccw(wavefront_side)];
    let dw = verts[cw(wavefront_side)];
    let aw = verts[wavefront_side];

    let crash = vertex_crash_time(ow, dw, aw, tol.eps_time);

    // The apex is on the supporting line right now: flip or split at once,
    // unless a spoke has already collapsed.
    if let Some(t) = crash {
        if near_zero(t - now, tol.eps_time) {
            log::debug!("vertex crash overridden to now for [{}]", tri.info);
            let lengths = skel.side_lengths_at(tri, now);
            let zeros = zero_sides(&lengths, tol.eps_dist);
            if zeros.len() == 1 {
                return Ok(Some(make_event(now, tri_id, tri, &zeros, EventKind::Edge)));
            }
            let side = longest_side(&lengths);
            let kind = if side == wavefront_side {
                EventKind::Split
            } else {
                EventKind::Flip
            };
            return Ok(Some(make_event(now, tri_id, tri, &[side], kind)));
        }
    }

    let time_vertex_crash = sieve([crash], now, mode, tol.eps_time);
    let area_times = area_collapse_times(&ms[0], &ms[1], &ms[2], tol.eps_time);
    let time_area_collapse = sieve(area_times.iter().map(|&t| Some(t)), now, mode, tol.eps_time);
    let time_edge_collapse = sieve(
        [Some(edge_collapse_time(ow, dw, tol.eps_time))],
        now,
        mode,
        tol.eps_time,
    );

    match (time_edge_collapse, time_vertex_crash) {
        (None, None) => {
            // Neither the wavefront collapses nor the apex crashes; the
            // area can still vanish, witnessing a flip (or an immediate
            // split when it vanishes now).
            let time = match time_area_collapse {
                Some(t) => t,
                None => return Ok(None),
            };
            if near_zero(time - now, tol.eps_time) {
                return Ok(Some(make_event(
                    now,
                    tri_id,
                    tri,
                    &[wavefront_side],
                    EventKind::Split,
                )));
            }
            // Wavefront edges cannot flip; only spokes compete.
            let lengths = skel.side_lengths_at(tri, time);
            let mut side = 0;
            let mut best = f64::NEG_INFINITY;
            for i in 0..3 {
                if tri.neighbours[i].is_some() && lengths[i] > best {
                    best = lengths[i];
                    side = i;
                }
            }
            Ok(Some(make_event(time, tri_id, tri, &[side], EventKind::Flip)))
        }
        (None, Some(tv)) => {
            // Only the crash time exists. The longest side at impact tells
            // whether the wavefront is really hit (split) or the apex sweeps
            // past a spoke (flip); an earlier area collapse witnesses the
            // flip at that earlier time instead.
            let time = match time_area_collapse {
                Some(ta) if ta < tv => ta,
                _ => tv,
            };
            let lengths = skel.side_lengths_at(tri, time);
            let max = lengths[longest_side(&lengths)];
            let mut longest = ArrayVec::<usize, 3>::new();
            for (i, l) in lengths.iter().enumerate() {
                if near_zero(*l - max, tol.eps_dist) {
                    longest.push(i);
                }
            }
            if longest.len() == 1 && longest[0] == wavefront_side {
                Ok(Some(make_event(
                    tv,
                    tri_id,
                    tri,
                    &[wavefront_side],
                    EventKind::Split,
                )))
            } else {
                let zeros = zero_sides(&lengths, tol.eps_dist);
                if zeros.len() == 1 {
                    let side = shortest_side(&lengths);
                    Ok(Some(make_event(time, tri_id, tri, &[side], EventKind::Edge)))
                } else {
                    let side = longest_side(&lengths);
                    Ok(Some(make_event(time, tri_id, tri, &[side], EventKind::Flip)))
                }
            }
        }
        (Some(te), None) => Ok(Some(make_event(
            te,
            tri_id,
            tri,
            &[wavefront_side],
            EventKind::Edge,
        ))),
        (Some(te), Some(tv)) => {
            if te <= tv {
                // The wavefront collapses first (or at the same time): the
                // shortest side at that moment is the one that goes.
                let lengths = skel.side_lengths_at(tri, te);
                let side = shortest_side(&lengths);
                Ok(Some(make_event(te, tri_id, tri, &[side], EventKind::Edge)))
            } else {
                let lengths = skel.side_lengths_at(tri, tv);
                let zeros = zero_sides(&lengths, tol.eps_dist);
                match zeros.len() {
                    1 => Ok(Some(make_event(tv, tri_id, tri, &zeros, EventKind::Edge))),
                    3 => Ok(Some(make_event(
                        tv,
                        tri_id,
                        tri,
                        &[0, 1, 2],
                        EventKind::Edge,
                    ))),
                    _ => {
                        let side = longest_side(&lengths);
                        let kind = if tri.neighbours[side].is_none() {
                            EventKind::Split
                        } else {
                            EventKind::Flip
                        };
                        Ok(Some(make_event(tv, tri_id, tri, &[side], kind)))
                    }
                }
            }
        }
    }
}

/// A triangle with two wavefront edges collapses when the earlier of its two
/// wavefront sides does: either one side goes to zero length or all three
/// sides vanish together.
fn compute_event_2triangle(
    skel: &Skeleton,
    tri_id: TriangleId,
    tri: &KineticTriangle,
    now: f64,
    mode: Sieve,
    tol: &Tolerances,
) -> SkeletonResult<Option<Event>> {
    let verts = kinetic_verts(skel, tri)?;
    let ms = motions(skel, tri);
    let side_times = side_collapse_times(&verts, tol.eps_time);
    let mut times = Vec::new();
    for side in 0..3 {
        if tri.neighbours[side].is_none() {
            times.push(side_times[side]);
        }
    }
    let times = unique_times(times, tol.eps_time);
    let mut time = sieve(times.into_iter().map(Some), now, mode, tol.eps_time);
    if time.is_none() {
        let area_times = area_collapse_times(&ms[0], &ms[1], &ms[2], tol.eps_time);
        time = sieve(area_times.iter().map(|&t| Some(t)), now, mode, tol.eps_time);
    }
    let time = match time {
        Some(t) => t,
        None => return Ok(None),
    };
    let lengths = skel.side_lengths_at(tri, time);
    let minimal = minimal_sides(&lengths, tol.eps_dist);
    match minimal.len() {
        3 => Ok(Some(make_event(
            time,
            tri_id,
            tri,
            &[0, 1, 2],
            EventKind::Edge,
        ))),
        1 => Ok(Some(make_event(time, tri_id, tri, &minimal, EventKind::Edge))),
        2 => Err(SkeletonError::ImpossibleConfiguration {
            message: "2-triangle with exactly two collapsing sides",
            triangle: tri.info,
            time,
        }),
        _ => Ok(None),
    }
}

/// A triangle bounded by three wavefronts normally collapses to a point. A
/// documented floating point hazard can make zero or two sides register as
/// collapsed; both readings are overridden to "all three".
fn compute_event_3triangle(
    skel: &Skeleton,
    tri_id: TriangleId,
    tri: &KineticTriangle,
    now: f64,
    mode: Sieve,
    tol: &Tolerances,
) -> SkeletonResult<Option<Event>> {
    let verts = kinetic_verts(skel, tri)?;
    let ms = motions(skel, tri);
    let side_times = side_collapse_times(&verts, tol.eps_time);
    let mut collapsing = ArrayVec::<usize, 3>::new();
    for i in 0..3 {
        if near_zero(skel.side_length_at(tri, i, side_times[i]), tol.eps_dist) {
            collapsing.push(i);
        }
    }
    let time_edge = sieve(
        side_times.iter().map(|&t| Some(t)),
        now,
        mode,
        tol.eps_time,
    );
    if let Some(te) = time_edge {
        let sides: &[usize] = match collapsing.len() {
            0 => {
                log::error!(
                    "3-triangle [{}]: no side registers as collapsing, overriding to all three",
                    tri.info
                );
                &[0, 1, 2]
            }
            2 => {
                log::warn!(
                    "3-triangle [{}]: two sides register as collapsing, overriding to all three",
                    tri.info
                );
                &[0, 1, 2]
            }
            _ => &collapsing,
        };
        return Ok(Some(make_event(te, tri_id, tri, sides, EventKind::Edge)));
    }
    let area_times = area_collapse_times(&ms[0], &ms[1], &ms[2], tol.eps_time);
    if let Some(ta) = sieve(area_times.iter().map(|&t| Some(t)), now, mode, tol.eps_time) {
        log::error!(
            "3-triangle [{}]: falling back to the area collapse time",
            tri.info
        );
        return Ok(Some(make_event(ta, tri_id, tri, &[0, 1, 2], EventKind::Edge)));
    }
    Ok(None)
}

/// A triangle leaning on the stationary far vertex. When the opposite side
/// is a wavefront it can only collapse as an edge; otherwise the triangle
/// can only flip, shedding the shorter of the two legs incident to the far
/// vertex.
fn compute_event_inftriangle(
    skel: &Skeleton,
    tri_id: TriangleId,
    tri: &KineticTriangle,
    now: f64,
    mode: Sieve,
    tol: &Tolerances,
) -> SkeletonResult<Option<Event>> {
    let side = tri
        .vertices
        .iter()
        .position(|&v| !skel.vertex(v).is_kinetic())
        .ok_or(SkeletonError::ImpossibleConfiguration {
            message: "infinite triangle without a stationary vertex",
            triangle: tri.info,
            time: now,
        })?;
    let o = skel.kinetic(tri.vertices[cw(side)])?;
    let d = skel.kinetic(tri.vertices[ccw(side)])?;

    if tri.neighbours[side].is_none() {
        // A wavefront edge on the hull: it only collapses if the two
        // vertices truly meet at their closest approach.
        let t = edge_collapse_time(o, d, tol.eps_time);
        let time = sieve([Some(t)], now, Sieve::Gt, tol.eps_time);
        if let Some(time) = time {
            if near_zero(skel.side_length_at(tri, side, time), tol.eps_dist) {
                return Ok(Some(make_event(time, tri_id, tri, &[side], EventKind::Edge)));
            }
        }
        return Ok(None);
    }

    let ms = motions(skel, tri);
    let area_times = area_collapse_times(&ms[0], &ms[1], &ms[2], tol.eps_time);
    let time = match sieve(area_times.iter().map(|&t| Some(t)), now, mode, tol.eps_time) {
        Some(t) => t,
        None => return Ok(None),
    };
    if near_zero(skel.side_length_at(tri, side, time), tol.eps_dist) {
        return Ok(Some(make_event(time, tri_id, tri, &[side], EventKind::Edge)));
    }
    // The flip of an infinite triangle flips the shorter of the two legs
    // incident to the stationary vertex.
    let legs = [cw(side), ccw(side)];
    let d0 = skel.side_length_at(tri, legs[0], time);
    let d1 = skel.side_length_at(tri, legs[1], time);
    let flip_side = if d0 <= d1 { legs[0] } else { legs[1] };
    Ok(Some(make_event(
        time,
        tri_id,
        tri,
        &[flip_side],
        EventKind::Flip,
    )))
}

fn orient_at(skel: &Skeleton, tri: &KineticTriangle, t: f64) -> f64 {
    let p0 = skel.position_at(tri.vertices[0], t);
    let p1 = skel.position_at(tri.vertices[1], t);
    let p2 = skel.position_at(tri.vertices[2], t);
    orient2d([p0.x, p0.y], [p1.x, p1.y], [p2.x, p2.y])
}

/// Compute the next event for a triangle and refresh its event cache.
pub(crate) fn compute_collapse_time(
    skel: &mut Skeleton,
    tri_id: TriangleId,
    now: f64,
    mode: Sieve,
    tol: &Tolerances,
) -> SkeletonResult<Option<Event>> {
    let tri = skel.tri(tri_id).clone();
    if tri.stops_at.is_some() {
        return Ok(None);
    }
    let event = if skel.tri_is_finite(&tri) {
        let event = match tri.kind() {
            0 => compute_event_0triangle(skel, tri_id, &tri, now, mode, tol)?,
            1 => compute_event_1triangle(skel, tri_id, &tri, now, mode, tol)?,
            2 => compute_event_2triangle(skel, tri_id, &tri, now, mode, tol)?,
            _ => compute_event_3triangle(skel, tri_id, &tri, now, mode, tol)?,
        };
        // Numerical failure guards. Neither alters the computed event; they
        // surface configurations where an event was likely missed.
        let any_inf_fast = tri.vertices.iter().any(|&v| skel.vertex(v).inf_fast());
        match &event {
            Some(evt) if !any_inf_fast => {
                let mid = (evt.time - now) * 0.5 + now;
                if orient_at(skel, &tri, mid) < 0.0 {
                    log::warn!(
                        "triangle [{}] inverts before its next event at {}",
                        tri.info,
                        evt.time
                    );
                }
            }
            None if !any_inf_fast => {
                if orient_at(skel, &tri, now + 10.0) < 0.0 {
                    log::error!(
                        "triangle [{}] has no event but inverts in the future",
                        tri.info
                    );
                }
            }
            _ => {}
        }
        event
    } else {
        compute_event_inftriangle(skel, tri_id, &tri, now, mode, tol)?
    };
    skel.tri_mut(tri_id).event = event.clone();
    log::debug!("oracle: [{}] -> {:?}", tri.info, event);
    Ok(event)
}

/// Re-classify a triangle that is known to collapse at `time`: every side
/// whose length matches the shortest one collapses.
pub(crate) fn reclassified_edge_event(
    skel: &Skeleton,
    tri_id: TriangleId,
    time: f64,
    tol: &Tolerances,
) -> Event {
    let tri = skel.tri(tri_id);
    let lengths = skel.side_lengths_at(tri, time);
    let sides = minimal_sides(&lengths, tol.eps_dist);
    make_event(time, tri_id, tri, &sides, EventKind::Edge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kds::{KineticVertex, NeighbourLog, NodeId, VertexId, WavefrontId};
    use skel_geom::math::{point, vector};
    use skel_geom::Line;

    fn kv(origin: Point, velocity: Vector) -> Vertex {
        Vertex::Kinetic(KineticVertex {
            origin,
            velocity,
            inf_fast: false,
            starts_at: 0.0,
            stops_at: None,
            start_node: NodeId(0),
            stop_node: None,
            wfl: WavefrontId(0),
            wfr: WavefrontId(0),
            ul: Line::from_points(point(0.0, 0.0), point(1.0, 0.0)),
            ur: Line::from_points(point(0.0, 0.0), point(1.0, 0.0)),
            internal: true,
            info: 0,
            left: NeighbourLog::default(),
            right: NeighbourLog::default(),
        })
    }

    /// A single-triangle skeleton; `spokes[i]` tells whether side i has a
    /// neighbour (the id is a dummy, the oracle only checks presence).
    fn single_triangle(verts: [Vertex; 3], spokes: [bool; 3]) -> (Skeleton, TriangleId) {
        let mut skel = Skeleton::default();
        for v in verts {
            skel.add_vertex(v);
        }
        let mut neighbours = [None; 3];
        for (i, &s) in spokes.iter().enumerate() {
            if s {
                neighbours[i] = Some(TriangleId(7));
            }
        }
        // The wavefront supporting lines of the vertices flanking each
        // wavefront side run through their origins.
        let tri = KineticTriangle {
            vertices: [VertexId(0), VertexId(1), VertexId(2)],
            neighbours,
            wavefronts: [None; 3],
            info: 1,
            stops_at: None,
            event: None,
            internal: true,
        };
        for side in 0..3 {
            if spokes[side] {
                continue;
            }
            let from = skel.position_at(tri.vertices[ccw(side)], 0.0);
            let to = skel.position_at(tri.vertices[cw(side)], 0.0);
            let line = Line::from_points(from, to);
            if let Vertex::Kinetic(v) = &mut skel.vertices[tri.vertices[ccw(side)].0 as usize] {
                v.ur = line;
            }
            if let Vertex::Kinetic(v) = &mut skel.vertices[tri.vertices[cw(side)].0 as usize] {
                v.ul = line;
            }
        }
        skel.triangles.push(tri);
        (skel, TriangleId(0))
    }

    fn next_event(skel: &mut Skeleton, tri: TriangleId) -> Option<Event> {
        compute_collapse_time(skel, tri, 0.0, Sieve::Gte, &Tolerances::default()).unwrap()
    }

    #[test]
    fn infinite_triangle_flip() {
        let (mut skel, tri) = single_triangle(
            [
                Vertex::Stationary {
                    pos: point(2.0, 4.0),
                },
                kv(point(2.0, 0.0), vector(-0.5, -0.5)),
                kv(point(1.0, 1.0), vector(0.5, 0.0)),
            ],
            [true, true, true],
        );
        let evt = next_event(&mut skel, tri).expect("event");
        assert!((evt.time - 1.211102550928).abs() < 1e-9);
        assert_eq!(evt.kind, EventKind::Flip);
    }

    #[test]
    fn infinite_triangle_edge() {
        let (mut skel, tri) = single_triangle(
            [
                Vertex::Stationary {
                    pos: point(1.0, 4.0),
                },
                kv(point(2.0, 0.0), vector(-0.5, -0.5)),
                kv(point(0.0, 0.0), vector(0.5, -0.5)),
            ],
            [true, true, true],
        );
        let evt = next_event(&mut skel, tri).expect("event");
        assert!((evt.time - 2.0).abs() < 1e-9);
        assert_eq!(evt.kind, EventKind::Edge);
    }

    #[test]
    fn infinite_triangle_diverging_has_no_event() {
        let (mut skel, tri) = single_triangle(
            [
                Vertex::Stationary {
                    pos: point(2.0, 4.0),
                },
                kv(point(4.0, 0.0), vector(0.5, -0.5)),
                kv(point(0.0, 0.0), vector(-0.5, -0.5)),
            ],
            [true, true, true],
        );
        assert_eq!(next_event(&mut skel, tri), None);
    }

    #[test]
    fn infinite_triangle_hull_wavefront_edge() {
        let (mut skel, tri) = single_triangle(
            [
                Vertex::Stationary {
                    pos: point(1.0, 4.0),
                },
                kv(point(2.0, 0.0), vector(-0.5, -0.5)),
                kv(point(0.0, 0.0), vector(0.5, -0.5)),
            ],
            [false, true, true],
        );
        let evt = next_event(&mut skel, tri).expect("event");
        assert!((evt.time - 2.0).abs() < 1e-9);
        assert_eq!(evt.kind, EventKind::Edge);
        assert_eq!(&evt.sides[..], &[0]);
    }

    #[test]
    fn one_wavefront_spoke_collapse_is_an_edge_event() {
        // The apex meets the vertex above it exactly when it reaches the
        // advancing wavefront line.
        let (mut skel, tri) = single_triangle(
            [
                kv(point(2.0, 4.0), vector(0.0, -0.5)),
                kv(point(0.0, 0.0), vector(0.0, 1.0)),
                kv(point(2.0, 0.0), vector(0.0, 1.0)),
            ],
            [false, true, true],
        );
        let evt = next_event(&mut skel, tri).expect("event");
        assert!((evt.time - 8.0 / 3.0).abs() < 1e-9);
        assert_eq!(evt.kind, EventKind::Edge);
        assert_eq!(&evt.sides[..], &[1]);
    }

    #[test]
    fn one_wavefront_split() {
        let (mut skel, tri) = single_triangle(
            [
                kv(point(1.0, 4.0), vector(0.0, -0.5)),
                kv(point(0.0, 0.0), vector(0.0, 1.0)),
                kv(point(2.0, 0.0), vector(0.0, 1.0)),
            ],
            [false, true, true],
        );
        let evt = next_event(&mut skel, tri).expect("event");
        assert!((evt.time - 8.0 / 3.0).abs() < 1e-9);
        assert_eq!(evt.kind, EventKind::Split);
        assert_eq!(&evt.sides[..], &[0]);
    }

    #[test]
    fn one_wavefront_edge_collapse() {
        let (mut skel, tri) = single_triangle(
            [
                kv(point(1.0, 4.0), vector(0.0, -0.5)),
                kv(point(0.0, 0.0), vector(0.5, 0.5)),
                kv(point(2.0, 0.0), vector(-0.5, 0.5)),
            ],
            [false, true, true],
        );
        let evt = next_event(&mut skel, tri).expect("event");
        assert!((evt.time - 2.0).abs() < 1e-9);
        assert_eq!(evt.kind, EventKind::Edge);
        assert_eq!(&evt.sides[..], &[0]);
    }

    #[test]
    fn one_wavefront_flip() {
        // The apex reaches the supporting line beyond the wavefront edge's
        // end: a spoke is swept over instead.
        let (mut skel, tri) = single_triangle(
            [
                kv(point(3.0, 4.0), vector(0.0, -0.5)),
                kv(point(0.0, 0.0), vector(0.0, 1.0)),
                kv(point(2.0, 0.0), vector(0.0, 1.0)),
            ],
            [false, true, true],
        );
        let evt = next_event(&mut skel, tri).expect("event");
        assert!((evt.time - 8.0 / 3.0).abs() < 1e-9);
        assert_eq!(evt.kind, EventKind::Flip);
    }

    #[test]
    fn three_wavefronts_collapse_to_point() {
        // An equilateral-ish shrinking triangle: all sides vanish together.
        let s3 = 3f64.sqrt();
        let (mut skel, tri) = single_triangle(
            [
                kv(point(0.0, 0.0), vector(1.0, s3 / 3.0).normalize() / (s3 / 3.0)),
                kv(point(2.0, 0.0), vector(-1.0, s3 / 3.0).normalize() / (s3 / 3.0)),
                kv(point(1.0, s3), vector(0.0, -1.0) / (s3 / 3.0)),
            ],
            [false, false, false],
        );
        let evt = next_event(&mut skel, tri).expect("event");
        assert_eq!(evt.kind, EventKind::Edge);
        assert_eq!(&evt.sides[..], &[0, 1, 2]);
        assert!(evt.time > 0.0);
    }

    #[test]
    fn sieve_variants() {
        let eps = 1e-8;
        let times = [Some(1.0), None, Some(3.0), Some(-2.0)];
        assert_eq!(sieve(times, 1.0, Sieve::Gt, eps), Some(3.0));
        assert_eq!(sieve(times, 1.0, Sieve::Gte, eps), Some(1.0));
        assert_eq!(sieve(times, 4.0, Sieve::Gte, eps), None);
        // Values within eps of now count as now.
        assert_eq!(sieve([Some(1.0 + 1e-12)], 1.0, Sieve::Gt, eps), None);
    }

    #[test]
    fn area_coefficients_match_determinant() {
        let a = Motion {
            origin: point(0.0, 0.0),
            velocity: vector(0.3, 0.1),
        };
        let b = Motion {
            origin: point(2.0, 0.0),
            velocity: vector(-0.2, 0.4),
        };
        let c = Motion {
            origin: point(1.0, 2.0),
            velocity: vector(0.0, -0.5),
        };
        let (qa, qb, qc) = area_collapse_coeff(&a, &b, &c);
        for &t in &[0.0, 0.7, 1.9, 3.3] {
            let pa = a.origin + a.velocity * t;
            let pb = b.origin + b.velocity * t;
            let pc = c.origin + c.velocity * t;
            let det = (pb.x - pa.x) * (pc.y - pa.y) - (pc.x - pa.x) * (pb.y - pa.y);
            let poly = qa * t * t + qb * t + qc;
            assert!((det - poly).abs() < 1e-9, "t={}: {} vs {}", t, det, poly);
        }
    }
}
