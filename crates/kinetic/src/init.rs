//! Building the kinetic data structure from the constrained triangulation.
//!
//! Every input vertex becomes a skeleton node and one kinetic vertex per
//! maximal fan of triangles between two constrained edges. Constrained sides
//! become wavefront edges carrying their supporting line; the three far hull
//! corners are collapsed into a single stationary vertex so that all
//! triangles are finite but the outer ring leans on a vertex that never
//! moves.

use crate::cdt::{is_finite, Triangulation, FAR_CORNERS};
use crate::error::{SkeletonError, SkeletonResult};
use crate::kds::{
    ccw, cw, KineticTriangle, KineticVertex, NeighbourLog, NodeId, Rotation, Skeleton,
    SkeletonNode, TriangleId, Vertex, VertexId, WavefrontId,
};
use crate::Tolerances;
use skel_geom::math::point;
use skel_geom::{wavefront_bisector, WavefrontEdge};

/// One edge of the star walk around a vertex: the triangle and the index of
/// the vertex within it.
#[derive(Copy, Clone, Debug)]
struct StarEdge {
    tri: usize,
    side: usize,
}

/// The edges around vertex `v` in counter clockwise order, starting from an
/// arbitrary incident triangle. The star is always closed because the far
/// corners seal the hull.
fn star_edges(dt: &Triangulation, v: usize, start: usize) -> SkeletonResult<Vec<StarEdge>> {
    let mut around = Vec::new();
    let mut t = start;
    loop {
        let side = dt.tri(t).index_of(v).ok_or(SkeletonError::InvalidInput(
            "star walk left the vertex",
        ))?;
        around.push(StarEdge { tri: t, side });
        t = dt.tri(t).neighbours[ccw(side)].ok_or(SkeletonError::InvalidInput(
            "vertex star is not closed",
        ))?;
        if t == start {
            return Ok(around);
        }
        if around.len() > dt.triangles.len() {
            return Err(SkeletonError::InvalidInput("vertex star does not close"));
        }
    }
}

/// Split the star of a vertex into maximal fans between constrained edges.
///
/// Walking counter clockwise, a group is closed whenever the edge ahead is
/// constrained. If the walk did not start at a constrained edge the trailing
/// group wraps around into the leading one.
fn split_star(dt: &Triangulation, around: Vec<StarEdge>) -> Vec<Vec<StarEdge>> {
    let mut groups: Vec<Vec<StarEdge>> = Vec::new();
    let mut group: Vec<StarEdge> = Vec::new();
    for edge in around {
        group.push(edge);
        if dt.tri(edge.tri).constrained[ccw(edge.side)] {
            groups.push(std::mem::take(&mut group));
        }
    }
    if !group.is_empty() {
        groups.push(group);
    }
    if groups.len() <= 1 {
        return groups;
    }
    let first = groups[0][0];
    if !dt.tri(first.tri).constrained[cw(first.side)] {
        let mut last = groups.pop().unwrap_or_default();
        last.extend(groups[0].drain(..));
        groups[0] = last;
    }
    groups
}

/// Rotate around `v` starting from triangle `t` until a triangle outside
/// `candidates` is found.
fn rotate_until_not_in_candidates(
    triangles: &[KineticTriangle],
    start: usize,
    v: VertexId,
    direction: Rotation,
    candidates: &[usize],
) -> Option<usize> {
    let mut t = start;
    let mut seen = vec![start];
    loop {
        let side = triangles[t].index_of(v)?;
        let next = triangles[t].neighbours[direction.apply(side)]?;
        let next = next.0 as usize;
        if !candidates.contains(&next) {
            return Some(next);
        }
        if seen.contains(&next) {
            return None;
        }
        seen.push(next);
        t = next;
    }
}

/// Build the kinetic data structure for the straight skeleton from a
/// constrained, region-classified triangulation.
pub fn init_skeleton(dt: &Triangulation, tol: &Tolerances) -> SkeletonResult<Skeleton> {
    let mut skel = Skeleton::default();

    // One skeleton node per input vertex.
    let mut node_of = vec![NodeId(u32::MAX); dt.points.len()];
    let mut centroid = point(0.0, 0.0);
    let finite_count = (dt.points.len() - FAR_CORNERS) as f64;
    for v in FAR_CORNERS..dt.points.len() {
        node_of[v] = skel.add_node(SkeletonNode {
            pos: dt.points[v],
            step: -1,
            info: dt.infos[v],
        });
        centroid.x += dt.points[v].x / finite_count;
        centroid.y += dt.points[v].y / finite_count;
    }
    let far_vertex = skel.add_vertex(Vertex::Stationary { pos: centroid });

    // Triangle shells parallel to the triangulation, with support lines on
    // the constrained sides and neighbour pointers nulled across them.
    const UNSET: VertexId = VertexId(u32::MAX);
    let mut triangles: Vec<KineticTriangle> = Vec::with_capacity(dt.triangles.len());
    let mut incident = vec![usize::MAX; dt.points.len()];
    for (idx, t) in dt.triangles.iter().enumerate() {
        let mut wavefronts: [Option<WavefrontId>; 3] = [None; 3];
        let mut neighbours: [Option<TriangleId>; 3] = [None; 3];
        for side in 0..3 {
            if t.constrained[side] {
                let (a, b) = dt.segment(idx, side);
                wavefronts[side] = Some(
                    skel.add_wavefront(WavefrontEdge::new(dt.points[a], dt.points[b])),
                );
            } else if let Some(n) = t.neighbours[side] {
                neighbours[side] = Some(TriangleId(n as u32));
            }
            incident[t.vertices[side]] = idx;
        }
        triangles.push(KineticTriangle {
            vertices: [UNSET; 3],
            neighbours,
            wavefronts,
            info: 0,
            stops_at: None,
            event: None,
            internal: t.depth == 1,
        });
    }

    // One kinetic vertex per fan between two constrained edges.
    struct LinkAround {
        left: (usize, usize),
        kv: VertexId,
        right: (usize, usize),
    }
    let mut link_around = Vec::new();
    for v in FAR_CORNERS..dt.points.len() {
        let around = star_edges(dt, v, incident[v])?;
        let groups = split_star(dt, around);
        if groups.len() <= 1 {
            return Err(SkeletonError::InvalidInput(
                "vertex is not incident to a closed boundary",
            ));
        }
        for group in groups {
            let first = group[0];
            let last = group[group.len() - 1];
            let left = triangles[last.tri].wavefronts[ccw(last.side)].ok_or({
                SkeletonError::InvalidInput("fan does not end at a constrained edge")
            })?;
            let right = triangles[first.tri].wavefronts[cw(first.side)].ok_or({
                SkeletonError::InvalidInput("fan does not start at a constrained edge")
            })?;

            let ul = skel.wavefront(left).line;
            let ur = skel.wavefront(right).line;
            let velocity = wavefront_bisector(&ul, &ur, tol.eps_dist);

            let info = skel.vertices.len() as u32 + 1;
            let kv = skel.add_vertex(Vertex::Kinetic(KineticVertex {
                origin: dt.points[v],
                velocity,
                inf_fast: false,
                starts_at: 0.0,
                stops_at: None,
                start_node: node_of[v],
                stop_node: None,
                wfl: left,
                wfr: right,
                ul,
                ur,
                internal: false,
                info,
                left: NeighbourLog::default(),
                right: NeighbourLog::default(),
            }));
            let mut internal = false;
            for edge in &group {
                triangles[edge.tri].vertices[edge.side] = kv;
                internal = triangles[edge.tri].internal;
            }
            skel.kinetic_mut(kv)?.internal = internal;
            link_around.push(LinkAround {
                left: (last.tri, cw(last.side)),
                kv,
                right: (first.tri, ccw(first.side)),
            });
        }
    }

    // The far corner slots were left unset; point them at the stationary
    // vertex.
    for (idx, t) in dt.triangles.iter().enumerate() {
        for side in 0..3 {
            if !is_finite(t.vertices[side]) {
                triangles[idx].vertices[side] = far_vertex;
            }
        }
    }
    if triangles
        .iter()
        .any(|t| t.vertices.iter().any(|&v| v == UNSET))
    {
        return Err(SkeletonError::InvariantViolation {
            message: "triangulation vertex not covered by any fan",
            time: 0.0,
        });
    }

    // Close the circular wavefront lists at t = 0.
    for link in &link_around {
        let left_kv = triangles[link.left.0].vertices[link.left.1];
        let right_kv = triangles[link.right.0].vertices[link.right.1];
        let kv = skel.kinetic_mut(link.kv)?;
        kv.left.set(left_kv, 0.0);
        kv.right.set(right_kv, 0.0);
    }

    // The three triangles leaning on two far corners are fully exterior;
    // remove them and stitch their finite neighbours together around the
    // shared kinetic vertex.
    let unwanted: Vec<usize> = dt
        .triangles
        .iter()
        .enumerate()
        .filter(|(_, t)| t.vertices.iter().filter(|&&v| !is_finite(v)).count() == 2)
        .map(|(idx, _)| idx)
        .collect();
    if unwanted.len() != FAR_CORNERS {
        return Err(SkeletonError::InvalidInput(
            "expected exactly three hull closing triangles",
        ));
    }
    let mut relink = Vec::new();
    for &idx in &unwanted {
        let outer = triangles[idx]
            .neighbours
            .iter()
            .position(|n| n.is_none())
            .ok_or(SkeletonError::InvariantViolation {
                message: "hull closing triangle has no outer side",
                time: 0.0,
            })?;
        let v = triangles[idx].vertices[outer];
        let ngb_cw = rotate_until_not_in_candidates(&triangles, idx, v, Rotation::Cw, &unwanted);
        let ngb_ccw = rotate_until_not_in_candidates(&triangles, idx, v, Rotation::Ccw, &unwanted);
        let (ngb_cw, ngb_ccw) = match (ngb_cw, ngb_ccw) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(SkeletonError::InvariantViolation {
                    message: "could not stitch the hull around a removed triangle",
                    time: 0.0,
                })
            }
        };
        let side_cw = triangles[ngb_cw]
            .index_of(v)
            .map(ccw)
            .ok_or(SkeletonError::InvariantViolation {
                message: "hull neighbour lost the shared vertex",
                time: 0.0,
            })?;
        let side_ccw = triangles[ngb_ccw]
            .index_of(v)
            .map(cw)
            .ok_or(SkeletonError::InvariantViolation {
                message: "hull neighbour lost the shared vertex",
                time: 0.0,
            })?;
        relink.push((ngb_cw, side_cw, ngb_ccw));
        relink.push((ngb_ccw, side_ccw, ngb_cw));
    }
    for (t, side, n) in relink {
        triangles[t].neighbours[side] = Some(TriangleId(n as u32));
    }

    // Compact the arena, dropping the removed triangles, and order the rest
    // by the position of their first vertex so runs are reproducible.
    let mut order: Vec<usize> = (0..triangles.len())
        .filter(|i| !unwanted.contains(i))
        .collect();
    order.sort_by(|&a, &b| {
        let pa = skel.position_at(triangles[a].vertices[0], 0.0);
        let pb = skel.position_at(triangles[b].vertices[0], 0.0);
        (pa.y, pa.x)
            .partial_cmp(&(pb.y, pb.x))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut remap = vec![None; triangles.len()];
    for (new_idx, &old_idx) in order.iter().enumerate() {
        remap[old_idx] = Some(TriangleId(new_idx as u32));
    }
    let mut kept = Vec::with_capacity(order.len());
    for (new_idx, &old_idx) in order.iter().enumerate() {
        let mut t = triangles[old_idx].clone();
        t.info = new_idx as u32 + 1;
        for n in t.neighbours.iter_mut() {
            *n = match *n {
                Some(old) => match remap[old.0 as usize] {
                    Some(new) => Some(new),
                    None => {
                        return Err(SkeletonError::InvariantViolation {
                            message: "kept triangle still linked to a removed one",
                            time: 0.0,
                        })
                    }
                },
                None => None,
            };
        }
        kept.push(t);
    }
    skel.triangles = kept;

    skel.verify_topology(0.0)?;
    Ok(skel)
}
