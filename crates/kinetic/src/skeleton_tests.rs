//! End to end scenarios: whole polygons pushed through the simulator, with
//! the universal properties of a straight skeleton checked on the result.

use crate::{
    segments_properly_intersect, skeletonize, Pslg, Skeleton, SkeletonOptions, Vertex,
};
use skel_geom::math::{point, Point};

fn ring_skeleton(ring: &[Point]) -> Skeleton {
    let mut pslg = Pslg::new();
    pslg.add_polygon(ring);
    let options = SkeletonOptions {
        internal_only: true,
        ..SkeletonOptions::default()
    };
    skeletonize(&pslg, &options).expect("skeletonize")
}

/// The universal properties every valid skeleton run must satisfy.
fn check_skeleton(skel: &Skeleton) {
    // Whatever part of the structure is still alive (the outward wavefront)
    // must be properly linked.
    skel.verify_topology(0.0).expect("topology invariants");

    for v in &skel.vertices {
        let kv = match v {
            Vertex::Kinetic(kv) => kv,
            Vertex::Stationary { .. } => continue,
        };
        // Very fast vertices accumulate too much arithmetic for a position
        // check to be meaningful.
        let slow = kv.velocity.x.abs() < 100.0 && kv.velocity.y.abs() < 100.0;
        if slow {
            let d = skel
                .node(kv.start_node)
                .pos
                .distance_to(kv.position_at(kv.starts_at));
            assert!(d < 1e-6, "kv [{}] away from its start node: {}", kv.info, d);
        }
        if let Some(stops_at) = kv.stops_at {
            assert!(
                kv.starts_at <= stops_at,
                "kv [{}] stops before it starts",
                kv.info
            );
            let stop_node = kv.stop_node.expect("stopped vertex without a node");
            if slow && !kv.inf_fast {
                let d = skel
                    .node(stop_node)
                    .pos
                    .distance_to(kv.position_at(stops_at));
                assert!(d < 1e-2, "kv [{}] away from its stop node: {}", kv.info, d);
            }
        }
    }

    let segments: Vec<(Point, Point)> = skel
        .segments()
        .iter()
        .map(|s| (s.from, s.to))
        .collect();
    assert!(
        !segments_properly_intersect(&segments),
        "skeleton segments cross each other"
    );

    // Offsets sampled while the wavefront is alive must stay simple.
    let last = skel
        .vertices
        .iter()
        .filter_map(|v| v.as_kinetic().and_then(|kv| kv.stops_at))
        .fold(0.0, f64::max);
    for i in 1..8 {
        let t = last * i as f64 / 8.0;
        let offsets = skel.offsets(t);
        assert!(
            !segments_properly_intersect(&offsets),
            "offset contour at t={} crosses itself",
            t
        );
    }
}

fn stopped_count(skel: &Skeleton) -> usize {
    skel.vertices
        .iter()
        .filter_map(|v| v.as_kinetic())
        .filter(|kv| kv.stops_at.is_some())
        .count()
}

fn node_positions(skel: &Skeleton) -> Vec<Point> {
    let backward = |p: Point| match &skel.transform {
        Some(tr) => tr.backward(p),
        None => p,
    };
    skel.nodes.iter().map(|n| backward(n.pos)).collect()
}

fn has_node_near(skel: &Skeleton, p: Point, eps: f64) -> bool {
    node_positions(skel).iter().any(|n| n.distance_to(p) < eps)
}

#[test]
fn rectangle() {
    let skel = ring_skeleton(&[
        point(0.0, 0.0),
        point(10.0, 0.0),
        point(10.0, 5.0),
        point(0.0, 5.0),
    ]);
    check_skeleton(&skel);
    assert_eq!(skel.segments().len(), 5);
    assert!(has_node_near(&skel, point(2.5, 2.5), 1e-6));
    assert!(has_node_near(&skel, point(7.5, 2.5), 1e-6));
}

#[test]
fn square_collapses_to_its_centre() {
    let skel = ring_skeleton(&[
        point(0.0, 0.0),
        point(2.0, 0.0),
        point(2.0, 2.0),
        point(0.0, 2.0),
    ]);
    check_skeleton(&skel);
    assert_eq!(skel.segments().len(), 4);
    assert!(has_node_near(&skel, point(1.0, 1.0), 1e-6));
}

#[test]
fn equilateral_triangle() {
    let skel = ring_skeleton(&[
        point(0.0, 0.0),
        point(10.0, 0.0),
        point(5.0, 10.0 * 3f64.sqrt() / 2.0),
    ]);
    check_skeleton(&skel);
    assert_eq!(skel.segments().len(), 3);
    // All three segments meet at the incentre.
    let incentre = point(5.0, 10.0 / (2.0 * 3f64.sqrt()));
    assert!(has_node_near(&skel, incentre, 1e-6));
}

#[test]
fn l_shape() {
    let skel = ring_skeleton(&[
        point(0.0, 0.0),
        point(4.0, 0.0),
        point(4.0, 2.0),
        point(2.0, 2.0),
        point(2.0, 4.0),
        point(0.0, 4.0),
    ]);
    check_skeleton(&skel);
    assert_eq!(skel.segments().len(), 7);
}

#[test]
fn regular_hexagon() {
    let ring: Vec<Point> = (0..6)
        .map(|i| {
            let a = std::f64::consts::PI / 3.0 * i as f64;
            point(a.cos(), a.sin())
        })
        .collect();
    let skel = ring_skeleton(&ring);
    check_skeleton(&skel);
    assert_eq!(skel.segments().len(), 6);
    assert!(has_node_near(&skel, point(0.0, 0.0), 1e-6));
    // Every corner stopped in the centre.
    assert_eq!(stopped_count(&skel), skel.segments().len());
}

#[test]
fn four_pointed_star() {
    let mut ring = Vec::new();
    for i in 0..4 {
        let outer = std::f64::consts::FRAC_PI_2 * i as f64;
        let inner = outer + std::f64::consts::FRAC_PI_4;
        ring.push(point(2.0 * outer.cos(), 2.0 * outer.sin()));
        ring.push(point(0.5 * inner.cos(), 0.5 * inner.sin()));
    }
    let skel = ring_skeleton(&ring);
    check_skeleton(&skel);
    assert_eq!(skel.segments().len(), 12);
}

#[test]
fn needle_triangle() {
    // Exercises the tolerance handling around nearly coincident vertex
    // crash and edge collapse times.
    let skel = ring_skeleton(&[point(0.0, 0.0), point(1000.0, 0.0), point(500.0, 1.0)]);
    check_skeleton(&skel);
    assert_eq!(skel.segments().len(), 3);
}

#[test]
fn runs_are_reproducible() {
    let ring = [
        point(0.0, 0.0),
        point(4.0, 0.0),
        point(4.0, 2.0),
        point(2.0, 2.0),
        point(2.0, 4.0),
        point(0.0, 4.0),
    ];
    let a = ring_skeleton(&ring);
    let b = ring_skeleton(&ring);
    let bits = |skel: &Skeleton| -> Vec<(u64, u64)> {
        skel.nodes
            .iter()
            .map(|n| (n.pos.x.to_bits(), n.pos.y.to_bits()))
            .collect()
    };
    assert_eq!(bits(&a), bits(&b));
}

#[test]
fn full_skeleton_keeps_the_outer_rays() {
    let mut pslg = Pslg::new();
    pslg.add_polygon(&[
        point(0.0, 0.0),
        point(10.0, 0.0),
        point(10.0, 5.0),
        point(0.0, 5.0),
    ]);
    let skel = skeletonize(&pslg, &SkeletonOptions::default()).expect("skeletonize");
    check_skeleton(&skel);
    // The four exterior corner vertices never stop.
    let unstopped = skel
        .vertices
        .iter()
        .filter_map(|v| v.as_kinetic())
        .filter(|kv| kv.stops_at.is_none())
        .count();
    assert_eq!(unstopped, 4);
    assert!(skel.segments().len() > 5);
}

#[test]
fn skeleton_without_normalization() {
    let mut pslg = Pslg::new();
    pslg.add_polygon(&[
        point(-1.0, -0.5),
        point(1.0, -0.5),
        point(1.0, 0.5),
        point(-1.0, 0.5),
    ]);
    let options = SkeletonOptions {
        internal_only: true,
        shrink: false,
        ..SkeletonOptions::default()
    };
    let skel = skeletonize(&pslg, &options).expect("skeletonize");
    check_skeleton(&skel);
    assert!(skel.transform.is_none());
    assert_eq!(skel.segments().len(), 5);
}

#[test]
fn open_pslg_is_rejected() {
    let mut pslg = Pslg::new();
    pslg.add_point(point(0.0, 0.0));
    pslg.add_point(point(1.0, 0.0));
    pslg.add_point(point(0.0, 1.0));
    pslg.add_segment(0, 1);
    pslg.add_segment(1, 2);
    let err = skeletonize(&pslg, &SkeletonOptions::default()).unwrap_err();
    assert!(matches!(err, crate::SkeletonError::InvalidInput(_)));
}
