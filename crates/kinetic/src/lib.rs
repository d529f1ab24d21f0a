#![deny(bare_trait_objects)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::many_single_char_names)]

//! Straight skeletons of planar straight line graphs, computed by
//! simulating a kinetic triangulation.
//!
//! This crate is reexported in [skel](https://docs.rs/skel/).
//!
//! # Overview
//!
//! The straight skeleton of a polygon is the trace left by the corners of
//! its boundary as every edge moves inward at unit speed. The simulator
//! maintains a triangulation of the moving boundary: every triangle is
//! watched for the moment it degenerates, the resulting events are processed
//! in time order, and each event performs a local surgery (an edge collapse,
//! a diagonal flip, a wavefront split, or the retirement of a fan of
//! parallel wavefronts) that keeps the triangulation consistent until every
//! interior triangle has vanished.
//!
//! The entry point is [`skeletonize`]:
//!
//! ```
//! use skel_kinetic::{skeletonize, Pslg, SkeletonOptions};
//! use skel_geom::math::point;
//!
//! let mut pslg = Pslg::new();
//! pslg.add_polygon(&[
//!     point(0.0, 0.0),
//!     point(10.0, 0.0),
//!     point(10.0, 5.0),
//!     point(0.0, 5.0),
//! ]);
//! let options = SkeletonOptions {
//!     internal_only: true,
//!     ..SkeletonOptions::default()
//! };
//! let skeleton = skeletonize(&pslg, &options).unwrap();
//! assert_eq!(skeleton.segments().len(), 5);
//! ```

pub mod cdt;
mod collapse;
mod error;
mod events;
mod init;
mod kds;
mod pslg;
mod queue;
pub mod transform;

#[cfg(test)]
mod skeleton_tests;

#[doc(inline)]
pub use crate::error::{SkeletonError, SkeletonResult};
#[doc(inline)]
pub use crate::kds::{
    ccw, cw, Event, EventKind, KineticTriangle, KineticVertex, NodeId, Rotation, Skeleton,
    SkeletonNode, SkeletonSegment, TriangleId, Vertex, VertexId, WavefrontId,
};
#[doc(inline)]
pub use crate::pslg::{segments_properly_intersect, Pslg};
#[doc(inline)]
pub use crate::transform::Transform;

use skel_geom::utils::EPSILON;

/// The near-zero thresholds threaded through the oracle and the event
/// handlers. All comparisons of times and distances go through these; on
/// coordinates normalized to `[-1, 1]` the defaults are appropriate.
#[derive(Clone, Debug, PartialEq)]
pub struct Tolerances {
    pub eps_time: f64,
    pub eps_dist: f64,
    pub eps_angle: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            eps_time: EPSILON,
            eps_dist: EPSILON,
            eps_angle: EPSILON,
        }
    }
}

/// Options controlling a skeleton computation.
#[derive(Clone, Debug, PartialEq)]
pub struct SkeletonOptions {
    /// Retain only the vertices and triangles on the interior side of the
    /// input boundary.
    pub internal_only: bool,
    /// Scale the input into the `[-1, 1]²` box before propagating and record
    /// the inverse transform on the result. On by default: the tolerances
    /// are calibrated for normalized coordinates.
    pub shrink: bool,
    /// Diagnostic hook for hosted environments; accepted and ignored.
    pub pause: bool,
    pub tolerances: Tolerances,
}

impl Default for SkeletonOptions {
    fn default() -> Self {
        SkeletonOptions {
            internal_only: false,
            shrink: true,
            pause: false,
            tolerances: Tolerances::default(),
        }
    }
}

/// Compute the straight skeleton of the input graph.
///
/// The input is validated (closed boundaries, no duplicate points, no
/// crossing segments), normalized, triangulated, and propagated until every
/// interior triangle has collapsed. Failures are fail-fast: the partially
/// built skeleton is discarded.
pub fn skeletonize(pslg: &Pslg, options: &SkeletonOptions) -> SkeletonResult<Skeleton> {
    pslg.validate()?;

    let (points, tr) = if options.shrink {
        let (min, max) = transform::bounding_box(pslg.points());
        let tr = transform::fitting_transform(min, max);
        let points = pslg.points().iter().map(|&p| tr.forward(p)).collect();
        (points, Some(tr))
    } else {
        (pslg.points().to_vec(), None)
    };

    let dt = cdt::triangulate(&points, pslg.segments())?;
    let mut skel = init::init_skeleton(&dt, &options.tolerances)?;
    if options.pause {
        log::debug!("pause requested; no interactive host attached");
    }
    let last = events::propagate(&mut skel, &options.tolerances)?;
    log::debug!("propagation finished at t={}", last);
    skel.transform = tr;
    if options.internal_only {
        Ok(skel.internal_only())
    } else {
        Ok(skel)
    }
}
