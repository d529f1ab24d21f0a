#![deny(bare_trait_objects)]

//! Straight skeletons of polygons and planar straight line graphs.
//!
//! # Crates
//!
//! This meta-crate (`skel`) reexports the following sub-crates for
//! convenience:
//!
//! * **skel_kinetic** - The kinetic triangulation simulator computing the
//!   skeleton, its input description and the constrained Delaunay
//!   triangulation feeding it.
//! * **skel_geom** - Implicit-form 2D lines, wavefront edges and the vector
//!   math they rely on.
//!
//! Each `skel_<name>` crate is reexported as a `<name>` module in `skel`,
//! and the items needed for the common case are lifted to the top level:
//!
//! ```
//! use skel::{skeletonize, Pslg, SkeletonOptions};
//! use skel::math::point;
//!
//! let mut pslg = Pslg::new();
//! pslg.add_polygon(&[
//!     point(0.0, 0.0),
//!     point(4.0, 0.0),
//!     point(4.0, 2.0),
//!     point(2.0, 2.0),
//!     point(2.0, 4.0),
//!     point(0.0, 4.0),
//! ]);
//! let options = SkeletonOptions {
//!     internal_only: true,
//!     ..SkeletonOptions::default()
//! };
//! let skeleton = skeletonize(&pslg, &options).unwrap();
//! for segment in skeleton.segments() {
//!     println!("{:?} -> {:?}", segment.from, segment.to);
//! }
//! ```

pub use skel_geom as geom;
pub use skel_kinetic as kinetic;

pub use skel_geom::math;

pub use skel_kinetic::{
    skeletonize, Pslg, Skeleton, SkeletonError, SkeletonOptions, SkeletonResult, SkeletonSegment,
    Tolerances,
};
