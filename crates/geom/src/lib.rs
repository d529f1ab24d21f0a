#![deny(bare_trait_objects)]
#![allow(clippy::many_single_char_names)]

//! 2D line and wavefront primitives for straight skeleton computation.
//!
//! This crate is reexported in [skel](https://docs.rs/skel/).
//!
//! # Overview
//!
//! The propagating polygon boundary (the *wavefront*) is represented by lines
//! in implicit form: a unit normal `w` and an offset `b` such that the line is
//! the set of points `p` with `w·p + b = 0`. Translating such a line by `w·t`
//! yields its position after `t` time units of unit-speed propagation, which
//! makes the implicit form the natural representation for offsetting
//! operations.
//!
//! The most used items are:
//!
//! * [`Line`](struct.Line.html) - a line in implicit form,
//! * [`WavefrontEdge`](struct.WavefrontEdge.html) - a line carrying the two
//!   endpoints it was constructed from,
//! * [`intersect`](fn.intersect.html) - line/line intersection classification,
//! * [`wavefront_bisector`](fn.wavefront_bisector.html) - the velocity of the
//!   corner traced by two adjacent wavefront edges.

// Reexport dependencies.
pub use arrayvec;
pub use euclid;

#[cfg(feature = "serialization")]
#[macro_use]
pub extern crate serde;

mod line;
pub mod utils;

#[doc(inline)]
pub use crate::line::{
    intersect, wavefront_bisector, wavefront_intersection, Line, LineIntersection, WavefrontEdge,
};

pub mod math {
    //! f64 aliases of the euclid types used throughout the skeleton crates.

    /// Alias for `euclid::default::Point2D<f64>`.
    pub type Point = euclid::default::Point2D<f64>;

    /// Alias for `euclid::default::Vector2D<f64>`.
    pub type Vector = euclid::default::Vector2D<f64>;

    /// Alias for `euclid::default::Box2D<f64>`.
    pub type Box2D = euclid::default::Box2D<f64>;

    /// Shorthand for `Point::new`.
    #[inline]
    pub fn point(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    /// Shorthand for `Vector::new`.
    #[inline]
    pub fn vector(x: f64, y: f64) -> Vector {
        Vector::new(x, y)
    }
}
