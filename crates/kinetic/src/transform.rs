//! Normalization of input coordinates to the `[-1, 1]²` box and back.
//!
//! Propagation runs on normalized coordinates so that one near-zero
//! threshold fits every input; the inverse transform is recorded on the
//! skeleton and applied when exporting segments.

use skel_geom::math::{point, Point};

/// A uniform scale around a centre: maps the input bounding box into the
/// `[-1, 1]²` box and back.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub translate: Point,
}

impl Transform {
    /// From the original box to the `(-1,-1),(1,1)` box.
    #[inline]
    pub fn forward(&self, pt: Point) -> Point {
        point(
            (pt.x - self.translate.x) / self.scale,
            (pt.y - self.translate.y) / self.scale,
        )
    }

    /// From the `(-1,-1),(1,1)` box back to the original box.
    #[inline]
    pub fn backward(&self, pt: Point) -> Point {
        point(
            pt.x * self.scale + self.translate.x,
            pt.y * self.scale + self.translate.y,
        )
    }
}

/// Tight axis aligned bounding box around a non-empty set of points.
pub fn bounding_box(pts: &[Point]) -> (Point, Point) {
    debug_assert!(!pts.is_empty());
    let mut min = pts[0];
    let mut max = pts[0];
    for p in &pts[1..] {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}

/// The transform scaling the given box into `(-1,-1),(1,1)`, preserving the
/// aspect ratio.
pub fn fitting_transform(min: Point, max: Point) -> Transform {
    let centre = point((min.x + max.x) * 0.5, (min.y + max.y) * 0.5);
    let scale = ((max.x - min.x) * 0.5).max((max.y - min.y) * 0.5);
    Transform {
        scale,
        translate: centre,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let tr = fitting_transform(point(0.0, 0.0), point(10.0, 5.0));
        let p = point(7.0, 2.0);
        let fwd = tr.forward(p);
        assert!(fwd.x.abs() <= 1.0 && fwd.y.abs() <= 1.0);
        let back = tr.backward(fwd);
        assert!(back.distance_to(p) < 1e-12);
    }

    #[test]
    fn aspect_ratio_is_preserved(){
        let tr = fitting_transform(point(0.0, 0.0), point(10.0, 5.0));
        assert_eq!(tr.scale, 5.0);
        assert_eq!(tr.forward(point(5.0, 2.5)), point(0.0, 0.0));
        assert_eq!(tr.forward(point(10.0, 2.5)), point(1.0, 0.0));
        // The short axis maps inside the box.
        assert_eq!(tr.forward(point(5.0, 5.0)), point(0.0, 0.5));
    }
}
