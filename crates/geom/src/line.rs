use crate::math::{point, Point, Vector};
use crate::utils::near_zero;

/// A line in implicit form: the set of points `p` with `w·p + b = 0`, where
/// the normal `w` is kept unit length.
///
/// The sign of `w·p + b` gives the oriented side of the line: positive to the
/// left of the direction the line was constructed along. For a wavefront edge
/// the normal points towards the interior being shrunk, and translating by
/// `w·t` yields the edge after `t` time units of unit-speed propagation.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Line {
    pub w: Vector,
    pub b: f64,
}

impl Line {
    /// Build a line from a normal and offset, normalizing the coefficients.
    pub fn new(w: Vector, b: f64) -> Self {
        let nrm = w.length();
        debug_assert!(nrm > 0.0);
        Line {
            w: w / nrm,
            b: b / nrm,
        }
    }

    /// The line through `start` and `end`, with its normal pointing to the
    /// left of the start→end direction.
    ///
    /// Axis aligned inputs produce exact `0`/`±1` normal components rather
    /// than going through the generic (rounding) normalization.
    pub fn from_points(start: Point, end: Point) -> Self {
        debug_assert!(start != end);
        let (px, py) = (start.x, start.y);
        let (qx, qy) = (end.x, end.y);
        if py == qy {
            // horizontal
            let (b, c) = if qx > px { (1.0, -py) } else { (-1.0, py) };
            Line {
                w: Vector::new(0.0, b),
                b: c,
            }
        } else if px == qx {
            // vertical
            let (a, c) = if qy > py { (-1.0, px) } else { (1.0, -px) };
            Line {
                w: Vector::new(a, 0.0),
                b: c,
            }
        } else {
            let a = py - qy;
            let b = qx - px;
            let c = -px * a - py * b;
            Line::new(Vector::new(a, b), c)
        }
    }

    /// Signed distance of `p` to this line: positive left, negative right,
    /// zero on the line.
    #[inline]
    pub fn signed_distance(&self, p: Point) -> f64 {
        self.w.dot(p.to_vector()) + self.b
    }

    /// This line translated along the vector `v`.
    #[inline]
    pub fn translated(&self, v: Vector) -> Self {
        Line {
            w: self.w,
            b: self.b - self.w.dot(v),
        }
    }

    /// The line after `t` time units of unit-speed propagation along its
    /// normal.
    #[inline]
    pub fn at_time(&self, t: f64) -> Self {
        if t == 0.0 {
            *self
        } else {
            self.translated(self.w * t)
        }
    }

    /// The angle bisector of this line and `other`.
    ///
    /// Both normals are unit length so the bisector coefficients are the sums
    /// of the coefficients. When the sum degenerates (opposite lines) the
    /// difference is used instead.
    pub fn bisector(&self, other: &Line) -> Line {
        let w = self.w + other.w;
        let b = self.b + other.b;
        if w.x == 0.0 && w.y == 0.0 {
            Line::new(self.w - other.w, self.b - other.b)
        } else {
            Line::new(w, b)
        }
    }

    /// The line perpendicular to this one passing through `through`, directed
    /// 90 degrees counterclockwise.
    pub fn perpendicular(&self, through: Point) -> Line {
        let w = Vector::new(-self.w.y, self.w.x);
        Line {
            w,
            b: self.w.y * through.x - self.w.x * through.y,
        }
    }

    /// A point on the line (its projection of the origin).
    #[inline]
    pub fn through(&self) -> Point {
        (self.w * -self.b).to_point()
    }
}

/// The result of intersecting two lines.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LineIntersection {
    /// The lines cross in a single point.
    Point(Point),
    /// The lines share the same supporting line.
    Coincident,
    /// Parallel and distinct: no intersection.
    None,
}

/// Classify the intersection of two lines given in implicit form.
pub fn intersect(one: &Line, other: &Line, eps: f64) -> LineIntersection {
    let (a1, b1, c1) = (one.w.x, one.w.y, one.b);
    let (a2, b2, c2) = (other.w.x, other.w.y, other.b);
    let denom = a1 * b2 - a2 * b1;
    if near_zero(denom, eps) {
        let x1 = a1 * c2 - a2 * c1;
        let x2 = b1 * c2 - b2 * c1;
        if near_zero(x1, eps) && near_zero(x2, eps) {
            LineIntersection::Coincident
        } else {
            LineIntersection::None
        }
    } else {
        let num1 = b1 * c2 - b2 * c1;
        let num2 = a2 * c1 - a1 * c2;
        LineIntersection::Point(point(num1 / denom, num2 / denom))
    }
}

/// A wavefront edge: a propagating line that remembers the two endpoints it
/// was constructed from. The endpoints only identify the edge; the
/// propagating geometry is the line itself.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct WavefrontEdge {
    pub line: Line,
    pub start: Point,
    pub end: Point,
}

impl WavefrontEdge {
    pub fn new(start: Point, end: Point) -> Self {
        WavefrontEdge {
            line: Line::from_points(start, end),
            start,
            end,
        }
    }
}

/// Velocity of the corner traced by two adjacent wavefront edges, evaluated
/// from the configuration at t = 0.
///
/// * Crossing lines: the corner is the intersection point; its velocity is
///   the intersection at t = 1 minus the intersection at t = 0.
/// * Coincident lines: the velocity is `0.5·(wl + wr)`, which is either near
///   zero (edges moving in opposite directions) or the common normal.
/// * Parallel distinct lines: `wl + wr`, near zero for a degenerate corner.
pub fn wavefront_bisector(left: &Line, right: &Line, eps: f64) -> Vector {
    match intersect(left, right, eps) {
        LineIntersection::Coincident => (left.w + right.w) * 0.5,
        LineIntersection::None => left.w + right.w,
        LineIntersection::Point(p0) => {
            let left_t = left.translated(left.w);
            let right_t = right.translated(right.w);
            match intersect(&left_t, &right_t, eps) {
                LineIntersection::Point(p1) => p1 - p0,
                // Translation preserves the normals, so the translated pair
                // must cross as well.
                _ => left.w + right.w,
            }
        }
    }
}

/// Where two adjacent wavefront edges meet at time `t`, if they cross.
pub fn wavefront_intersection(left: &Line, right: &Line, t: f64, eps: f64) -> Option<Point> {
    match intersect(&left.at_time(t), &right.at_time(t), eps) {
        LineIntersection::Point(p) => Some(p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::vector;
    use crate::utils::EPSILON;

    #[test]
    fn from_points_axis_aligned() {
        let x_axis = Line::from_points(point(0.0, 0.0), point(1.0, 0.0));
        assert_eq!(x_axis.w, vector(0.0, 1.0));
        assert_eq!(x_axis.b, 0.0);
        assert!(x_axis.signed_distance(point(0.0, 10.0)) > 0.0);
        assert!(x_axis.signed_distance(point(0.0, -10.0)) < 0.0);

        let y_axis = Line::from_points(point(0.0, 0.0), point(0.0, 1.0));
        assert_eq!(y_axis.w, vector(-1.0, 0.0));
        assert!(y_axis.signed_distance(point(-1.0, 5.0)) > 0.0);

        let reversed = Line::from_points(point(1.0, 0.0), point(0.0, 0.0));
        assert_eq!(reversed.w, vector(0.0, -1.0));
    }

    #[test]
    fn from_points_diagonal_is_normalized() {
        let l = Line::from_points(point(0.0, 0.0), point(1.0, 1.0));
        assert!((l.w.length() - 1.0).abs() < 1e-12);
        assert!(near_zero(l.signed_distance(point(0.5, 0.5)), EPSILON));
        assert!(near_zero(l.signed_distance(point(2.0, 2.0)), EPSILON));
    }

    #[test]
    fn translated_moves_with_normal() {
        let x_axis = Line::from_points(point(0.0, 0.0), point(1.0, 0.0));
        let up = x_axis.translated(vector(0.0, 1.0));
        assert!(near_zero(up.signed_distance(point(0.0, 1.0)), EPSILON));
        // Translating along the line itself changes nothing.
        let same = x_axis.translated(vector(5.0, 0.0));
        assert_eq!(same, x_axis);
        assert_eq!(x_axis.at_time(2.0).through(), point(0.0, 2.0));
    }

    #[test]
    fn intersection_classification() {
        let a = Line::from_points(point(0.0, 0.0), point(1.0, 0.0));
        let b = Line::from_points(point(0.0, 0.0), point(0.0, 1.0));
        match intersect(&a, &b, EPSILON) {
            LineIntersection::Point(p) => {
                assert!(near_zero(p.x, EPSILON) && near_zero(p.y, EPSILON));
            }
            other => panic!("expected point intersection, got {:?}", other),
        }

        let shifted = a.translated(vector(0.0, 1.0));
        assert_eq!(intersect(&a, &shifted, EPSILON), LineIntersection::None);

        let same = Line::from_points(point(-3.0, 0.0), point(7.0, 0.0));
        assert_eq!(intersect(&a, &same, EPSILON), LineIntersection::Coincident);
    }

    #[test]
    fn opposite_lines_are_not_coincident() {
        // Same supporting line but opposite orientation still overlaps.
        let a = Line::from_points(point(0.0, 0.0), point(1.0, 0.0));
        let b = Line::from_points(point(1.0, 0.0), point(0.0, 0.0));
        assert_eq!(intersect(&a, &b, EPSILON), LineIntersection::Coincident);
    }

    #[test]
    fn bisector_of_perpendicular_wavefronts() {
        // Bottom edge of a box moving up, right edge moving left: the corner
        // moves along the diagonal at √2 speed.
        let bottom = Line::from_points(point(0.0, 0.0), point(1.0, 0.0));
        let right = Line::from_points(point(1.0, 0.0), point(1.0, 1.0));
        let v = wavefront_bisector(&bottom, &right, EPSILON);
        assert!((v.x - (-1.0)).abs() < 1e-9);
        assert!((v.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bisector_of_opposite_wavefronts_cancels() {
        let up = Line::from_points(point(0.0, 0.0), point(1.0, 0.0));
        let down = Line::from_points(point(1.0, 1.0), point(0.0, 1.0));
        // Parallel, distinct, moving towards each other.
        let v = wavefront_bisector(&up, &down, EPSILON);
        assert!(near_zero(v.length(), EPSILON));
    }

    #[test]
    fn wavefront_meeting_point_moves_in_time() {
        let bottom = Line::from_points(point(0.0, 0.0), point(1.0, 0.0));
        let right = Line::from_points(point(1.0, 0.0), point(1.0, 1.0));
        let p0 = wavefront_intersection(&bottom, &right, 0.0, EPSILON).unwrap();
        assert!(p0.distance_to(point(1.0, 0.0)) < 1e-9);
        let p1 = wavefront_intersection(&bottom, &right, 0.5, EPSILON).unwrap();
        assert!(p1.distance_to(point(0.5, 0.5)) < 1e-9);

        let shifted = bottom.translated(vector(0.0, 1.0));
        assert!(wavefront_intersection(&bottom, &shifted, 0.3, EPSILON).is_none());
    }

    #[test]
    fn bisector_of_crossing_lines() {
        let x_axis = Line::from_points(point(0.0, 0.0), point(1.0, 0.0));
        let y_axis = Line::from_points(point(0.0, 0.0), point(0.0, 1.0));
        let bi = x_axis.bisector(&y_axis);
        assert!(near_zero(bi.signed_distance(point(0.0, 0.0)), EPSILON));
        assert!(near_zero(bi.signed_distance(point(1.0, 1.0)), EPSILON));
    }

    #[test]
    fn perpendicular_passes_through_point() {
        let l = Line::from_points(point(0.0, 0.0), point(2.0, 0.0));
        let p = l.perpendicular(point(1.0, 3.0));
        assert!(near_zero(p.signed_distance(point(1.0, 3.0)), EPSILON));
        assert!(near_zero(p.w.dot(l.w), EPSILON));
    }
}
