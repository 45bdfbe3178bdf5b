//! Value types for 2D geometry in CSS pixels.
//!
//! Everything here is pure: points, quads as reported by `DOM.getBoxModel`,
//! axis-aligned bounding boxes, and the viewport size.

use std::ops::Add;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BrowserError;

/// Tolerance used when comparing sampled coordinates.
pub const GEOMETRY_EPSILON: f64 = 1e-6;

/// An immutable point in viewport CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Divide both coordinates by `scalar`.
    ///
    /// Fails with [`BrowserError::DivisionByZero`] when `scalar` is zero.
    pub fn divide(self, scalar: f64) -> Result<Point, BrowserError> {
        if scalar == 0.0 {
            return Err(BrowserError::DivisionByZero);
        }
        Ok(Point::new(self.x / scalar, self.y / scalar))
    }

    pub fn approx_eq(&self, other: &Point) -> bool {
        (self.x - other.x).abs() <= GEOMETRY_EPSILON && (self.y - other.y).abs() <= GEOMETRY_EPSILON
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl PartialEq<(f64, f64)> for Point {
    fn eq(&self, other: &(f64, f64)) -> bool {
        self.x == other.0 && self.y == other.1
    }
}

/// Structural comparison against a JSON `{ "x": .., "y": .. }` object.
impl PartialEq<Value> for Point {
    fn eq(&self, other: &Value) -> bool {
        let x = other.get("x").and_then(Value::as_f64);
        let y = other.get("y").and_then(Value::as_f64);
        matches!((x, y), (Some(x), Some(y)) if self.x == x && self.y == y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// Size of the visible layout viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether `point` lies in `[0, width) x [0, height)`.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= 0.0 && point.y >= 0.0 && point.x < self.width && point.y < self.height
    }

    /// Clamp `point` into `[0, width) x [0, height)`, stopping one epsilon
    /// short of the far edges.
    ///
    /// An empty viewport has no interior; the result is then the origin and
    /// `contains` still rejects it.
    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(0.0, (self.width - GEOMETRY_EPSILON).max(0.0)),
            point.y.clamp(0.0, (self.height - GEOMETRY_EPSILON).max(0.0)),
        )
    }
}

/// Axis-aligned rectangle. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Minimal box enclosing every point of `quad`.
    pub fn from_quad(quad: &Quad) -> Self {
        let points = quad.points();
        let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

        Self {
            x: min_x,
            y: min_y,
            width: (max_x - min_x).max(0.0),
            height: (max_y - min_y).max(0.0),
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Inclusive containment test, tolerant of float noise at the edges.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x - GEOMETRY_EPSILON
            && point.y >= self.y - GEOMETRY_EPSILON
            && point.x <= self.x + self.width + GEOMETRY_EPSILON
            && point.y <= self.y + self.height + GEOMETRY_EPSILON
    }
}

/// Four corner points of one box-model layer, clockwise from top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad([Point; 4]);

impl Quad {
    pub fn new(points: [Point; 4]) -> Self {
        Self(points)
    }

    /// Build a quad from the flat `[x1, y1, .., x4, y4]` layout CDP uses.
    ///
    /// Anything other than exactly 8 finite numbers is a contract violation.
    pub fn from_coords(coords: &[f64]) -> Result<Quad, BrowserError> {
        if coords.len() != 8 {
            return Err(BrowserError::MalformedBoxModel {
                detail: format!("quad has {} values, expected 8", coords.len()),
            });
        }
        if let Some(bad) = coords.iter().find(|c| !c.is_finite()) {
            return Err(BrowserError::MalformedBoxModel {
                detail: format!("quad contains non-finite coordinate {bad}"),
            });
        }

        let mut points = [Point::ORIGIN; 4];
        for (slot, pair) in points.iter_mut().zip(coords.chunks_exact(2)) {
            *slot = Point::new(pair[0], pair[1]);
        }
        Ok(Quad(points))
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    /// Mean of the four corners.
    pub fn centroid(&self) -> Result<Point, BrowserError> {
        let sum = self.0.iter().fold(Point::ORIGIN, |acc, p| acc + *p);
        sum.divide(self.0.len() as f64)
    }

    /// The quad's origin: smallest x and smallest y over all corners.
    pub fn top_left(&self) -> Point {
        let x = self.0.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let y = self.0.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        Point::new(x, y)
    }

    /// Enclosed area (shoelace formula).
    pub fn area(&self) -> f64 {
        let p = &self.0;
        let twice: f64 = (0..4)
            .map(|i| {
                let a = p[i];
                let b = p[(i + 1) % 4];
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice.abs() / 2.0
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_quad(self)
    }

    pub fn approx_eq(&self, other: &Quad) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a.approx_eq(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Quad {
        Quad::from_coords(&[0.0, 0.0, side, 0.0, side, side, 0.0, side]).unwrap()
    }

    #[test]
    fn add_is_commutative() {
        let samples = [(1.5, -2.0), (0.0, 0.0), (1e9, 3.25), (-7.0, 11.0)];
        for a in samples {
            for b in samples {
                let (p, q) = (Point::from(a), Point::from(b));
                assert_eq!(p + q, q + p);
            }
        }
    }

    #[test]
    fn doubling_then_halving_is_identity() {
        for p in [Point::new(3.0, -4.5), Point::new(0.1, 0.2), Point::ORIGIN] {
            assert_eq!((p + p).divide(2.0).unwrap(), p);
        }
    }

    #[test]
    fn divide_by_zero_fails() {
        let err = Point::new(1.0, 1.0).divide(0.0).unwrap_err();
        assert!(matches!(err, BrowserError::DivisionByZero));
    }

    #[test]
    fn point_equals_structural_values() {
        let p = Point::new(1.0, 2.0);
        assert_eq!(p, (1.0, 2.0));
        assert_eq!(p, serde_json::json!({"x": 1, "y": 2}));
        assert_ne!(p, serde_json::json!({"x": 1}));
        assert_ne!(p, serde_json::json!({"x": 1, "y": 3}));
    }

    #[test]
    fn quad_groups_coordinates_pairwise_in_order() {
        let quad = Quad::from_coords(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();
        assert_eq!(
            quad.points(),
            &[
                Point::new(1.0, 2.0),
                Point::new(3.0, 4.0),
                Point::new(5.0, 6.0),
                Point::new(7.0, 8.0),
            ]
        );
    }

    #[test]
    fn quad_rejects_wrong_length() {
        for len in [0usize, 6, 7, 9, 16] {
            let coords = vec![0.0; len];
            let err = Quad::from_coords(&coords).unwrap_err();
            assert!(matches!(err, BrowserError::MalformedBoxModel { .. }), "len {len}");
        }
    }

    #[test]
    fn quad_rejects_nan() {
        let err = Quad::from_coords(&[0.0, f64::NAN, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]).unwrap_err();
        assert!(matches!(err, BrowserError::MalformedBoxModel { .. }));
    }

    #[test]
    fn centroid_of_square() {
        assert_eq!(square(10.0).centroid().unwrap(), (5.0, 5.0));
    }

    #[test]
    fn area_and_bounding_box_of_rotated_quad() {
        // A diamond with its corners on the axes of a 10x10 box.
        let diamond = Quad::from_coords(&[5.0, 0.0, 10.0, 5.0, 5.0, 10.0, 0.0, 5.0]).unwrap();
        assert!((diamond.area() - 50.0).abs() < 1e-9);
        let bbox = diamond.bounding_box();
        assert_eq!(
            bbox,
            BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0
            }
        );
        assert_eq!(diamond.top_left(), (0.0, 0.0));
    }

    #[test]
    fn approx_eq_tolerates_float_noise() {
        let a = square(10.0);
        let b = Quad::from_coords(&[0.0, 0.0, 10.0 + 1e-9, 0.0, 10.0, 10.0, 0.0, 10.0]).unwrap();
        let c = Quad::from_coords(&[0.5, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0]).unwrap();
        assert!(a.approx_eq(&b));
        assert!(!a.approx_eq(&c));
    }

    #[test]
    fn viewport_contains_is_half_open() {
        let vp = Viewport::new(100.0, 50.0);
        assert!(vp.contains(&Point::new(0.0, 0.0)));
        assert!(vp.contains(&Point::new(99.9, 49.9)));
        assert!(!vp.contains(&Point::new(100.0, 10.0)));
        assert!(!vp.contains(&Point::new(-0.1, 10.0)));
    }

    #[test]
    fn viewport_clamp_stays_inside_half_open_range() {
        let vp = Viewport::new(100.0, 50.0);
        let clamped = vp.clamp(Point::new(150.0, -5.0));
        assert!(vp.contains(&clamped));
        assert!((clamped.x - 100.0).abs() < 1e-3);
        assert_eq!(clamped.y, 0.0);
        assert!(vp.contains(&vp.clamp(Point::new(20.0, 80.0))));
        assert_eq!(vp.clamp(Point::new(20.0, 20.0)), (20.0, 20.0));
    }

    #[test]
    fn empty_viewport_contains_nothing_after_clamp() {
        let vp = Viewport::new(0.0, 0.0);
        assert!(!vp.contains(&vp.clamp(Point::new(5.0, 5.0))));
    }
}
