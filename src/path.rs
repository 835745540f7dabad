//! Link curves: SVG path commands for rendering and distance checks for
//! hit-testing. Both use the same control points, so a link is hit where it
//! is drawn.

use crate::geometry::{Point, Rect};

/// Endpoints closer than this (times zoom) are joined by a straight line.
const STRAIGHT_LINE_THRESHOLD: f32 = 10.0;

/// Cubic bezier with horizontal tangents at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,
}

impl CubicBezier {
    /// Control points extend horizontally by half the horizontal distance,
    /// but at least `min_offset * zoom`.
    pub fn from_endpoints(start: Point, end: Point, zoom: f32, min_offset: f32) -> Self {
        if is_short(start, end, zoom) {
            return CubicBezier {
                p0: start,
                p1: start,
                p2: end,
                p3: end,
            };
        }

        let offset = ((end.x - start.x).abs() * 0.5).max(min_offset * zoom);
        CubicBezier {
            p0: start,
            p1: Point::new(start.x + offset, start.y),
            p2: Point::new(end.x - offset, end.y),
            p3: end,
        }
    }

    /// Box around the four control points. The curve never leaves it.
    pub fn bounds(&self) -> Rect {
        let points = [self.p0, self.p1, self.p2, self.p3];
        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn eval(&self, t: f32) -> Point {
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        Point::new(
            a * self.p0.x + b * self.p1.x + c * self.p2.x + d * self.p3.x,
            a * self.p0.y + b * self.p1.y + c * self.p2.y + d * self.p3.y,
        )
    }
}

fn is_short(start: Point, end: Point, zoom: f32) -> bool {
    let threshold = STRAIGHT_LINE_THRESHOLD * zoom;
    start.distance_squared(end) < threshold * threshold
}

/// SVG path command for a link, e.g. `"M 10 20 C 60 20 90 80 140 80"`.
///
/// Very short links become a straight `L` segment to avoid zig-zags.
pub fn bezier_path(start: Point, end: Point, zoom: f32, min_offset: f32) -> String {
    if is_short(start, end, zoom) {
        return format!("M {} {} L {} {}", start.x, start.y, end.x, end.y);
    }
    let b = CubicBezier::from_endpoints(start, end, zoom, min_offset);
    format!(
        "M {} {} C {} {} {} {} {} {}",
        b.p0.x, b.p0.y, b.p1.x, b.p1.y, b.p2.x, b.p2.y, b.p3.x, b.p3.y
    )
}

fn distance_to_segment_sq(point: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    let ap = point - a;
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    if len_sq < f32::EPSILON {
        return point.distance_squared(a);
    }
    let t = ((ap.x * ab.x + ap.y * ab.y) / len_sq).clamp(0.0, 1.0);
    point.distance_squared(Point::new(a.x + t * ab.x, a.y + t * ab.y))
}

/// Approximate distance from `point` to the curve, flattened into
/// `samples` segments (20 when zero).
pub fn distance_to_bezier(point: Point, bezier: &CubicBezier, samples: usize) -> f32 {
    let samples = if samples == 0 { 20 } else { samples };

    let mut min_sq = f32::MAX;
    let mut prev = bezier.eval(0.0);
    for i in 1..=samples {
        let curr = bezier.eval(i as f32 / samples as f32);
        min_sq = min_sq.min(distance_to_segment_sq(point, prev, curr));
        prev = curr;
    }
    min_sq.sqrt()
}
