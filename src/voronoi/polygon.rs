//! Geometry primitives
//!
//! Points, rectangles, polygons with fan-based area/centroid, and
//! Sutherland-Hodgman clipping against an arbitrary convex region.
//! Degenerate polygons (fewer than three vertices, zero area, repeated
//! vertices collapsing the fan) report `None` from the centroid/area
//! computation so callers drop the cell instead of propagating NaN.

/// Signed areas below this magnitude count as degenerate
const AREA_EPSILON: f64 = 1e-12;

/// A 2-D point in the working or caller coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Both coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rectangle {
    pub min: Point,
    pub max: Point,
}

impl Rectangle {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Rectangle {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Containment with a tolerance band on every side
    pub fn contains(&self, point: Point, tolerance: f64) -> bool {
        point.x >= self.min.x - tolerance
            && point.x <= self.max.x + tolerance
            && point.y >= self.min.y - tolerance
            && point.y <= self.max.y + tolerance
    }
}

/// The region a Voronoi diagram is clipped to.
///
/// Same-chromosome queries intersect the view rectangle with the
/// half-plane above the diagonal, because only one triangular half of
/// self-chromosome data is stored while the display is symmetric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundingRegion {
    Rect(Rectangle),
    UpperTriangle(Rectangle),
}

impl BoundingRegion {
    /// The enclosing rectangle, used for ghost-point placement
    pub fn bounds(&self) -> Rectangle {
        match self {
            BoundingRegion::Rect(rect) | BoundingRegion::UpperTriangle(rect) => *rect,
        }
    }

    /// The convex clip polygon realizing the region, wound
    /// counter-clockwise. May have three to five vertices for the
    /// triangular case, or be empty when the rectangle lies entirely
    /// below the diagonal.
    pub fn clip_polygon(&self) -> Vec<Point> {
        let rect = self.bounds();
        let corners = vec![
            Point::new(rect.min.x, rect.min.y),
            Point::new(rect.max.x, rect.min.y),
            Point::new(rect.max.x, rect.max.y),
            Point::new(rect.min.x, rect.max.y),
        ];
        match self {
            BoundingRegion::Rect(_) => corners,
            BoundingRegion::UpperTriangle(_) => {
                let lo = rect.min.x.min(rect.min.y);
                let hi = rect.max.x.max(rect.max.y);
                if hi <= lo {
                    return corners;
                }
                // Clip the rectangle against the diagonal half-plane
                // target >= source; the edge runs low to high so the
                // kept side is above the diagonal.
                let (points, _) =
                    clip_against_edge(&corners, Point::new(lo, lo), Point::new(hi, hi));
                points
            }
        }
    }
}

/// A Voronoi cell: the owning data point, its boundary, and the
/// signed area computed alongside the centroid.
#[derive(Debug, Clone, Default)]
pub struct Polygon {
    pub data_point: Point,
    pub points: Vec<Point>,
    pub area: f64,
    pub clipped: bool,
}

impl Polygon {
    /// Build from an ordered vertex list
    pub fn new(points: Vec<Point>) -> Self {
        Polygon {
            data_point: Point::default(),
            points,
            area: 0.0,
            clipped: false,
        }
    }

    /// Smallest rectangle containing every vertex
    pub fn bounding_box(&self) -> Option<Rectangle> {
        let first = self.points.first()?;
        let mut bounds = Rectangle {
            min: *first,
            max: *first,
        };
        for point in &self.points[1..] {
            bounds.min.x = bounds.min.x.min(point.x);
            bounds.max.x = bounds.max.x.max(point.x);
            bounds.min.y = bounds.min.y.min(point.y);
            bounds.max.y = bounds.max.y.max(point.y);
        }
        Some(bounds)
    }

    /// Centroid and signed area via the triangle fan anchored at the
    /// first vertex.
    ///
    /// `None` is the drop signal: fewer than three vertices, a fan
    /// whose signed areas cancel to (near) zero, or non-finite input.
    pub fn centroid_and_area(&self) -> Option<(Point, f64)> {
        if self.points.len() < 3 {
            return None;
        }

        let base = self.points[0];
        let mut cx = 0.0;
        let mut cy = 0.0;
        let mut area_sum2 = 0.0;

        for window in self.points.windows(2) {
            let (p1, p2) = (window[0], window[1]);
            let area2 = (p1.x - base.x) * (p2.y - base.y) - (p2.x - base.x) * (p1.y - base.y);
            cx += area2 * (base.x + p1.x + p2.x);
            cy += area2 * (base.y + p1.y + p2.y);
            area_sum2 += area2;
        }

        if !area_sum2.is_finite() || area_sum2.abs() < AREA_EPSILON {
            return None;
        }

        let centroid = Point::new(cx / 3.0 / area_sum2, cy / 3.0 / area_sum2);
        if !centroid.is_finite() {
            return None;
        }
        Some((centroid, area_sum2 / 2.0))
    }
}

/// Half-plane test: is `p` strictly left of the directed edge `a -> b`?
fn inside(p: Point, a: Point, b: Point) -> bool {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x) > 0.0
}

/// Intersection of lines (cp1, cp2) and (s, e)
fn intersection(cp1: Point, cp2: Point, s: Point, e: Point) -> Point {
    let dc = Point::new(cp1.x - cp2.x, cp1.y - cp2.y);
    let dp = Point::new(s.x - e.x, s.y - e.y);

    let n1 = cp1.x * cp2.y - cp1.y * cp2.x;
    let n2 = s.x * e.y - s.y * e.x;
    let n3 = 1.0 / (dc.x * dp.y - dc.y * dp.x);

    Point::new((n1 * dp.x - n2 * dc.x) * n3, (n1 * dp.y - n2 * dc.y) * n3)
}

/// One Sutherland-Hodgman pass against a single clip edge.
///
/// Returns the surviving vertex list and whether any intersection
/// vertex was introduced.
fn clip_against_edge(subject: &[Point], cp1: Point, cp2: Point) -> (Vec<Point>, bool) {
    let mut output = Vec::with_capacity(subject.len() + 2);
    let mut altered = false;

    for i in 0..subject.len() {
        let s = subject[i];
        let e = subject[(i + 1) % subject.len()];

        match (inside(s, cp1, cp2), inside(e, cp1, cp2)) {
            // Both inside: keep the second vertex
            (true, true) => output.push(e),
            // Entering: intersection then the second vertex
            (false, true) => {
                output.push(intersection(cp1, cp2, s, e));
                output.push(e);
                altered = true;
            }
            // Leaving: intersection only
            (true, false) => {
                output.push(intersection(cp1, cp2, s, e));
                altered = true;
            }
            // Both outside: nothing kept
            (false, false) => {}
        }
    }

    (output, altered)
}

/// Clip a subject polygon against a convex counter-clockwise clip
/// polygon, edge by edge. The clip polygon's vertex count is arbitrary;
/// triangular regions behave identically to rectangular ones.
pub fn sutherland_hodgman(subject: &Polygon, clip: &[Point]) -> Polygon {
    let mut points = subject.points.clone();
    let mut clipped = false;

    for j in 0..clip.len() {
        if points.is_empty() {
            break;
        }
        let cp1 = clip[j];
        let cp2 = clip[(j + 1) % clip.len()];
        let (next, altered) = clip_against_edge(&points, cp1, cp2);
        points = next;
        clipped |= altered;
    }

    Polygon {
        data_point: subject.data_point,
        points,
        area: 0.0,
        clipped,
    }
}
