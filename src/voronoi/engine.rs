//! Voronoi diagram construction
//!
//! Cells are read off a Delaunay triangulation: every triangle's
//! circumcenter is a candidate cell corner, and walking the half-edges
//! around a point visits its corners in order. Four synthetic ghost
//! points placed well outside the bounding region guarantee every real
//! point a closed finite cell; ghost cells are never emitted. Optional
//! Lloyd relaxation re-triangulates surviving cell centroids to smooth
//! the diagram.
//!
//! Triangulation itself is a consumed capability: `delaunator` takes
//! the point set and returns flat triangle/half-edge index arrays with
//! a sentinel for hull boundaries.

use crate::core::{CancelToken, PairvorError, Result, TriangulationError};
use crate::voronoi::polygon::{sutherland_hodgman, BoundingRegion, Point, Polygon, Rectangle};
use delaunator::{triangulate, Triangulation, EMPTY};
use log::debug;
use rayon::prelude::*;

/// Synthetic points bounding the triangulation; never in the output
const GHOST_COUNT: usize = 4;

/// A constructed diagram: one polygon per surviving input point
#[derive(Debug, Clone, Default)]
pub struct Voronoi {
    pub polygons: Vec<Polygon>,
}

impl Voronoi {
    /// Build a diagram from caller-space points.
    ///
    /// Points are normalized into a numerically stable working scale by
    /// `normalization` (typically the chromosome-length rectangle), the
    /// diagram is clipped to `region` (expressed in normalized units),
    /// relaxed `smoothing_iterations` times, and finally rescaled back
    /// to caller space.
    ///
    /// An empty point list yields an empty diagram, not an error.
    pub fn from_points(
        data: &[Point],
        region: &BoundingRegion,
        normalization: Rectangle,
        smoothing_iterations: usize,
        cancel: &CancelToken,
    ) -> Result<Voronoi> {
        if data.is_empty() {
            return Ok(Voronoi::default());
        }

        let bounds = region.bounds();
        let clip = region.clip_polygon();
        let ghosts = ghost_points(&bounds);

        let mut working: Vec<Point> = Vec::with_capacity(GHOST_COUNT + data.len());
        working.extend_from_slice(&ghosts);
        for point in data {
            working.push(normalize(*point, &normalization));
        }

        let mut diagram = Voronoi::default();
        for iteration in 0..=smoothing_iterations {
            diagram = build_cells(&working, &clip, cancel)?;
            debug!(
                "voronoi iteration {}: {} polygons from {} points",
                iteration,
                diagram.polygons.len(),
                working.len() - GHOST_COUNT
            );

            if iteration < smoothing_iterations {
                // Lloyd relaxation: surviving centroids re-seed the
                // next triangulation together with the same ghosts.
                working.truncate(GHOST_COUNT);
                working.extend(
                    diagram
                        .polygons
                        .iter()
                        .map(|polygon| polygon.data_point)
                        .filter(Point::is_finite),
                );
                if working.len() == GHOST_COUNT {
                    break;
                }
            }
        }

        // Back to caller coordinates
        let scale_x = normalization.width();
        let scale_y = normalization.height();
        for polygon in &mut diagram.polygons {
            for point in &mut polygon.points {
                *point = denormalize(*point, &normalization);
            }
            polygon.data_point = denormalize(polygon.data_point, &normalization);
            polygon.area *= scale_x * scale_y;
        }

        Ok(diagram)
    }
}

/// Scale a caller-space point into the unit working frame
fn normalize(point: Point, rect: &Rectangle) -> Point {
    Point::new(
        (point.x - rect.min.x) / rect.width(),
        (point.y - rect.min.y) / rect.height(),
    )
}

/// Inverse of [`normalize`]
fn denormalize(point: Point, rect: &Rectangle) -> Point {
    Point::new(
        point.x * rect.width() + rect.min.x,
        point.y * rect.height() + rect.min.y,
    )
}

/// Four points well outside the bounding region, one beyond each side,
/// so every real point ends up interior to the triangulation hull.
fn ghost_points(bounds: &Rectangle) -> [Point; GHOST_COUNT] {
    let width = bounds.width();
    let height = bounds.height();
    [
        Point::new(bounds.min.x - width, bounds.min.y + height / 2.0),
        Point::new(bounds.max.x + width, bounds.min.y + height / 2.0),
        Point::new(bounds.min.x + width / 2.0, bounds.min.y - height),
        Point::new(bounds.min.x + width / 2.0, bounds.max.y + height),
    ]
}

/// One triangulate-and-collect pass over the working point set.
///
/// Cell construction is data-parallel: each point writes only its own
/// slot, the triangulation is shared read-only, and the collect is the
/// join before relaxation continues.
fn build_cells(points: &[Point], clip: &[Point], cancel: &CancelToken) -> Result<Voronoi> {
    for (i, point) in points.iter().enumerate() {
        if !point.is_finite() {
            return Err(TriangulationError::NonFinitePoint(i).into());
        }
    }

    let sites: Vec<delaunator::Point> = points
        .iter()
        .map(|p| delaunator::Point { x: p.x, y: p.y })
        .collect();
    let triangulation = triangulate(&sites);
    if triangulation.triangles.is_empty() {
        if points.len() >= 3 {
            return Err(TriangulationError::Degenerate {
                count: points.len(),
            }
            .into());
        }
        return Ok(Voronoi::default());
    }

    // For every point, one incoming half-edge to start the cell walk
    // from; hull points prefer a boundary edge so the walk covers
    // their full fan.
    let mut incoming = vec![EMPTY; points.len()];
    for e in 0..triangulation.triangles.len() {
        let endpoint = triangulation.triangles[next_half_edge(e)];
        if incoming[endpoint] == EMPTY || triangulation.halfedges[e] == EMPTY {
            incoming[endpoint] = e;
        }
    }

    let cells: Vec<Option<Polygon>> = (0..points.len())
        .into_par_iter()
        .map(|p| build_cell(p, points, &triangulation, &incoming, clip, cancel))
        .collect();

    if cancel.is_cancelled() {
        return Err(PairvorError::Cancelled);
    }

    Ok(Voronoi {
        polygons: cells.into_iter().flatten().collect(),
    })
}

/// Construct and clip the cell of one real point, or None to drop it
fn build_cell(
    p: usize,
    points: &[Point],
    triangulation: &Triangulation,
    incoming: &[usize],
    clip: &[Point],
    cancel: &CancelToken,
) -> Option<Polygon> {
    // Ghosts bound the triangulation but never appear in the output
    if p < GHOST_COUNT || cancel.is_cancelled() {
        return None;
    }
    let start = incoming[p];
    if start == EMPTY {
        // Coincident duplicates get no triangles; drop the cell
        return None;
    }

    let corners = cell_corners(triangulation, points, start);
    if corners.len() < 3 {
        return None;
    }

    let mut cell = Polygon::new(corners);
    cell.data_point = points[p];

    let mut clipped = sutherland_hodgman(&cell, clip);
    if clipped.points.len() < 3 {
        return None;
    }

    let (centroid, area) = clipped.centroid_and_area()?;
    clipped.area = area;
    clipped.data_point = centroid;
    Some(clipped)
}

/// Circumcenters of the triangles around one point, in walk order.
///
/// From an incoming half-edge, advance to the next edge of the same
/// triangle, then cross to its opposite to reach the next incoming
/// edge; stop on return to the start or at a hull boundary.
fn cell_corners(triangulation: &Triangulation, points: &[Point], start: usize) -> Vec<Point> {
    let mut corners = Vec::with_capacity(8);
    let mut incoming = start;
    let cap = triangulation.halfedges.len();

    for _ in 0..cap {
        corners.push(circumcenter_of(triangulation, points, incoming / 3));
        let outgoing = next_half_edge(incoming);
        incoming = triangulation.halfedges[outgoing];
        if incoming == EMPTY || incoming == start {
            break;
        }
    }

    corners
}

/// Next directed edge within the same triangle
fn next_half_edge(e: usize) -> usize {
    if e % 3 == 2 {
        e - 2
    } else {
        e + 1
    }
}

/// Circumcenter of triangle `t`
fn circumcenter_of(triangulation: &Triangulation, points: &[Point], t: usize) -> Point {
    let a = points[triangulation.triangles[t * 3]];
    let b = points[triangulation.triangles[t * 3 + 1]];
    let c = points[triangulation.triangles[t * 3 + 2]];
    circumcenter(a, b, c)
}

/// Center of the circle through three points
fn circumcenter(a: Point, b: Point, c: Point) -> Point {
    let ad = a.x * a.x + a.y * a.y;
    let bd = b.x * b.x + b.y * b.y;
    let cd = c.x * c.x + c.y * c.y;
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    Point::new(
        1.0 / d * (ad * (b.y - c.y) + bd * (c.y - a.y) + cd * (a.y - b.y)),
        1.0 / d * (ad * (c.x - b.x) + bd * (a.x - c.x) + cd * (b.x - a.x)),
    )
}
