//! Point preparation for the Voronoi stage
//!
//! The exact path converts matched entries into display points,
//! mirroring same-chromosome entries across the diagonal because only
//! one triangular half is stored. When the raw point count exceeds the
//! configured ceiling, the fallback path instead synthesizes one
//! representative point per occupied density-grid cell, bounding
//! triangulation cost independent of raw data density.

use crate::core::{ContactEntry, DensityGrid, Query};
use crate::voronoi::Point;

/// Display points for the exact path.
///
/// Entries belonging to the query's orientation map to (source, target);
/// entries from the inverse orientation map swapped. A same-chromosome
/// entry satisfies both and contributes both mirror images.
pub fn exact_points(entries: &[ContactEntry], query: &Query) -> Vec<Point> {
    let mut points = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.source_chrom == query.source_chrom && entry.target_chrom == query.target_chrom {
            points.push(Point::new(
                entry.source_position as f64,
                entry.target_position as f64,
            ));
        }
        if entry.source_chrom == query.target_chrom && entry.target_chrom == query.source_chrom {
            points.push(Point::new(
                entry.target_position as f64,
                entry.source_position as f64,
            ));
        }
    }
    points
}

/// Representative points for the downsampling fallback.
///
/// One point per occupied grid cell, interpolated back into genomic
/// coordinates. A same-chromosome grid is already mirror-symmetric, so
/// these points are fed to the engine as-is; mirroring them again would
/// fabricate coincident duplicates.
pub fn grid_representative_points(grid: &DensityGrid, query: &Query) -> Vec<Point> {
    let width = grid.width() as u64;
    let height = grid.height() as u64;
    let span_x = query.source_end.saturating_sub(query.source_start);
    let span_y = query.target_end.saturating_sub(query.target_start);

    let mut points = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if grid.get(x as u32, y as u32) == 0 {
                continue;
            }
            let px = query.source_start + (x * span_x) / width;
            let py = query.target_start + (y * span_y) / height;
            points.push(Point::new(px as f64, py as f64));
        }
    }
    points
}
