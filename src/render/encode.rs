//! Fixed-width binary result encoding
//!
//! Responses carry density grids and polygon sets as big-endian
//! fixed-width fields rather than text: diagrams routinely hold
//! hundreds of thousands of vertices.
//!
//! # Layout
//!
//! Density grid block:
//! - u32 cell count
//! - u32 per cell, row-major
//!
//! Voronoi block:
//! - u32 polygon count
//! - per polygon: u32 vertex count, f64 area, u8 clipped flag,
//!   f64 centroid x, f64 centroid y, then f64 x/y per vertex

use crate::core::DensityGrid;
use crate::voronoi::Voronoi;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

/// Write a density grid block
pub fn write_density_grid<W: Write>(out: &mut W, grid: &DensityGrid) -> io::Result<()> {
    let counts = grid.counts();
    out.write_u32::<BigEndian>(counts.len() as u32)?;
    for &count in counts {
        out.write_u32::<BigEndian>(count)?;
    }
    Ok(())
}

/// Write a Voronoi block
pub fn write_voronoi<W: Write>(out: &mut W, diagram: &Voronoi) -> io::Result<()> {
    out.write_u32::<BigEndian>(diagram.polygons.len() as u32)?;
    for polygon in &diagram.polygons {
        out.write_u32::<BigEndian>(polygon.points.len() as u32)?;
        out.write_f64::<BigEndian>(polygon.area)?;
        out.write_u8(polygon.clipped as u8)?;
        out.write_f64::<BigEndian>(polygon.data_point.x)?;
        out.write_f64::<BigEndian>(polygon.data_point.y)?;
        for point in &polygon.points {
            out.write_f64::<BigEndian>(point.x)?;
            out.write_f64::<BigEndian>(point.y)?;
        }
    }
    Ok(())
}

/// Serialize a density grid block to bytes
pub fn encode_density_grid(grid: &DensityGrid) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4 + grid.counts().len() * 4);
    write_density_grid(&mut out, grid)?;
    Ok(out)
}

/// Serialize a Voronoi block to bytes
pub fn encode_voronoi(diagram: &Voronoi) -> io::Result<Vec<u8>> {
    let vertex_total: usize = diagram.polygons.iter().map(|p| p.points.len()).sum();
    let mut out = Vec::with_capacity(4 + diagram.polygons.len() * 29 + vertex_total * 16);
    write_voronoi(&mut out, diagram)?;
    Ok(out)
}

/// Grid block followed by Voronoi block, as returned by the combined
/// visualization operation
pub fn encode_response(grid: &DensityGrid, diagram: &Voronoi) -> io::Result<Vec<u8>> {
    let mut out = encode_density_grid(grid)?;
    write_voronoi(&mut out, diagram)?;
    Ok(out)
}
