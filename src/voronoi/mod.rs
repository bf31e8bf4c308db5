//! Voronoi diagram engine
//!
//! Geometry primitives and the triangulation-driven cell builder with
//! Lloyd relaxation.

mod engine;
mod polygon;

pub use engine::Voronoi;
pub use polygon::{sutherland_hodgman, BoundingRegion, Point, Polygon, Rectangle};
