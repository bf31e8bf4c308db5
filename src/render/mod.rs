//! Result rendering: point preparation and wire encoding

mod downsample;
mod encode;

pub use downsample::{exact_points, grid_representative_points};
pub use encode::{
    encode_density_grid, encode_response, encode_voronoi, write_density_grid, write_voronoi,
};
