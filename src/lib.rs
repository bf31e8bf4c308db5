//! Pairvor - indexed contact-pair queries with Voronoi rendering
//!
//! Serves genomic contact-pair ("Hi-C" style) data from a
//! block-compressed `.pairs` file, answers 2-D coordinate range queries
//! against its binary block index, and renders matched points as a
//! Voronoi diagram encoded for transport.
//!
//! # Features
//!
//! - Random-access range queries over BGZF containers via a two-level
//!   bin/linear index
//! - Density grids and exact point search with upper-triangle symmetry
//! - Triangulation-driven Voronoi construction with Lloyd relaxation,
//!   parallel per-point cell build with rayon
//! - Downsampling fallback bounding triangulation cost on dense views
//! - Compact big-endian binary response encoding
//!
//! # Example
//!
//! ```ignore
//! use pairvor::{CancelToken, Query, VisOptions, VisService};
//!
//! // Open the data file and its index once at startup
//! let service = VisService::open("contacts.pairs.gz", VisOptions::default())?;
//!
//! // Answer a visualization request
//! let query = Query::new("chr2L", 0, 1_000_000, "chr2L", 0, 1_000_000);
//! let bytes = service.voronoi(&query, 700, 700, 1, 500, &CancelToken::new())?;
//! ```

pub mod core;
pub mod render;
pub mod service;
pub mod voronoi;

// Re-export commonly used types
pub use crate::core::{
    BgzfPairsFile, BlockIndex, CancelToken, Chromsize, ContactEntry, DensityGrid, FileFormatError,
    IndexFormatError, IndexVersion, LineDecodeError, PairsFile, PairvorError, PlainPairsFile,
    Query, QueryParameterError, Result, TriangulationError, VirtualOffset,
};
pub use crate::service::{FileDetails, VisOptions, VisService};
pub use crate::voronoi::{BoundingRegion, Point, Polygon, Rectangle, Voronoi};
