//! Request service context
//!
//! One [`VisService`] is constructed at startup and passed to request
//! handlers; it owns the opened pairs backend and the serving options.
//! There is no global mutable state: per-request failures are returned
//! to the caller and never affect other requests, while startup
//! failures (unreadable data file or index) fail `open` and are
//! unrecoverable for the process.

use crate::core::{
    BgzfPairsFile, CancelToken, Chromsize, ContactEntry, DensityGrid, PairsFile, PlainPairsFile,
    Query, QueryParameterError, Result,
};
use crate::render::{encode_response, exact_points, grid_representative_points};
use crate::voronoi::{BoundingRegion, Point, Rectangle, Voronoi};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Serving options, fixed at startup
#[derive(Debug, Clone)]
pub struct VisOptions {
    /// Raw point ceiling above which the downsampling fallback runs
    pub max_voronoi_points: u64,
    /// Genome name override when the file header carries none (or a
    /// placeholder)
    pub genome: Option<String>,
}

impl Default for VisOptions {
    fn default() -> Self {
        VisOptions {
            max_voronoi_points: 100_000,
            genome: None,
        }
    }
}

/// Metadata block for the details operation
#[derive(Debug, Clone)]
pub struct FileDetails {
    pub genome: String,
    /// Chromosomes in header declaration order
    pub chromosomes: Vec<Chromsize>,
}

/// The per-process service context
pub struct VisService {
    pairs: Box<dyn PairsFile>,
    options: VisOptions,
}

impl VisService {
    /// Open a pairs file, picking the indexed block-compressed backend
    /// when a sibling `.px2` index exists and the plain-text backend
    /// otherwise.
    pub fn open<P: AsRef<Path>>(path: P, options: VisOptions) -> Result<Self> {
        let path = path.as_ref();
        let index_path = sibling_index_path(path);

        let pairs: Box<dyn PairsFile> = if index_path.exists() {
            info!("opening indexed pairs file {:?}", path);
            Box::new(BgzfPairsFile::open_with_index(path, index_path)?)
        } else {
            info!("no index found for {:?}, opening as plain pairs", path);
            Box::new(PlainPairsFile::open(path)?)
        };

        Ok(VisService { pairs, options })
    }

    /// Wrap an already-opened backend
    pub fn with_backend(pairs: Box<dyn PairsFile>, options: VisOptions) -> Self {
        VisService { pairs, options }
    }

    /// Genome and chromosome metadata for the UI
    pub fn details(&self) -> FileDetails {
        let genome = match &self.options.genome {
            Some(genome) => genome.clone(),
            None => self.pairs.genome_name().to_string(),
        };
        let sizes = self.pairs.chromosome_sizes();
        let chromosomes = self
            .pairs
            .chromosomes()
            .iter()
            .filter_map(|name| sizes.get(name).cloned())
            .collect();
        FileDetails {
            genome,
            chromosomes,
        }
    }

    /// Chromosome-pair names known to hold data
    pub fn chrom_pair_names(&self) -> Vec<String> {
        self.pairs.chrom_pair_names()
    }

    /// Point search over a 2-D window
    pub fn search(&self, query: &Query, cancel: &CancelToken) -> Result<Vec<ContactEntry>> {
        self.pairs.search(query, cancel)
    }

    /// Density grid over a 2-D window
    pub fn density(
        &self,
        query: &Query,
        bin_width: u64,
        bin_height: u64,
        cancel: &CancelToken,
    ) -> Result<DensityGrid> {
        self.pairs.density(query, bin_width, bin_height, cancel)
    }

    /// The combined visualization operation: density grid plus Voronoi
    /// diagram, encoded per the fixed-width wire layout.
    ///
    /// `grid_bins` sizes the density grid; `pixels_x`/`pixels_y` give
    /// the view in display pixels, which polygon coordinates are mapped
    /// into before encoding.
    pub fn voronoi(
        &self,
        query: &Query,
        pixels_x: u32,
        pixels_y: u32,
        smoothing_iterations: usize,
        grid_bins: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>> {
        let (grid, diagram) =
            self.voronoi_diagram(query, pixels_x, pixels_y, smoothing_iterations, grid_bins, cancel)?;
        Ok(encode_response(&grid, &diagram)?)
    }

    /// As [`VisService::voronoi`], returning the unencoded grid and
    /// diagram.
    pub fn voronoi_diagram(
        &self,
        query: &Query,
        pixels_x: u32,
        pixels_y: u32,
        smoothing_iterations: usize,
        grid_bins: u32,
        cancel: &CancelToken,
    ) -> Result<(DensityGrid, Voronoi)> {
        query.validate()?;
        if grid_bins == 0 {
            return Err(QueryParameterError::ZeroDimension("grid bins").into());
        }
        if pixels_x == 0 || pixels_y == 0 {
            return Err(QueryParameterError::ZeroDimension("pixels").into());
        }

        let start = Instant::now();
        let span_x = (query.source_end - query.source_start).max(1);
        let span_y = (query.target_end - query.target_start).max(1);
        let bin_width = span_x.div_ceil(grid_bins as u64).max(1);
        let bin_height = span_y.div_ceil(grid_bins as u64).max(1);

        let grid = self.pairs.density(query, bin_width, bin_height, cancel)?;
        let total = grid.total();

        let points = if total > self.options.max_voronoi_points {
            debug!(
                "{} raw points exceed ceiling {}, downsampling to grid cells",
                total, self.options.max_voronoi_points
            );
            grid_representative_points(&grid, query)
        } else {
            let entries = self.pairs.search(query, cancel)?;
            exact_points(&entries, query)
        };

        let sizes = self.pairs.chromosome_sizes();
        let (Some(source_len), Some(target_len)) = (
            sizes.get(&query.source_chrom).map(|c| c.length),
            sizes.get(&query.target_chrom).map(|c| c.length),
        ) else {
            // Unknown chromosomes: an empty diagram, not an error
            return Ok((grid, Voronoi::default()));
        };
        if source_len == 0 || target_len == 0 {
            return Ok((grid, Voronoi::default()));
        }

        let source_len = source_len as f64;
        let target_len = target_len as f64;
        let bounds = Rectangle::new(
            query.source_start as f64 / source_len,
            query.target_start as f64 / target_len,
            query.source_end as f64 / source_len,
            query.target_end as f64 / target_len,
        );
        let region = if query.is_same_chrom() {
            BoundingRegion::UpperTriangle(bounds)
        } else {
            BoundingRegion::Rect(bounds)
        };
        let normalization = Rectangle::new(0.0, 0.0, source_len, target_len);

        let mut diagram = Voronoi::from_points(
            &points,
            &region,
            normalization,
            smoothing_iterations,
            cancel,
        )?;

        // Map genomic coordinates into the view's pixel frame
        let pixel_size_x = span_x as f64 / pixels_x as f64;
        let pixel_size_y = span_y as f64 / pixels_y as f64;
        for polygon in &mut diagram.polygons {
            for vertex in &mut polygon.points {
                *vertex = to_pixels(*vertex, query, pixel_size_x, pixel_size_y);
            }
            polygon.data_point = to_pixels(polygon.data_point, query, pixel_size_x, pixel_size_y);
            polygon.area /= pixel_size_x * pixel_size_y;
        }

        info!(
            "voronoi request: {} points ({} raw), {} polygons in {:?}",
            points.len(),
            total,
            diagram.polygons.len(),
            start.elapsed()
        );
        Ok((grid, diagram))
    }
}

fn to_pixels(point: Point, query: &Query, pixel_size_x: f64, pixel_size_y: f64) -> Point {
    Point::new(
        (point.x - query.source_start as f64) / pixel_size_x,
        (point.y - query.target_start as f64) / pixel_size_y,
    )
}

fn sibling_index_path(path: &Path) -> PathBuf {
    let mut index_path = PathBuf::from(path);
    index_path.set_file_name(format!(
        "{}.px2",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    index_path
}
