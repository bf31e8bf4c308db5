//! Pairs file access
//!
//! A `.pairs` file carries a line-oriented text header followed by
//! tab-delimited contact rows, sorted by chromosome pair then position,
//! with only the upper triangle of each same-chromosome pair stored.
//! The [`PairsFile`] trait is the capability the query engine exposes;
//! [`BgzfPairsFile`] implements it over a block-compressed container
//! with a sibling binary index, and `PlainPairsFile` (see
//! [`crate::core::plain`]) over uncompressed text.
//!
//! # Header format
//!
//! ```text
//! ## pairs format v1.0
//! #sorted: chr1-chr2-pos1-pos2
//! #shape: upper triangle
//! #genome_assembly: dm6
//! #chromsize: chr2L 23513712
//! #samheader: @SQ SN:chr2L LN:23513712
//! ```
//!
//! The first non-`#` line ends the header; every subsequent non-comment
//! line is a data row with chromosome/position pairs in fields 2-5.

use crate::core::bgzf::{BgzfReader, BlockRead};
use crate::core::cancel::CancelToken;
use crate::core::error::{FileFormatError, PairvorError, QueryParameterError, Result};
use crate::core::index::BlockIndex;
use crate::core::query::{parse_entry, Chromsize, ContactEntry, Query};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Marker required on the first header line
const FORMAT_MARKER: &str = "## pairs format v1.0";

/// Cancellation is polled once per this many scanned lines
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Supported sort orders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Chr1Chr2Pos1Pos2,
}

/// Supported storage shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    UpperTriangle,
}

/// Parsed pairs file header: immutable for the process lifetime
#[derive(Debug, Clone)]
pub struct PairsHeader {
    pub sort_order: SortOrder,
    pub shape: Shape,
    pub genome_assembly: String,
    /// Opaque `#samheader:` lines, retained in declaration order
    pub sam_header: Vec<String>,
    /// Chromosome names in declaration order
    pub chromosomes: Vec<String>,
    pub chromsizes: HashMap<String, Chromsize>,
}

/// Parse the text header from the start of a pairs stream.
///
/// Consumes up to and including the first non-comment line; callers
/// relying on data positioning must re-seek afterwards.
pub fn parse_header<R: BufRead>(reader: &mut R) -> std::result::Result<PairsHeader, FileFormatError> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if !line.contains(FORMAT_MARKER) {
        return Err(FileFormatError::MissingMarker(line.trim_end().to_string()));
    }

    let mut sort_order = None;
    let mut shape = None;
    let mut genome_assembly = String::new();
    let mut sam_header = Vec::new();
    let mut chromosomes = Vec::new();
    let mut chromsizes = HashMap::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if !trimmed.starts_with('#') {
            break;
        }

        let Some((tag, value)) = trimmed[1..].split_once(':') else {
            // Comment lines without a tag:value shape are tolerated
            continue;
        };
        let tag = tag.trim();
        let value = value.trim();

        match tag {
            "sorted" => {
                if value == "chr1-chr2-pos1-pos2" {
                    sort_order = Some(SortOrder::Chr1Chr2Pos1Pos2);
                } else {
                    return Err(FileFormatError::UnsupportedSortOrder(value.to_string()));
                }
            }
            "shape" => {
                if value == "upper triangle" {
                    shape = Some(Shape::UpperTriangle);
                } else {
                    return Err(FileFormatError::UnsupportedShape(value.to_string()));
                }
            }
            "genome_assembly" => genome_assembly = value.to_string(),
            "chromsize" => {
                let mut parts = value.split_whitespace();
                let (Some(name), Some(length)) = (parts.next(), parts.next()) else {
                    return Err(FileFormatError::InvalidChromsize(value.to_string()));
                };
                let length: u64 = length
                    .parse()
                    .map_err(|_| FileFormatError::InvalidChromsize(value.to_string()))?;
                chromosomes.push(name.to_string());
                chromsizes.insert(
                    name.to_string(),
                    Chromsize {
                        name: name.to_string(),
                        length,
                    },
                );
            }
            "samheader" => sam_header.push(value.to_string()),
            _ => debug!("ignoring header tag: {}", tag),
        }
    }

    Ok(PairsHeader {
        sort_order: sort_order.unwrap_or(SortOrder::Chr1Chr2Pos1Pos2),
        shape: shape.unwrap_or(Shape::UpperTriangle),
        genome_assembly,
        sam_header,
        chromosomes,
        chromsizes,
    })
}

/// Row-major counter grid produced by density queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DensityGrid {
    width: u32,
    height: u32,
    counts: Vec<u32>,
}

impl DensityGrid {
    /// Size a grid for a query window and bin dimensions
    pub fn for_window(query: &Query, bin_width: u64, bin_height: u64) -> Self {
        let span_x = query.source_end.saturating_sub(query.source_start);
        let span_y = query.target_end.saturating_sub(query.target_start);
        let width = span_x.div_ceil(bin_width).max(1) as u32;
        let height = span_y.div_ceil(bin_height).max(1) as u32;
        DensityGrid {
            width,
            height,
            counts: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major cell counts
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Count at (x, y); panics outside the grid
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.counts[y as usize * self.width as usize + x as usize]
    }

    /// Sum over all cells
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    fn increment(&mut self, x: u64, y: u64) {
        if x < self.width as u64 && y < self.height as u64 {
            self.counts[y as usize * self.width as usize + x as usize] += 1;
        }
    }

    /// Bin one matched entry into the grid.
    ///
    /// Entries from the inverse chromosome pair arrive with their axes
    /// swapped relative to the query; same-chromosome entries also
    /// increment the mirror cell because only one triangular half is
    /// stored while the display is symmetric about the diagonal.
    pub fn add_entry(&mut self, entry: &ContactEntry, query: &Query, bin_width: u64, bin_height: u64) {
        let (x_pos, y_pos) = if entry.source_chrom != query.source_chrom {
            (entry.target_position, entry.source_position)
        } else {
            (entry.source_position, entry.target_position)
        };

        let (width, height) = (self.width, self.height);
        let x_bin = |pos| bin_of(pos, query.source_start, query.source_end, bin_width, width);
        let y_bin = |pos| bin_of(pos, query.target_start, query.target_end, bin_height, height);

        if let (Some(x), Some(y)) = (x_bin(x_pos), y_bin(y_pos)) {
            self.increment(x, y);
        }

        if query.is_same_chrom() {
            if let (Some(x), Some(y)) = (x_bin(y_pos), y_bin(x_pos)) {
                self.increment(x, y);
            }
        }
    }
}

/// Map an in-window position onto a bin index; positions outside the
/// window report None, and the inclusive window end clamps into the
/// last bin.
fn bin_of(position: u64, start: u64, end: u64, bin_size: u64, dim: u32) -> Option<u64> {
    if position < start || position > end || dim == 0 {
        return None;
    }
    Some(((position - start) / bin_size).min(dim as u64 - 1))
}

/// Validate the dimensions shared by density-style requests
pub(crate) fn validate_bins(bin_width: u64, bin_height: u64) -> Result<()> {
    if bin_width == 0 {
        return Err(QueryParameterError::ZeroDimension("bin width").into());
    }
    if bin_height == 0 {
        return Err(QueryParameterError::ZeroDimension("bin height").into());
    }
    Ok(())
}

/// Abstract pairs file capability consumed by the service layer.
///
/// One concrete backing store per container flavor; callers never learn
/// which one they hold.
pub trait PairsFile: Send + Sync {
    /// Genome assembly declared in the header, possibly empty
    fn genome_name(&self) -> &str;

    /// Chromosomes in header declaration order
    fn chromosomes(&self) -> &[String];

    /// Chromosome sizes declared in the header
    fn chromosome_sizes(&self) -> &HashMap<String, Chromsize>;

    /// Chromosome-pair names known to hold data
    fn chrom_pair_names(&self) -> Vec<String>;

    /// All entries matching the query window (either orientation)
    fn search(&self, query: &Query, cancel: &CancelToken) -> Result<Vec<ContactEntry>>;

    /// Stream matching entries into a counter grid without retaining
    /// an entry list
    fn density(
        &self,
        query: &Query,
        bin_width: u64,
        bin_height: u64,
        cancel: &CancelToken,
    ) -> Result<DensityGrid>;
}

/// Pairs file over a block-compressed container plus binary index.
///
/// The underlying stream has a single cursor, so scans serialize behind
/// one lock; concurrent queries queue rather than interleave reads.
pub struct BgzfPairsFile {
    header: PairsHeader,
    index: BlockIndex,
    reader: Mutex<BgzfReader<File>>,
}

impl BgzfPairsFile {
    /// Open a data file, locating the index at `<path>.px2`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut index_path = PathBuf::from(path);
        index_path.set_file_name(format!(
            "{}.px2",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        Self::open_with_index(path, index_path)
    }

    /// Open a data file with an explicit index path
    pub fn open_with_index<P: AsRef<Path>, Q: AsRef<Path>>(path: P, index_path: Q) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FileFormatError::FileNotFound(path.to_path_buf()).into());
        }

        let mut reader = BgzfReader::from_path(path).map_err(FileFormatError::Io)?;
        let header = parse_header(&mut reader)?;
        info!(
            "parsed pairs header: genome '{}', {} chromosomes",
            header.genome_assembly,
            header.chromosomes.len()
        );

        let start = Instant::now();
        let index = BlockIndex::from_path(index_path)?;
        info!("parsed block index in {:?}", start.elapsed());

        Ok(BgzfPairsFile {
            header,
            index,
            reader: Mutex::new(reader),
        })
    }

    /// The parsed header
    pub fn header(&self) -> &PairsHeader {
        &self.header
    }

    /// The block index backing chunk resolution
    pub fn index(&self) -> &BlockIndex {
        &self.index
    }

    /// Resolve chunks, then scan them under the cursor lock, feeding
    /// each matching entry to `on_entry`.
    fn scan(
        &self,
        query: &Query,
        cancel: &CancelToken,
        mut on_entry: impl FnMut(&ContactEntry),
    ) -> Result<()> {
        query.validate()?;

        let rev_query = query.reverse();
        let chunks = self.index.resolve_chunks(query);
        if chunks.is_empty() {
            return Ok(());
        }
        debug!("scanning {} chunk(s) for {:?}", chunks.len(), query);

        let meta_char = self.index.config().meta_char;
        let mut line = Vec::with_capacity(256);
        let mut scanned = 0usize;

        // Guard drops on every exit path, including decode errors.
        let mut reader = self.reader.lock();

        for chunk in &chunks {
            reader.seek_virtual(chunk.start).map_err(PairvorError::Io)?;

            loop {
                scanned += 1;
                if scanned % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                    return Err(PairvorError::Cancelled);
                }

                line.clear();
                if reader.read_until(b'\n', &mut line).map_err(PairvorError::Io)? == 0 {
                    break;
                }
                if line.first() == Some(&meta_char) {
                    continue;
                }

                let entry = parse_entry(&line)?;
                if entry.matches(query, &rev_query) {
                    on_entry(&entry);
                }

                if reader.block_address() > chunk.end.block_address() {
                    break;
                }
            }
        }

        Ok(())
    }
}

impl PairsFile for BgzfPairsFile {
    fn genome_name(&self) -> &str {
        &self.header.genome_assembly
    }

    fn chromosomes(&self) -> &[String] {
        &self.header.chromosomes
    }

    fn chromosome_sizes(&self) -> &HashMap<String, Chromsize> {
        &self.header.chromsizes
    }

    fn chrom_pair_names(&self) -> Vec<String> {
        self.index.pair_names().to_vec()
    }

    fn search(&self, query: &Query, cancel: &CancelToken) -> Result<Vec<ContactEntry>> {
        let mut entries = Vec::new();
        self.scan(query, cancel, |entry| entries.push(entry.clone()))?;
        debug!("search matched {} entries", entries.len());
        Ok(entries)
    }

    fn density(
        &self,
        query: &Query,
        bin_width: u64,
        bin_height: u64,
        cancel: &CancelToken,
    ) -> Result<DensityGrid> {
        query.validate()?;
        validate_bins(bin_width, bin_height)?;

        let mut grid = DensityGrid::for_window(query, bin_width, bin_height);
        self.scan(query, cancel, |entry| {
            grid.add_entry(entry, query, bin_width, bin_height);
        })?;
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "## pairs format v1.0\n\
        #sorted: chr1-chr2-pos1-pos2\n\
        #shape: upper triangle\n\
        #genome_assembly: dm6\n\
        #chromsize: chr2L 23513712\n\
        #chromsize: chr3R 32079331\n\
        #samheader: @SQ SN:chr2L LN:23513712\n\
        read1\tchr2L\t100\tchr2L\t200\t+\t-\n";

    #[test]
    fn test_parse_header() {
        let mut reader = Cursor::new(HEADER.as_bytes());
        let header = parse_header(&mut reader).unwrap();
        assert_eq!(header.sort_order, SortOrder::Chr1Chr2Pos1Pos2);
        assert_eq!(header.shape, Shape::UpperTriangle);
        assert_eq!(header.genome_assembly, "dm6");
        assert_eq!(header.chromosomes, ["chr2L", "chr3R"]);
        assert_eq!(header.chromsizes["chr3R"].length, 32079331);
        assert_eq!(header.sam_header.len(), 1);
    }

    #[test]
    fn test_missing_marker() {
        let mut reader = Cursor::new(b"chr1\t100\n".as_slice());
        assert!(matches!(
            parse_header(&mut reader),
            Err(FileFormatError::MissingMarker(_))
        ));
    }

    #[test]
    fn test_unsupported_sort_order() {
        let text = "## pairs format v1.0\n#sorted: chr1-pos1\n";
        assert!(matches!(
            parse_header(&mut Cursor::new(text.as_bytes())),
            Err(FileFormatError::UnsupportedSortOrder(_))
        ));
    }

    #[test]
    fn test_unsupported_shape() {
        let text = "## pairs format v1.0\n#shape: lower triangle\n";
        assert!(matches!(
            parse_header(&mut Cursor::new(text.as_bytes())),
            Err(FileFormatError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_bad_chromsize() {
        let text = "## pairs format v1.0\n#chromsize: chr1\n";
        assert!(matches!(
            parse_header(&mut Cursor::new(text.as_bytes())),
            Err(FileFormatError::InvalidChromsize(_))
        ));
    }

    fn entry(sc: &str, sp: u64, tc: &str, tp: u64) -> ContactEntry {
        ContactEntry {
            source_chrom: sc.into(),
            source_position: sp,
            target_chrom: tc.into(),
            target_position: tp,
        }
    }

    #[test]
    fn test_grid_dimensions() {
        let query = Query::new("chr1", 0, 1_000_000, "chr2", 0, 500_000);
        let grid = DensityGrid::for_window(&query, 100_000, 100_000);
        assert_eq!(grid.width(), 10);
        assert_eq!(grid.height(), 5);
        assert_eq!(grid.counts().len(), 50);
    }

    #[test]
    fn test_grid_cross_chrom_single_count() {
        let query = Query::new("chr1", 0, 1_000_000, "chr2", 0, 500_000);
        let mut grid = DensityGrid::for_window(&query, 100_000, 100_000);
        grid.add_entry(&entry("chr1", 100_000, "chr2", 200_000), &query, 100_000, 100_000);
        assert_eq!(grid.total(), 1);
        assert_eq!(grid.get(1, 2), 1);
    }

    #[test]
    fn test_grid_swapped_orientation() {
        // Entry stored under the inverse pair arrives axis-swapped
        let query = Query::new("chr1", 0, 1_000_000, "chr2", 0, 500_000);
        let mut grid = DensityGrid::for_window(&query, 100_000, 100_000);
        grid.add_entry(&entry("chr2", 200_000, "chr1", 100_000), &query, 100_000, 100_000);
        assert_eq!(grid.get(1, 2), 1);
        assert_eq!(grid.total(), 1);
    }

    #[test]
    fn test_grid_same_chrom_mirrors() {
        let query = Query::new("chr1", 0, 1_000_000, "chr1", 0, 1_000_000);
        let mut grid = DensityGrid::for_window(&query, 100_000, 100_000);
        grid.add_entry(&entry("chr1", 100_000, "chr1", 300_000), &query, 100_000, 100_000);
        assert_eq!(grid.total(), 2);
        assert_eq!(grid.get(1, 3), 1);
        assert_eq!(grid.get(3, 1), 1);
    }

    #[test]
    fn test_grid_out_of_window_dropped() {
        let query = Query::new("chr1", 500_000, 1_000_000, "chr1", 500_000, 1_000_000);
        let mut grid = DensityGrid::for_window(&query, 100_000, 100_000);
        // Left of the window on both axes
        grid.add_entry(&entry("chr1", 100_000, "chr1", 200_000), &query, 100_000, 100_000);
        assert_eq!(grid.total(), 0);
    }
}
