//! Binary block index (.px2) reader
//!
//! The index pairs a block-compressed pairs file with, per
//! chromosome-pair sequence, a sparse bin table (bin number to chunk
//! list) and a linear index (virtual offsets at fixed coarse-bin
//! granularity). All integers are little-endian; the index container is
//! itself block-compressed and is read here as one linear stream.
//!
//! # Layout
//!
//! - 8-byte magic; byte 7 selects the version variant
//! - i32 sequence count
//! - line count: i32 (legacy variant) or u64
//! - configuration record: seven i32 column fields, delimiter byte,
//!   pair-name separator byte, 2 pad bytes, i32 comment marker, i32
//!   header-skip count
//! - i32 name-table byte length, then NUL-delimited sequence names
//! - per sequence: i32 bin count, repeated {u32 bin, i32 chunk count,
//!   (u64, u64) virtual-offset pairs}, then i32 interval count and that
//!   many u64 linear-index offsets
//!
//! Truncated or malformed input fails the open; no partial-index
//! operation is supported.

use crate::core::bgzf::{read_voffset, VirtualOffset};
use crate::core::error::IndexFormatError;
use crate::core::query::Query;
use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::MultiGzDecoder;
use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Leading magic bytes common to both known index variants
const MAGIC_PREFIX: &[u8; 4] = b"PX2.";

/// Version byte (magic index 6) of the legacy variant
const LEGACY_VERSION_BYTE: u8 = b'2';

/// Upper bound applied to every count field before allocating
const SANITY_LIMIT: i64 = 1 << 28;

/// Index format variant, selected by the magic version byte.
///
/// The variants differ in the line-count field width and in the
/// coordinate shift that maps a genomic position to a linear-index bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexVersion {
    /// 32-bit line count, 14-bit linear-bin shift
    Legacy,
    /// 64-bit line count, 15-bit linear-bin shift
    Current,
}

impl IndexVersion {
    /// Right-shift converting a genomic coordinate to a linear bin
    pub fn linear_shift(&self) -> u32 {
        match self {
            IndexVersion::Legacy => 14,
            IndexVersion::Current => 15,
        }
    }
}

/// A contiguous scan range in the compressed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChunk {
    pub start: VirtualOffset,
    pub end: VirtualOffset,
}

/// Fixed-layout configuration record describing how the indexed file
/// was laid out when the index was built.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub format: i32,
    pub seq_col: i32,
    pub begin_col: i32,
    pub end_col: i32,
    pub seq_col2: i32,
    pub begin_col2: i32,
    pub end_col2: i32,
    /// Field delimiter in the data file
    pub delimiter: u8,
    /// Separator joining the two chromosome names of a pair name
    pub pair_separator: u8,
    /// Comment-line marker
    pub meta_char: u8,
    /// Header lines skipped when the index was built
    pub line_skip: i32,
}

/// Index data for one chromosome-pair sequence
#[derive(Debug, Clone, Default)]
pub struct SequenceIndex {
    /// Sparse bin number to chunk list; chunk lists are monotonic in
    /// file-offset order
    pub bins: HashMap<u32, Vec<FileChunk>>,
    /// Virtual offsets at fixed coarse-bin granularity; zero entries
    /// mean "no data indexed at this granularity yet"
    pub linear: Vec<VirtualOffset>,
}

impl SequenceIndex {
    /// Largest chunk end recorded in the bin table, used when the
    /// linear index has no usable end offset for a scan range
    fn max_chunk_end(&self) -> Option<VirtualOffset> {
        self.bins
            .values()
            .flat_map(|chunks| chunks.iter().map(|c| c.end))
            .max()
    }
}

/// Parsed block index: built once at open time, read-only thereafter
#[derive(Debug)]
pub struct BlockIndex {
    version: IndexVersion,
    line_count: u64,
    config: IndexConfig,
    names: Vec<String>,
    sequences: HashMap<String, SequenceIndex>,
}

impl BlockIndex {
    /// Load and parse an index file, decompressing if necessary
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, IndexFormatError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IndexFormatError::FileNotFound(path.to_path_buf()));
        }

        let mut file = File::open(path)?;
        let mut sniff = [0u8; 2];
        let got = file.read(&mut sniff)?;
        drop(file);

        let file = File::open(path)?;
        if got == 2 && sniff == [0x1f, 0x8b] {
            let mut reader = BufReader::new(MultiGzDecoder::new(file));
            Self::parse(&mut reader)
        } else {
            let mut reader = BufReader::new(file);
            Self::parse(&mut reader)
        }
    }

    /// Parse an index from an already-decompressed byte stream
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self, IndexFormatError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic[..4] != MAGIC_PREFIX {
            return Err(IndexFormatError::BadMagic(magic));
        }
        let version = if magic[6] == LEGACY_VERSION_BYTE {
            IndexVersion::Legacy
        } else {
            IndexVersion::Current
        };

        let n_sequences = read_count(reader, "sequence count")?;

        let line_count = match version {
            IndexVersion::Legacy => reader.read_i32::<LittleEndian>()? as u64,
            IndexVersion::Current => reader.read_u64::<LittleEndian>()?,
        };

        let config = IndexConfig {
            format: reader.read_i32::<LittleEndian>()?,
            seq_col: reader.read_i32::<LittleEndian>()?,
            begin_col: reader.read_i32::<LittleEndian>()?,
            end_col: reader.read_i32::<LittleEndian>()?,
            seq_col2: reader.read_i32::<LittleEndian>()?,
            begin_col2: reader.read_i32::<LittleEndian>()?,
            end_col2: reader.read_i32::<LittleEndian>()?,
            delimiter: reader.read_u8()?,
            pair_separator: reader.read_u8()?,
            meta_char: {
                let mut pad = [0u8; 2];
                reader.read_exact(&mut pad)?;
                read_count(reader, "meta char")? as u8
            },
            line_skip: reader.read_i32::<LittleEndian>()?,
        };

        let name_len = read_count(reader, "name table length")? as usize;
        let mut name_buf = vec![0u8; name_len];
        reader.read_exact(&mut name_buf)?;
        let names = parse_name_table(&name_buf)?;
        if names.len() != n_sequences as usize {
            return Err(IndexFormatError::Truncated(format!(
                "header claims {} sequences but name table holds {}",
                n_sequences,
                names.len()
            )));
        }

        let mut sequences = HashMap::with_capacity(names.len());
        for name in &names {
            let mut sequence = SequenceIndex::default();

            let n_bins = read_count(reader, "bin count")?;
            for _ in 0..n_bins {
                let bin = reader.read_u32::<LittleEndian>()?;
                let n_chunks = read_count(reader, "chunk count")?;
                let mut chunks = Vec::with_capacity(n_chunks as usize);
                for _ in 0..n_chunks {
                    let start = read_voffset(reader)?;
                    let end = read_voffset(reader)?;
                    chunks.push(FileChunk { start, end });
                }
                sequence.bins.insert(bin, chunks);
            }

            let n_intervals = read_count(reader, "interval count")?;
            sequence.linear.reserve(n_intervals as usize);
            for _ in 0..n_intervals {
                sequence.linear.push(read_voffset(reader)?);
            }

            sequences.insert(name.clone(), sequence);
        }

        debug!(
            "parsed block index: {} sequences, {} lines, {:?}",
            names.len(),
            line_count,
            version
        );

        Ok(BlockIndex {
            version,
            line_count,
            config,
            names,
            sequences,
        })
    }

    /// Index format variant in effect
    pub fn version(&self) -> IndexVersion {
        self.version
    }

    /// Total data lines recorded when the index was built
    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    /// The configuration record
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Chromosome-pair names in index order
    pub fn pair_names(&self) -> &[String] {
        &self.names
    }

    /// Whether the index holds any data for the named pair
    pub fn contains_pair(&self, name: &str) -> bool {
        self.sequences.contains_key(name)
    }

    /// Join two chromosome names into the pair name the index uses
    pub fn pair_name(&self, source: &str, target: &str) -> String {
        format!(
            "{}{}{}",
            source, self.config.pair_separator as char, target
        )
    }

    /// Resolve a query into compressed-stream scan chunks.
    ///
    /// Resolution uses the linear index only, never descending into the
    /// finer bin table, so the result is a superset of the true range;
    /// the caller's per-entry filter supplies exactness. The forward
    /// (source, target) and inverse (target, source) pair directions
    /// resolve independently and merge when their block ranges overlap.
    pub fn resolve_chunks(&self, query: &Query) -> Vec<FileChunk> {
        let mut chunks = Vec::with_capacity(2);

        // A same-chromosome pair serves both query orientations from
        // one sequence, so its scan range must span the union of the
        // two axis windows; bounding by the source axis alone would
        // under-cover reverse-orientation matches.
        let (start, end) = if query.source_chrom == query.target_chrom {
            (
                query.source_start.min(query.target_start),
                query.source_end.max(query.target_end),
            )
        } else {
            (query.source_start, query.source_end)
        };

        let forward = self.pair_name(&query.source_chrom, &query.target_chrom);
        if let Some(chunk) = self.chunk_for_pair(&forward, start, end) {
            chunks.push(chunk);
        }

        if query.source_chrom == query.target_chrom {
            return chunks;
        }

        let inverse = self.pair_name(&query.target_chrom, &query.source_chrom);
        if let Some(chunk) = self.chunk_for_pair(&inverse, query.target_start, query.target_end) {
            match chunks.first_mut() {
                Some(existing) if blocks_overlap(existing, &chunk) => {
                    existing.start = existing.start.min(chunk.start);
                    existing.end = existing.end.max(chunk.end);
                }
                _ => chunks.push(chunk),
            }
        }

        chunks.sort_by_key(|c| c.start);
        chunks
    }

    /// Bound the scan range for one pair direction from the linear
    /// index alone.
    fn chunk_for_pair(&self, pair: &str, start: u64, end: u64) -> Option<FileChunk> {
        let sequence = self.sequences.get(pair)?;
        if sequence.linear.is_empty() {
            return None;
        }

        let shift = self.version.linear_shift();
        let mut start_bin = (start >> shift) as usize;
        let end_bin = (((end >> shift) + 1) as usize).min(sequence.linear.len() - 1);

        // Zero entries mean the region is not indexed at this
        // granularity yet; advance to the first populated bin.
        while start_bin < sequence.linear.len() && sequence.linear[start_bin].is_zero() {
            start_bin += 1;
        }
        if start_bin >= sequence.linear.len() || start_bin > end_bin {
            return None;
        }

        let start_offset = sequence.linear[start_bin];
        let mut end_offset = sequence.linear[end_bin];
        if end_offset.is_zero() || end_offset < start_offset {
            // The end bin is unindexed; fall back to the furthest chunk
            // end on record so the scan over-covers, never under-covers.
            end_offset = sequence.max_chunk_end().unwrap_or(start_offset);
        }

        Some(FileChunk {
            start: start_offset,
            end: end_offset,
        })
    }
}

/// Whether two chunks' compressed block ranges overlap
fn blocks_overlap(a: &FileChunk, b: &FileChunk) -> bool {
    b.start.block_address() <= a.end.block_address()
        && a.start.block_address() <= b.end.block_address()
}

fn read_count<R: Read>(reader: &mut R, field: &'static str) -> Result<i32, IndexFormatError> {
    let value = reader.read_i32::<LittleEndian>()?;
    if value < 0 || value as i64 > SANITY_LIMIT {
        return Err(IndexFormatError::InvalidField {
            field,
            value: value as i64,
        });
    }
    Ok(value)
}

fn parse_name_table(buf: &[u8]) -> Result<Vec<String>, IndexFormatError> {
    let mut names = Vec::new();
    let mut start = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if byte == 0 {
            if i > start {
                let name = std::str::from_utf8(&buf[start..i])
                    .map_err(|_| IndexFormatError::InvalidName)?;
                names.push(name.to_string());
            }
            start = i + 1;
        }
    }
    Ok(names)
}
