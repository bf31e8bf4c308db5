//! Plain-text pairs file access
//!
//! Implements [`PairsFile`] over an uncompressed (or plainly gzipped)
//! `.pairs` file with no index: every query is a full forward scan.
//! Exists for small files and as the second implementation behind the
//! trait seam; callers cannot tell it apart from the indexed backend.

use crate::core::cancel::CancelToken;
use crate::core::error::{FileFormatError, PairvorError, Result};
use crate::core::pairs::{
    parse_header, validate_bins, DensityGrid, PairsFile, PairsHeader,
};
use crate::core::query::{parse_entry, Chromsize, ContactEntry, Query};
use flate2::read::MultiGzDecoder;
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Cancellation is polled once per this many scanned lines
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Unindexed pairs file; queries scan the whole file
pub struct PlainPairsFile {
    path: PathBuf,
    gzipped: bool,
    header: PairsHeader,
}

impl PlainPairsFile {
    /// Open and parse the header; the data body is re-read per query
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FileFormatError::FileNotFound(path.to_path_buf()).into());
        }

        let gzipped = is_gzipped(path).map_err(FileFormatError::Io)?;
        let mut reader = open_reader(path, gzipped).map_err(FileFormatError::Io)?;
        let header = parse_header(&mut reader)?;

        Ok(PlainPairsFile {
            path: path.to_path_buf(),
            gzipped,
            header,
        })
    }

    /// The parsed header
    pub fn header(&self) -> &PairsHeader {
        &self.header
    }

    /// Full-file scan feeding each matching entry to `on_entry`.
    ///
    /// Each call owns a private reader, so plain scans need no cursor
    /// lock and never interfere with one another.
    fn scan(
        &self,
        query: &Query,
        cancel: &CancelToken,
        mut on_entry: impl FnMut(&ContactEntry),
    ) -> Result<()> {
        query.validate()?;
        let rev_query = query.reverse();

        let mut reader =
            open_reader(&self.path, self.gzipped).map_err(PairvorError::Io)?;
        let mut line = Vec::with_capacity(256);
        let mut scanned = 0usize;

        loop {
            scanned += 1;
            if scanned % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(PairvorError::Cancelled);
            }

            line.clear();
            if reader.read_until(b'\n', &mut line).map_err(PairvorError::Io)? == 0 {
                break;
            }
            if line.first() == Some(&b'#') {
                continue;
            }
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }

            let entry = parse_entry(&line)?;
            if entry.matches(query, &rev_query) {
                on_entry(&entry);
            }
        }

        Ok(())
    }
}

impl PairsFile for PlainPairsFile {
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
        // No index to consult; derive the list from one full pass.
        let mut pairs = BTreeSet::new();
        let Ok(mut reader) = open_reader(&self.path, self.gzipped) else {
            return Vec::new();
        };
        let mut line = Vec::with_capacity(256);
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if line.first() == Some(&b'#') || line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            if let Ok(entry) = parse_entry(&line) {
                pairs.insert(entry.chrom_pair_name());
            }
        }
        debug!("derived {} chrom pairs from plain scan", pairs.len());
        pairs.into_iter().collect()
    }

    fn search(&self, query: &Query, cancel: &CancelToken) -> Result<Vec<ContactEntry>> {
        let mut entries = Vec::new();
        self.scan(query, cancel, |entry| entries.push(entry.clone()))?;
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

fn is_gzipped(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut sniff = [0u8; 2];
    let got = file.read(&mut sniff)?;
    Ok(got == 2 && sniff == [0x1f, 0x8b])
}

fn open_reader(path: &Path, gzipped: bool) -> std::io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
