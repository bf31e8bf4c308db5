//! Query and entry value types
//!
//! A [`Query`] names a 2-D genomic window (one chromosome interval per
//! axis). Storage keeps only one triangular half of every chromosome
//! pair, so queries are direction-agnostic: an entry matches if it or
//! its position-swapped form falls inside the window.

use crate::core::error::{LineDecodeError, QueryParameterError};
use memchr::memchr_iter;

/// A chromosome name and its length in base pairs, declared once in the
/// pairs file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromsize {
    pub name: String,
    pub length: u64,
}

/// A 2-D genomic range query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub source_chrom: String,
    pub source_start: u64,
    pub source_end: u64,

    pub target_chrom: String,
    pub target_start: u64,
    pub target_end: u64,

    /// Minimum |source - target| distance, applied to same-chromosome
    /// entries only
    pub min_distance: Option<u64>,
}

impl Query {
    /// Build a query over the given window with no distance filter
    pub fn new(
        source_chrom: impl Into<String>,
        source_start: u64,
        source_end: u64,
        target_chrom: impl Into<String>,
        target_start: u64,
        target_end: u64,
    ) -> Self {
        Query {
            source_chrom: source_chrom.into(),
            source_start,
            source_end,
            target_chrom: target_chrom.into(),
            target_start,
            target_end,
            min_distance: None,
        }
    }

    /// Attach a minimum intra-chromosome distance filter
    pub fn with_min_distance(mut self, distance: u64) -> Self {
        self.min_distance = Some(distance);
        self
    }

    /// Swap the source and target axes
    pub fn reverse(&self) -> Query {
        Query {
            source_chrom: self.target_chrom.clone(),
            source_start: self.target_start,
            source_end: self.target_end,
            target_chrom: self.source_chrom.clone(),
            target_start: self.source_start,
            target_end: self.source_end,
            min_distance: self.min_distance,
        }
    }

    /// Whether both axes name the same chromosome
    pub fn is_same_chrom(&self) -> bool {
        self.source_chrom == self.target_chrom
    }

    /// Reject inverted ranges before any scan work is done
    pub fn validate(&self) -> Result<(), QueryParameterError> {
        if self.source_start > self.source_end {
            return Err(QueryParameterError::InvalidRange {
                axis: "source",
                start: self.source_start,
                end: self.source_end,
            });
        }
        if self.target_start > self.target_end {
            return Err(QueryParameterError::InvalidRange {
                axis: "target",
                start: self.target_start,
                end: self.target_end,
            });
        }
        Ok(())
    }
}

/// One decoded contact: a pair of genomic positions observed in
/// proximity. Produced transiently per query, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEntry {
    pub source_chrom: String,
    pub source_position: u64,
    pub target_chrom: String,
    pub target_position: u64,
}

impl ContactEntry {
    /// The `source-target` pair name used by index lookups
    pub fn chrom_pair_name(&self) -> String {
        format!("{}-{}", self.source_chrom, self.target_chrom)
    }

    /// Containment test against one orientation of a query window.
    ///
    /// The distance filter constrains same-chromosome entries only;
    /// cross-chromosome contacts have no meaningful linear separation.
    pub fn is_in_range(&self, query: &Query) -> bool {
        if self.source_chrom != query.source_chrom || self.target_chrom != query.target_chrom {
            return false;
        }

        if !(self.source_position >= query.source_start
            && self.source_position <= query.source_end
            && self.target_position >= query.target_start
            && self.target_position <= query.target_end)
        {
            return false;
        }

        if self.source_chrom == self.target_chrom {
            if let Some(min_distance) = query.min_distance {
                let distance = self.source_position.abs_diff(self.target_position);
                if distance < min_distance {
                    return false;
                }
            }
        }

        true
    }

    /// Whether the entry or its swapped form lies inside the window
    pub fn matches(&self, query: &Query, rev_query: &Query) -> bool {
        self.is_in_range(query) || self.is_in_range(rev_query)
    }
}

/// Decode one tab-delimited data row.
///
/// Coordinate fields sit at 1-indexed columns 2-5 (column 1 is the read
/// identifier); anything past column 5 is ignored. Fewer than five
/// columns is a format error.
pub fn parse_entry(line: &[u8]) -> Result<ContactEntry, LineDecodeError> {
    let line = match line.last() {
        Some(b'\n') => &line[..line.len() - 1],
        _ => line,
    };
    let line = match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    };

    let mut fields: [&[u8]; 5] = [&[]; 5];
    let mut count = 0;
    let mut start = 0;
    for tab in memchr_iter(b'\t', line) {
        if count < 5 {
            fields[count] = &line[start..tab];
            count += 1;
        }
        start = tab + 1;
        if count == 5 {
            break;
        }
    }
    if count < 5 {
        fields[count] = &line[start..];
        count += 1;
        if count < 5 {
            return Err(LineDecodeError::TooFewFields(lossy(line)));
        }
    }

    let source_chrom = std::str::from_utf8(fields[1])
        .map_err(|_| LineDecodeError::InvalidUtf8)?
        .to_string();
    let target_chrom = std::str::from_utf8(fields[3])
        .map_err(|_| LineDecodeError::InvalidUtf8)?
        .to_string();
    let source_position = parse_position(fields[2])?;
    let target_position = parse_position(fields[4])?;

    Ok(ContactEntry {
        source_chrom,
        source_position,
        target_chrom,
        target_position,
    })
}

fn parse_position(field: &[u8]) -> Result<u64, LineDecodeError> {
    let text = std::str::from_utf8(field).map_err(|_| LineDecodeError::InvalidUtf8)?;
    text.trim()
        .parse::<u64>()
        .map_err(|e| LineDecodeError::InvalidPosition {
            value: text.to_string(),
            message: e.to_string(),
        })
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_basic() {
        let entry = parse_entry(b"read1\tchr1\t100\tchr2\t200\t+\t-\n").unwrap();
        assert_eq!(entry.source_chrom, "chr1");
        assert_eq!(entry.source_position, 100);
        assert_eq!(entry.target_chrom, "chr2");
        assert_eq!(entry.target_position, 200);
    }

    #[test]
    fn test_parse_entry_exactly_five_fields() {
        let entry = parse_entry(b"r\tchr1\t5\tchr1\t9").unwrap();
        assert_eq!(entry.source_position, 5);
        assert_eq!(entry.target_position, 9);
    }

    #[test]
    fn test_parse_entry_too_few_fields() {
        assert!(matches!(
            parse_entry(b"read1\tchr1\t100\tchr2\n"),
            Err(LineDecodeError::TooFewFields(_))
        ));
    }

    #[test]
    fn test_parse_entry_bad_position() {
        assert!(matches!(
            parse_entry(b"r\tchr1\tabc\tchr2\t200\n"),
            Err(LineDecodeError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn test_query_reverse() {
        let query = Query::new("chr1", 0, 10, "chr2", 20, 30);
        let rev = query.reverse();
        assert_eq!(rev.source_chrom, "chr2");
        assert_eq!(rev.source_start, 20);
        assert_eq!(rev.target_chrom, "chr1");
        assert_eq!(rev.target_end, 10);
        assert_eq!(rev.reverse(), query);
    }

    #[test]
    fn test_query_validate() {
        assert!(Query::new("chr1", 0, 10, "chr1", 0, 10).validate().is_ok());
        assert!(Query::new("chr1", 11, 10, "chr1", 0, 10).validate().is_err());
        assert!(Query::new("chr1", 0, 10, "chr1", 10, 9).validate().is_err());
    }

    #[test]
    fn test_is_in_range() {
        let query = Query::new("chr1", 100, 200, "chr1", 300, 400);
        let inside = ContactEntry {
            source_chrom: "chr1".into(),
            source_position: 150,
            target_chrom: "chr1".into(),
            target_position: 350,
        };
        let outside = ContactEntry {
            source_position: 250,
            ..inside.clone()
        };
        assert!(inside.is_in_range(&query));
        assert!(!outside.is_in_range(&query));
    }

    #[test]
    fn test_swapped_orientation_matches() {
        let query = Query::new("chr1", 100, 200, "chr1", 300, 400);
        let rev = query.reverse();
        // Stored in the upper-triangle orientation, queried mirrored
        let entry = ContactEntry {
            source_chrom: "chr1".into(),
            source_position: 350,
            target_chrom: "chr1".into(),
            target_position: 150,
        };
        assert!(!entry.is_in_range(&query));
        assert!(entry.matches(&query, &rev));
    }

    #[test]
    fn test_min_distance_same_chrom_only() {
        let near = ContactEntry {
            source_chrom: "chr1".into(),
            source_position: 100,
            target_chrom: "chr1".into(),
            target_position: 150,
        };
        let query = Query::new("chr1", 0, 1000, "chr1", 0, 1000).with_min_distance(100);
        assert!(!near.is_in_range(&query));

        let cross = ContactEntry {
            target_chrom: "chr2".into(),
            ..near.clone()
        };
        let cross_query = Query::new("chr1", 0, 1000, "chr2", 0, 1000).with_min_distance(100);
        assert!(cross.is_in_range(&cross_query));
    }
}
