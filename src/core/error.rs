//! Error types for Pairvor
//!
//! Defines all error types used throughout the library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Pairvor operations
#[derive(Debug, Error)]
pub enum PairvorError {
    /// Pairs file header errors
    #[error("File format error: {0}")]
    FileFormat(#[from] FileFormatError),

    /// Binary block index errors
    #[error("Index format error: {0}")]
    IndexFormat(#[from] IndexFormatError),

    /// Malformed data row encountered during a scan
    #[error("Line decode error: {0}")]
    LineDecode(#[from] LineDecodeError),

    /// Caller-supplied query bounds invalid
    #[error("Query parameter error: {0}")]
    QueryParameter(#[from] QueryParameterError),

    /// Voronoi construction failed for this request
    #[error("Triangulation error: {0}")]
    Triangulation(#[from] TriangulationError),

    /// The request's cancellation token was triggered
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while parsing the pairs file header
///
/// Fatal at open time: no partial-header operation is supported.
#[derive(Debug, Error)]
pub enum FileFormatError {
    /// First line did not carry the format marker
    #[error("Missing '## pairs format v1.0' marker, first line is: {0}")]
    MissingMarker(String),

    /// `sorted` tag value other than chr1-chr2-pos1-pos2
    #[error("Unsupported sort order: {0}")]
    UnsupportedSortOrder(String),

    /// `shape` tag value other than upper triangle
    #[error("Unsupported shape: {0}")]
    UnsupportedShape(String),

    /// Malformed header tag line
    #[error("Invalid header line: {0}")]
    InvalidHeaderLine(String),

    /// Malformed chromsize declaration
    #[error("Invalid chromsize entry: {0}")]
    InvalidChromsize(String),

    /// File not found
    #[error("Pairs file not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error while reading the header
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while parsing the binary block index
///
/// Fatal at open time: no partial-index operation is supported.
#[derive(Debug, Error)]
pub enum IndexFormatError {
    /// Magic bytes did not match any known index version
    #[error("Unrecognized index magic: {0:02x?}")]
    BadMagic([u8; 8]),

    /// A length or count field was negative or absurd
    #[error("Invalid {field} value: {value}")]
    InvalidField { field: &'static str, value: i64 },

    /// Sequence name table was not valid UTF-8
    #[error("Invalid UTF-8 in sequence name table")]
    InvalidName,

    /// Index file ended mid-record
    #[error("Truncated index: {0}")]
    Truncated(String),

    /// Index file not found
    #[error("Index file not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error while reading the index
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A data row that could not be decoded during a scan
///
/// Fails the enclosing search/density call; shared cursor state is
/// released and remains usable for subsequent calls.
#[derive(Debug, Error)]
pub enum LineDecodeError {
    /// Fewer than the four coordinate fields present
    #[error("Too few fields in line: {0}")]
    TooFewFields(String),

    /// Position field was not an unsigned integer
    #[error("Invalid position '{value}': {message}")]
    InvalidPosition { value: String, message: String },

    /// Line was not valid UTF-8
    #[error("Invalid UTF-8 in data line")]
    InvalidUtf8,
}

/// Invalid caller-supplied query bounds, rejected before any scan
#[derive(Debug, Error)]
pub enum QueryParameterError {
    /// start > end on one of the two axes
    #[error("Invalid {axis} range: start ({start}) > end ({end})")]
    InvalidRange {
        axis: &'static str,
        start: u64,
        end: u64,
    },

    /// A requested bin or pixel dimension was zero
    #[error("Invalid {0} dimension: must be non-zero")]
    ZeroDimension(&'static str),
}

/// Voronoi construction failure, scoped to a single build
#[derive(Debug, Error)]
pub enum TriangulationError {
    /// A point with a NaN or infinite coordinate reached the triangulator
    #[error("Non-finite point at index {0}")]
    NonFinitePoint(usize),

    /// The point set admitted no triangles (collinear or coincident input)
    #[error("Degenerate point set: {count} points produced no triangles")]
    Degenerate { count: usize },
}

/// Result type alias for Pairvor operations
pub type Result<T> = std::result::Result<T, PairvorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryParameterError::InvalidRange {
            axis: "source",
            start: 10,
            end: 5,
        };
        assert_eq!(
            err.to_string(),
            "Invalid source range: start (10) > end (5)"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: PairvorError = TriangulationError::Degenerate { count: 4 }.into();
        assert!(matches!(err, PairvorError::Triangulation(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: IndexFormatError = io.into();
        assert!(matches!(err, IndexFormatError::Io(_)));
    }
}
