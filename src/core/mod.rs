//! Core query engine
//!
//! This module contains the block-compressed stream access, the binary
//! block index reader, and the range query engine over pairs files.

pub mod bgzf;
mod cancel;
mod error;
mod index;
mod pairs;
mod plain;
mod query;

pub use bgzf::{BgzfReader, BgzfWriter, BlockRead, VirtualOffset, MAX_BLOCK_PAYLOAD};
pub use cancel::CancelToken;
pub use error::{
    FileFormatError, IndexFormatError, LineDecodeError, PairvorError, QueryParameterError,
    Result, TriangulationError,
};
pub use index::{BlockIndex, FileChunk, IndexConfig, IndexVersion, SequenceIndex};
pub use pairs::{
    parse_header, BgzfPairsFile, DensityGrid, PairsFile, PairsHeader, Shape, SortOrder,
};
pub use plain::PlainPairsFile;
pub use query::{parse_entry, Chromsize, ContactEntry, Query};
