//! Block-compressed stream access
//!
//! The pairs container and its index are BGZF files: a gzip variant made
//! of independently deflated blocks, each carrying its compressed size in
//! a `BC` extra subfield. Storing the block's compressed offset alongside
//! an offset into its decompressed payload gives a 64-bit "virtual
//! offset" that addresses any byte without decompressing from the start.
//!
//! # Block structure
//!
//! - Bytes 0-1: gzip magic (31, 139)
//! - Bytes 2-9: standard gzip header fields (FLG has FEXTRA set)
//! - Bytes 10-11: XLEN (extra field length)
//! - Bytes 12+: extra subfields, including SI1='B', SI2='C', SLEN=2,
//!   BSIZE (little-endian u16) = total block size - 1
//! - Deflate payload, CRC32, ISIZE
//!
//! The query engine consumes this module through the [`BlockRead`] trait:
//! seek to a virtual offset, then buffered forward reads.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Largest decompressed payload a writer packs into one block (64KB spec
/// ceiling minus header room).
pub const MAX_BLOCK_PAYLOAD: usize = 0xff00;

/// Fixed gzip header length preceding the extra field
const FIXED_HEADER_LEN: usize = 12;

/// The canonical 28-byte empty block terminating a BGZF file
const EOF_BLOCK: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// A combined (block address, intra-block offset) coordinate into a
/// block-compressed stream.
///
/// High 48 bits address the compressed block start; low 16 bits index
/// into its decompressed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Build from block address and intra-block offset
    pub fn new(block_address: u64, intra_offset: u16) -> Self {
        VirtualOffset((block_address << 16) | intra_offset as u64)
    }

    /// Reinterpret a raw 64-bit value from an index file
    pub fn from_raw(raw: u64) -> Self {
        VirtualOffset(raw)
    }

    /// The raw 64-bit encoding
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Compressed file offset of the block
    pub fn block_address(&self) -> u64 {
        self.0 >> 16
    }

    /// Byte offset into the block's decompressed payload
    pub fn intra_offset(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// A zero offset marks "no data yet" in linear indexes
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// A byte stream supporting seek to a virtual offset and buffered
/// forward reads, decompressing blocks transparently.
pub trait BlockRead: BufRead {
    /// Position the cursor at the given virtual offset
    fn seek_virtual(&mut self, offset: VirtualOffset) -> io::Result<()>;

    /// Compressed offset of the block currently being consumed
    fn block_address(&self) -> u64;
}

/// Reader over a BGZF container, decompressing one block at a time
pub struct BgzfReader<R: Read + Seek> {
    inner: R,
    /// Decompressed payload of the current block
    block: Vec<u8>,
    /// Read position within `block`
    pos: usize,
    /// Compressed offset of the current block
    block_address: u64,
    /// Compressed offset of the block after the current one
    next_address: u64,
    eof: bool,
}

impl BgzfReader<File> {
    /// Open a BGZF file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read + Seek> BgzfReader<R> {
    /// Wrap a seekable byte source positioned at the container start
    pub fn new(inner: R) -> Self {
        BgzfReader {
            inner,
            block: Vec::new(),
            pos: 0,
            block_address: 0,
            next_address: 0,
            eof: false,
        }
    }

    /// Load and decompress the block at `address`.
    ///
    /// Returns false at end of stream. A conformant empty EOF block
    /// decompresses to nothing and is reported as an ordinary block; the
    /// read loop then falls off the end of the stream.
    fn load_block(&mut self, address: u64) -> io::Result<bool> {
        self.inner.seek(SeekFrom::Start(address))?;

        let mut header = [0u8; FIXED_HEADER_LEN];
        let mut filled = 0;
        while filled < FIXED_HEADER_LEN {
            let n = self.inner.read(&mut header[filled..])?;
            if n == 0 {
                if filled == 0 {
                    self.eof = true;
                    self.block.clear();
                    self.pos = 0;
                    self.block_address = address;
                    return Ok(false);
                }
                return Err(truncated("block header"));
            }
            filled += n;
        }

        if header[0] != 0x1f || header[1] != 0x8b {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("not a gzip block at offset {}", address),
            ));
        }
        if header[3] & 0x04 == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("gzip block at offset {} lacks the BGZF extra field", address),
            ));
        }

        let xlen = u16::from_le_bytes([header[10], header[11]]) as usize;
        let mut extra = vec![0u8; xlen];
        self.inner.read_exact(&mut extra).map_err(|_| truncated("extra field"))?;

        let bsize = find_bsize(&extra).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("no BSIZE subfield in block at offset {}", address),
            )
        })?;
        let block_size = bsize as usize + 1;
        if block_size < FIXED_HEADER_LEN + xlen {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("implausible BSIZE in block at offset {}", address),
            ));
        }

        let mut raw = Vec::with_capacity(block_size);
        raw.extend_from_slice(&header);
        raw.extend_from_slice(&extra);
        raw.resize(block_size, 0);
        self.inner
            .read_exact(&mut raw[FIXED_HEADER_LEN + xlen..])
            .map_err(|_| truncated("block payload"))?;

        self.block.clear();
        let mut decoder = GzDecoder::new(&raw[..]);
        decoder.read_to_end(&mut self.block)?;

        self.pos = 0;
        self.block_address = address;
        self.next_address = address + block_size as u64;
        Ok(true)
    }
}

/// Locate the BC subfield's BSIZE value inside a gzip extra field
fn find_bsize(extra: &[u8]) -> Option<u16> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        if extra[pos] == b'B' && extra[pos + 1] == b'C' && slen == 2 && pos + 6 <= extra.len() {
            return Some(u16::from_le_bytes([extra[pos + 4], extra[pos + 5]]));
        }
        pos += 4 + slen;
    }
    None
}

fn truncated(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("truncated BGZF {}", what),
    )
}

impl<R: Read + Seek> Read for BgzfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read + Seek> BufRead for BgzfReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.pos >= self.block.len() && !self.eof {
            let next = self.next_address;
            self.load_block(next)?;
        }
        Ok(&self.block[self.pos.min(self.block.len())..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.block.len());
    }
}

impl<R: Read + Seek> BlockRead for BgzfReader<R> {
    fn seek_virtual(&mut self, offset: VirtualOffset) -> io::Result<()> {
        self.eof = false;
        if !self.load_block(offset.block_address())? {
            return Ok(());
        }
        self.pos = (offset.intra_offset() as usize).min(self.block.len());
        Ok(())
    }

    fn block_address(&self) -> u64 {
        self.block_address
    }
}

/// Writer producing a BGZF container, one deflated block per
/// [`MAX_BLOCK_PAYLOAD`] bytes of payload (or per explicit flush).
pub struct BgzfWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
    /// Compressed bytes emitted so far; the next block's address
    written: u64,
}

impl<W: Write> BgzfWriter<W> {
    /// Wrap a byte sink
    pub fn new(inner: W) -> Self {
        BgzfWriter {
            inner,
            buffer: Vec::with_capacity(MAX_BLOCK_PAYLOAD),
            written: 0,
        }
    }

    /// Virtual offset of the next byte to be written
    pub fn virtual_position(&self) -> VirtualOffset {
        VirtualOffset::new(self.written, self.buffer.len() as u16)
    }

    /// Force the buffered payload out as a complete block
    pub fn flush_block(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let block = compress_block(&self.buffer)?;
        self.inner.write_all(&block)?;
        self.written += block.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Flush pending payload, append the EOF marker block, and return
    /// the underlying sink
    pub fn finish(mut self) -> io::Result<W> {
        self.flush_block()?;
        self.inner.write_all(&EOF_BLOCK)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut remaining = buf;
        while !remaining.is_empty() {
            let room = MAX_BLOCK_PAYLOAD - self.buffer.len();
            let take = room.min(remaining.len());
            self.buffer.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            if self.buffer.len() == MAX_BLOCK_PAYLOAD {
                self.flush_block()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_block()?;
        self.inner.flush()
    }
}

/// Deflate one payload into a self-contained BGZF block
fn compress_block(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut deflate = DeflateEncoder::new(Vec::new(), Compression::default());
    deflate.write_all(payload)?;
    let deflated = deflate.finish()?;

    let crc = crc32fast::hash(payload);

    let mut block = Vec::with_capacity(deflated.len() + 26);
    block.push(0x1f); // ID1
    block.push(0x8b); // ID2
    block.push(8); // CM (deflate)
    block.push(4); // FLG (FEXTRA)
    block.extend_from_slice(&[0, 0, 0, 0]); // MTIME
    block.push(0); // XFL
    block.push(0xff); // OS (unknown)
    block.extend_from_slice(&6u16.to_le_bytes()); // XLEN
    block.push(b'B');
    block.push(b'C');
    block.extend_from_slice(&2u16.to_le_bytes()); // SLEN
    let bsize_pos = block.len();
    block.extend_from_slice(&0u16.to_le_bytes()); // BSIZE placeholder
    block.extend_from_slice(&deflated);
    block.extend_from_slice(&crc.to_le_bytes());
    block.extend_from_slice(&(payload.len() as u32).to_le_bytes());

    let bsize = (block.len() - 1) as u16;
    block[bsize_pos..bsize_pos + 2].copy_from_slice(&bsize.to_le_bytes());
    Ok(block)
}

/// Read a little-endian u64 virtual offset
pub(crate) fn read_voffset<R: Read>(reader: &mut R) -> io::Result<VirtualOffset> {
    Ok(VirtualOffset::from_raw(reader.read_u64::<LittleEndian>()?))
}
