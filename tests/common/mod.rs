//! Shared fixture builders: write a block-compressed pairs file and a
//! matching binary index from a plain list of entries.

use byteorder::{LittleEndian, WriteBytesExt};
use pairvor::core::{BgzfWriter, IndexVersion, VirtualOffset};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// One data row: (source chrom, source pos, target chrom, target pos)
pub type Row = (&'static str, u64, &'static str, u64);

/// An on-disk pairs file plus index, kept alive by the temp dir
pub struct Fixture {
    pub dir: TempDir,
    pub pairs_path: PathBuf,
    pub index_path: PathBuf,
}

/// Entries per compressed block in the data file; small so even tiny
/// fixtures span several blocks and exercise seeking.
const ROWS_PER_BLOCK: usize = 2;

/// Write a sorted pairs file and its index.
///
/// `chromsizes` supplies both the header declarations and the
/// chromosome order used for sorting; rows are sorted into
/// chr1-chr2-pos1-pos2 order automatically.
pub fn write_indexed_pairs(
    genome: &str,
    chromsizes: &[(&str, u64)],
    rows: &[Row],
    version: IndexVersion,
) -> Fixture {
    let dir = TempDir::new().expect("create temp dir");
    let pairs_path = dir.path().join("fixture.pairs.gz");
    let index_path = dir.path().join("fixture.pairs.gz.px2");

    let order: BTreeMap<&str, usize> = chromsizes
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (*name, i))
        .collect();
    let mut sorted: Vec<Row> = rows.to_vec();
    sorted.sort_by_key(|(sc, sp, tc, tp)| (order[sc], order[tc], *sp, *tp));

    // Data file
    let mut writer = BgzfWriter::new(File::create(&pairs_path).expect("create pairs file"));
    let mut header = String::from("## pairs format v1.0\n");
    header.push_str("#sorted: chr1-chr2-pos1-pos2\n");
    header.push_str("#shape: upper triangle\n");
    header.push_str(&format!("#genome_assembly: {}\n", genome));
    for (name, length) in chromsizes {
        header.push_str(&format!("#chromsize: {} {}\n", name, length));
    }
    writer.write_all(header.as_bytes()).expect("write header");
    writer.flush_block().expect("flush header block");

    // Per pair: line-start offsets keyed by linear bin, plus start/end
    struct PairRecord {
        name: String,
        start: VirtualOffset,
        end: VirtualOffset,
        first_in_bin: BTreeMap<u64, VirtualOffset>,
    }
    let mut pair_records: Vec<PairRecord> = Vec::new();
    let shift = version.linear_shift();

    let mut in_block = 0usize;
    for (i, (sc, sp, tc, tp)) in sorted.iter().enumerate() {
        let pair_name = format!("{}|{}", sc, tc);
        let position = writer.virtual_position();

        if pair_records.last().map(|r| r.name.as_str()) != Some(pair_name.as_str()) {
            pair_records.push(PairRecord {
                name: pair_name,
                start: position,
                end: position,
                first_in_bin: BTreeMap::new(),
            });
        }

        let record = pair_records.last_mut().expect("current pair");
        record.first_in_bin.entry(sp >> shift).or_insert(position);

        writer
            .write_all(format!("read{}\t{}\t{}\t{}\t{}\t+\t-\n", i, sc, sp, tc, tp).as_bytes())
            .expect("write row");
        record.end = writer.virtual_position();

        in_block += 1;
        if in_block == ROWS_PER_BLOCK {
            writer.flush_block().expect("flush data block");
            in_block = 0;
            // end offsets must point at real stream positions
            pair_records.last_mut().expect("current pair").end = writer.virtual_position();
        }
    }
    writer.finish().expect("finish pairs file");

    // Index file, itself block-compressed
    let mut index = Vec::new();
    match version {
        IndexVersion::Legacy => index.extend_from_slice(b"PX2.002\x01"),
        IndexVersion::Current => index.extend_from_slice(b"PX2.003\x01"),
    }
    index
        .write_i32::<LittleEndian>(pair_records.len() as i32)
        .unwrap();
    match version {
        IndexVersion::Legacy => index.write_i32::<LittleEndian>(sorted.len() as i32).unwrap(),
        IndexVersion::Current => index.write_u64::<LittleEndian>(sorted.len() as u64).unwrap(),
    }
    // Configuration record: column layout of the pairs format
    for field in [0i32, 2, 3, 0, 4, 5, 0] {
        index.write_i32::<LittleEndian>(field).unwrap();
    }
    index.push(b'\t');
    index.push(b'|');
    index.extend_from_slice(&[0, 0]);
    index.write_i32::<LittleEndian>(b'#' as i32).unwrap();
    index.write_i32::<LittleEndian>(0).unwrap();

    let mut names = Vec::new();
    for record in &pair_records {
        names.extend_from_slice(record.name.as_bytes());
        names.push(0);
    }
    index.write_i32::<LittleEndian>(names.len() as i32).unwrap();
    index.extend_from_slice(&names);

    for record in &pair_records {
        // One chunk spanning the whole pair under bin 0
        index.write_i32::<LittleEndian>(1).unwrap();
        index.write_u32::<LittleEndian>(0).unwrap();
        index.write_i32::<LittleEndian>(1).unwrap();
        index.write_u64::<LittleEndian>(record.start.as_raw()).unwrap();
        index.write_u64::<LittleEndian>(record.end.as_raw()).unwrap();

        // Linear index: first offset per populated bin; empty bins
        // after the first data point to the next populated bin (first
        // record at or after that window), bins before it stay zero,
        // and the final entry is the pair end.
        let first_bin = *record.first_in_bin.keys().next().expect("populated pair");
        let last_bin = *record.first_in_bin.keys().last().expect("populated pair");
        let len = last_bin as usize + 2;
        let mut linear = vec![VirtualOffset::from_raw(0); len];
        for (&bin, &offset) in &record.first_in_bin {
            linear[bin as usize] = offset;
        }
        linear[len - 1] = record.end;
        for b in (first_bin as usize..len - 1).rev() {
            if linear[b].is_zero() {
                linear[b] = linear[b + 1];
            }
        }

        index.write_i32::<LittleEndian>(linear.len() as i32).unwrap();
        for offset in &linear {
            index.write_u64::<LittleEndian>(offset.as_raw()).unwrap();
        }
    }

    let mut index_writer =
        BgzfWriter::new(File::create(&index_path).expect("create index file"));
    index_writer.write_all(&index).expect("write index");
    index_writer.finish().expect("finish index file");

    Fixture {
        dir,
        pairs_path,
        index_path,
    }
}

/// Write the same logical content as an uncompressed plain pairs file
pub fn write_plain_pairs(genome: &str, chromsizes: &[(&str, u64)], rows: &[Row]) -> Fixture {
    let dir = TempDir::new().expect("create temp dir");
    let pairs_path = dir.path().join("fixture.pairs");
    let index_path = dir.path().join("unused.px2");

    let order: BTreeMap<&str, usize> = chromsizes
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (*name, i))
        .collect();
    let mut sorted: Vec<Row> = rows.to_vec();
    sorted.sort_by_key(|(sc, sp, tc, tp)| (order[sc], order[tc], *sp, *tp));

    let mut file = File::create(&pairs_path).expect("create pairs file");
    writeln!(file, "## pairs format v1.0").unwrap();
    writeln!(file, "#sorted: chr1-chr2-pos1-pos2").unwrap();
    writeln!(file, "#shape: upper triangle").unwrap();
    writeln!(file, "#genome_assembly: {}", genome).unwrap();
    for (name, length) in chromsizes {
        writeln!(file, "#chromsize: {} {}", name, length).unwrap();
    }
    for (i, (sc, sp, tc, tp)) in sorted.iter().enumerate() {
        writeln!(file, "read{}\t{}\t{}\t{}\t{}\t+\t-", i, sc, sp, tc, tp).unwrap();
    }
    file.flush().unwrap();

    Fixture {
        dir,
        pairs_path,
        index_path,
    }
}
