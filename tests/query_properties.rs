//! Property-based validation of index-driven chunk resolution
//!
//! The linear-index resolution is an approximation that must produce a
//! superset of the true scan range, never a subset. A brute-force full
//! scan over the same logical content is the oracle: on randomized
//! fixtures the indexed backend must return exactly the same entries.

mod common;

use common::{write_indexed_pairs, write_plain_pairs, Row};
use pairvor::core::{
    BgzfPairsFile, CancelToken, ContactEntry, IndexVersion, PairsFile, PlainPairsFile, Query,
};
use proptest::prelude::*;

const CHROMS: &[(&str, u64)] = &[("chr1", 1_000_000), ("chr2", 1_000_000)];

fn chrom_name(index: usize) -> &'static str {
    ["chr1", "chr2"][index]
}

/// Random raw rows, canonicalized into stored form: pairs in
/// chromosome order, same-chromosome pairs in the upper triangle.
fn arb_rows() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(
        (0usize..2, 0u64..1_000_000, 0usize..2, 0u64..1_000_000),
        1..40,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .map(|(c1, p1, c2, p2)| {
                let (c1, p1, c2, p2) = if c1 > c2 || (c1 == c2 && p1 > p2) {
                    (c2, p2, c1, p1)
                } else {
                    (c1, p1, c2, p2)
                };
                (chrom_name(c1), p1, chrom_name(c2), p2)
            })
            .collect()
    })
}

/// Random query window over either chromosome combination
fn arb_query() -> impl Strategy<Value = Query> {
    (
        0usize..2,
        0u64..1_000_000,
        0u64..1_000_000,
        0usize..2,
        0u64..1_000_000,
        0u64..1_000_000,
    )
        .prop_map(|(sc, s0, s1, tc, t0, t1)| {
            Query::new(
                chrom_name(sc),
                s0.min(s1),
                s0.max(s1),
                chrom_name(tc),
                t0.min(t1),
                t0.max(t1),
            )
        })
}

fn sorted(mut entries: Vec<ContactEntry>) -> Vec<ContactEntry> {
    entries.sort_by(|a, b| {
        (&a.source_chrom, a.source_position, &a.target_chrom, a.target_position).cmp(&(
            &b.source_chrom,
            b.source_position,
            &b.target_chrom,
            b.target_position,
        ))
    });
    entries
}

proptest! {
    // Fixture construction hits the filesystem; keep the case count
    // modest.
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn indexed_search_matches_brute_force(rows in arb_rows(), query in arb_query()) {
        let indexed = write_indexed_pairs("prop", CHROMS, &rows, IndexVersion::Current);
        let plain = write_plain_pairs("prop", CHROMS, &rows);

        let bgzf_pairs =
            BgzfPairsFile::open_with_index(&indexed.pairs_path, &indexed.index_path).unwrap();
        let plain_pairs = PlainPairsFile::open(&plain.pairs_path).unwrap();

        let cancel = CancelToken::new();
        let from_index = sorted(bgzf_pairs.search(&query, &cancel).unwrap());
        let from_scan = sorted(plain_pairs.search(&query, &cancel).unwrap());
        prop_assert_eq!(from_index, from_scan);
    }

    #[test]
    fn indexed_results_satisfy_containment(rows in arb_rows(), query in arb_query()) {
        let indexed = write_indexed_pairs("prop", CHROMS, &rows, IndexVersion::Current);
        let bgzf_pairs =
            BgzfPairsFile::open_with_index(&indexed.pairs_path, &indexed.index_path).unwrap();

        let rev = query.reverse();
        for entry in bgzf_pairs.search(&query, &CancelToken::new()).unwrap() {
            prop_assert!(entry.is_in_range(&query) || entry.is_in_range(&rev));
        }
    }

    #[test]
    fn density_total_equals_match_count(rows in arb_rows(), query in arb_query()) {
        let indexed = write_indexed_pairs("prop", CHROMS, &rows, IndexVersion::Current);
        let bgzf_pairs =
            BgzfPairsFile::open_with_index(&indexed.pairs_path, &indexed.index_path).unwrap();

        let cancel = CancelToken::new();
        let matches = bgzf_pairs.search(&query, &cancel).unwrap().len() as u64;
        let grid = bgzf_pairs.density(&query, 10_000, 10_000, &cancel).unwrap();

        let expected = if query.source_chrom == query.target_chrom {
            matches * 2
        } else {
            matches
        };
        prop_assert_eq!(grid.total(), expected);
    }
}
