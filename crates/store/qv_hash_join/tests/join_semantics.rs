//! Join-type semantics over small literal inputs.
//!
//! The recurring fixture: `t1 = {(1,a), (2,b), (2,c), (NULL,d)}` joined
//! against `t2 = {(1,x), (2,y), (2,z), (3,w), (NULL,v)}`, keyed on column 0.

use itertools::Itertools as _;

use qv_chunk::{Chunk, Datum, DatumKind, Schema};
use qv_expr::{CnfFilter, Expr};
use qv_hash_join::{HashJoinConfig, HashJoinExec, JoinResult, JoinType, MemSource};

// ---

fn two_col_schema() -> Schema {
    Schema::new(vec![DatumKind::Int64, DatumKind::Str])
}

fn rows_of(data: &[(Option<i64>, &str)]) -> Vec<Vec<Datum>> {
    data.iter()
        .map(|(key, text)| {
            vec![
                key.map_or(Datum::Null, Datum::Int64),
                Datum::Str((*text).to_owned()),
            ]
        })
        .collect()
}

fn t1_rows() -> Vec<Vec<Datum>> {
    rows_of(&[(Some(1), "a"), (Some(2), "b"), (Some(2), "c"), (None, "d")])
}

fn t2_rows() -> Vec<Vec<Datum>> {
    rows_of(&[
        (Some(1), "x"),
        (Some(2), "y"),
        (Some(2), "z"),
        (Some(3), "w"),
        (None, "v"),
    ])
}

/// Runs a join to completion and returns the output rows as a sorted multiset.
fn run_join(
    probe_rows: Vec<Vec<Datum>>,
    build_rows: Vec<Vec<Datum>>,
    config: HashJoinConfig,
) -> JoinResult<Vec<String>> {
    let probe = MemSource::new(two_col_schema(), probe_rows).with_batch_rows(3);
    let build = MemSource::new(two_col_schema(), build_rows).with_batch_rows(3);

    let max_chunk_capacity = config.max_chunk_capacity;
    let mut join = HashJoinExec::new(Box::new(probe), Box::new(build), config);
    join.open()?;

    let mut out = Chunk::new(join.schema().clone(), 1024);
    let mut rows = Vec::new();
    loop {
        join.next(&mut out)?;
        if out.is_empty() {
            break;
        }
        // Workers rotate at their configured threshold, no matter how big
        // the chunk we hand them back is.
        assert!(out.num_rows() <= max_chunk_capacity);
        for row in 0..out.num_rows() {
            rows.push(format!("{:?}", out.row_datums(row)));
        }
    }
    join.close()?;

    Ok(rows.into_iter().sorted().collect_vec())
}

fn expect_rows(expected: &[Vec<Datum>]) -> Vec<String> {
    expected
        .iter()
        .map(|row| format!("{row:?}"))
        .sorted()
        .collect_vec()
}

fn config(join_type: JoinType) -> HashJoinConfig {
    HashJoinConfig {
        join_type,
        probe_keys: vec![0],
        build_keys: vec![0],
        // Tiny chunks on purpose: results must rotate mid-stream.
        initial_chunk_capacity: 2,
        max_chunk_capacity: 2,
        concurrency: 2,
        ..Default::default()
    }
}

fn datum_row(data: &[Datum]) -> Vec<Datum> {
    data.to_vec()
}

// ---

#[test]
fn inner_join() {
    let rows = run_join(t1_rows(), t2_rows(), config(JoinType::Inner)).unwrap();

    let expected = expect_rows(&[
        datum_row(&[1i64.into(), "a".into(), 1i64.into(), "x".into()]),
        datum_row(&[2i64.into(), "b".into(), 2i64.into(), "y".into()]),
        datum_row(&[2i64.into(), "b".into(), 2i64.into(), "z".into()]),
        datum_row(&[2i64.into(), "c".into(), 2i64.into(), "y".into()]),
        datum_row(&[2i64.into(), "c".into(), 2i64.into(), "z".into()]),
    ]);
    similar_asserts::assert_eq!(rows, expected);
}

#[test]
fn left_outer_join() {
    let rows = run_join(t1_rows(), t2_rows(), config(JoinType::LeftOuter)).unwrap();

    let expected = expect_rows(&[
        datum_row(&[1i64.into(), "a".into(), 1i64.into(), "x".into()]),
        datum_row(&[2i64.into(), "b".into(), 2i64.into(), "y".into()]),
        datum_row(&[2i64.into(), "b".into(), 2i64.into(), "z".into()]),
        datum_row(&[2i64.into(), "c".into(), 2i64.into(), "y".into()]),
        datum_row(&[2i64.into(), "c".into(), 2i64.into(), "z".into()]),
        datum_row(&[Datum::Null, "d".into(), Datum::Null, Datum::Null]),
    ]);
    similar_asserts::assert_eq!(rows, expected);
}

#[test]
fn left_semi_join() {
    let rows = run_join(t1_rows(), t2_rows(), config(JoinType::LeftSemi)).unwrap();

    let expected = expect_rows(&[
        datum_row(&[1i64.into(), "a".into()]),
        datum_row(&[2i64.into(), "b".into()]),
        datum_row(&[2i64.into(), "c".into()]),
    ]);
    similar_asserts::assert_eq!(rows, expected);
}

#[test]
fn left_anti_join() {
    let rows = run_join(t1_rows(), t2_rows(), config(JoinType::LeftAnti)).unwrap();

    let expected = expect_rows(&[datum_row(&[Datum::Null, "d".into()])]);
    similar_asserts::assert_eq!(rows, expected);
}

#[test]
fn probe_side_filter_narrows_the_join() {
    // Sides swapped: t2 probes a table built from t1, with `t2.col0 != 2`
    // filtering probe rows before they reach the hash table.
    let mut config = config(JoinType::Inner);
    config.probe_filter = Some(CnfFilter::new(vec![Expr::col(0).ne(Expr::lit(2i64))]));

    let rows = run_join(t2_rows(), t1_rows(), config).unwrap();

    let expected = expect_rows(&[datum_row(&[
        1i64.into(),
        "x".into(),
        1i64.into(),
        "a".into(),
    ])]);
    similar_asserts::assert_eq!(rows, expected);
}

#[test]
fn filtered_probe_rows_still_surface_in_outer_joins() {
    // A filtered-out probe row counts as unmatched: left outer keeps it,
    // padded with NULLs.
    let mut config = config(JoinType::LeftOuter);
    config.probe_filter = Some(CnfFilter::new(vec![Expr::col(0).ne(Expr::lit(2i64))]));

    let rows = run_join(t1_rows(), t2_rows(), config).unwrap();

    let expected = expect_rows(&[
        datum_row(&[1i64.into(), "a".into(), 1i64.into(), "x".into()]),
        datum_row(&[2i64.into(), "b".into(), Datum::Null, Datum::Null]),
        datum_row(&[2i64.into(), "c".into(), Datum::Null, Datum::Null]),
        datum_row(&[Datum::Null, "d".into(), Datum::Null, Datum::Null]),
    ]);
    similar_asserts::assert_eq!(rows, expected);
}

#[test]
fn empty_build_side() {
    let no_rows = Vec::new();

    let rows = run_join(t1_rows(), no_rows.clone(), config(JoinType::Inner)).unwrap();
    assert!(rows.is_empty());

    let rows = run_join(t1_rows(), no_rows.clone(), config(JoinType::LeftSemi)).unwrap();
    assert!(rows.is_empty());

    // Every probe row is unmatched: left outer pads them all, anti keeps
    // them all.
    let rows = run_join(t1_rows(), no_rows.clone(), config(JoinType::LeftOuter)).unwrap();
    assert_eq!(rows.len(), 4);

    let rows = run_join(t1_rows(), no_rows, config(JoinType::LeftAnti)).unwrap();
    assert_eq!(rows.len(), 4);
}

#[test]
fn empty_probe_side() {
    for join_type in [
        JoinType::Inner,
        JoinType::LeftOuter,
        JoinType::LeftSemi,
        JoinType::LeftAnti,
    ] {
        let rows = run_join(Vec::new(), t2_rows(), config(join_type)).unwrap();
        assert!(rows.is_empty(), "{join_type:?} over an empty probe side");
    }
}

#[test]
fn multi_column_keys() {
    let probe = rows_of(&[(Some(1), "k"), (Some(1), "m"), (None, "k")]);
    let build = rows_of(&[(Some(1), "k"), (Some(2), "k"), (Some(1), "m")]);

    let mut config = config(JoinType::Inner);
    config.probe_keys = vec![0, 1];
    config.build_keys = vec![0, 1];

    let rows = run_join(probe, build, config).unwrap();

    let expected = expect_rows(&[
        datum_row(&[1i64.into(), "k".into(), 1i64.into(), "k".into()]),
        datum_row(&[1i64.into(), "m".into(), 1i64.into(), "m".into()]),
    ]);
    similar_asserts::assert_eq!(rows, expected);
}

#[test]
fn cross_signedness_keys_join() {
    // An i64 probe column against a u64 build column: equal values must
    // match, and -1 must not alias u64::MAX.
    let probe_schema = Schema::new(vec![DatumKind::Int64, DatumKind::Str]);
    let build_schema = Schema::new(vec![DatumKind::UInt64, DatumKind::Str]);

    let probe_rows = vec![
        vec![Datum::Int64(42), Datum::Str("p0".to_owned())],
        vec![Datum::Int64(-1), Datum::Str("p1".to_owned())],
    ];
    let build_rows = vec![
        vec![Datum::UInt64(42), Datum::Str("b0".to_owned())],
        vec![Datum::UInt64(u64::MAX), Datum::Str("b1".to_owned())],
    ];

    let probe = MemSource::new(probe_schema, probe_rows);
    let build = MemSource::new(build_schema, build_rows);
    let mut join = HashJoinExec::new(
        Box::new(probe),
        Box::new(build),
        HashJoinConfig {
            probe_keys: vec![0],
            build_keys: vec![0],
            ..Default::default()
        },
    );
    join.open().unwrap();

    let mut out = Chunk::new(join.schema().clone(), 64);
    let mut rows = Vec::new();
    loop {
        join.next(&mut out).unwrap();
        if out.is_empty() {
            break;
        }
        for row in 0..out.num_rows() {
            rows.push(out.row_datums(row));
        }
    }
    join.close().unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][3], Datum::Str("b0".to_owned()));
}

#[test]
fn duplicate_heavy_build_side_rotates_output_chunks() {
    // 3 probe hits x 50 duplicate build rows, through 2-row output chunks:
    // a single probe row overflows the output chunk many times over.
    let probe = rows_of(&[(Some(7), "p0"), (Some(7), "p1"), (Some(7), "p2")]);
    let build: Vec<Vec<Datum>> = (0..50)
        .map(|i| vec![Datum::Int64(7), Datum::Str(format!("b{i}"))])
        .collect();

    let rows = run_join(probe, build, config(JoinType::Inner)).unwrap();
    assert_eq!(rows.len(), 3 * 50);

    // Same inputs, semi: one emission per probe row, duplicates or not.
    let probe = rows_of(&[(Some(7), "p0"), (Some(7), "p1"), (Some(7), "p2")]);
    let build: Vec<Vec<Datum>> = (0..50)
        .map(|i| vec![Datum::Int64(7), Datum::Str(format!("b{i}"))])
        .collect();
    let rows = run_join(probe, build, config(JoinType::LeftSemi)).unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn inner_join_with_unique_build_keys_emits_no_duplicates() {
    let probe = rows_of(&[
        (Some(0), "p"),
        (Some(1), "p"),
        (Some(2), "p"),
        (Some(3), "p"),
        (None, "p"),
    ]);
    // Unique keys 1..=3: exactly one output row per matching probe row.
    let build = rows_of(&[(Some(1), "b"), (Some(2), "b"), (Some(3), "b")]);

    let rows = run_join(probe, build, config(JoinType::Inner)).unwrap();
    assert_eq!(rows.len(), 3);
}
