use qv_chunk::Chunk;

use crate::{JoinError, JoinResult};

// ---

// Fixed seeds: build-side and probe-side fingerprints of equal keys must
// agree, and they are computed by different tasks with different contexts.
const HASH_STATE: ahash::RandomState =
    ahash::RandomState::with_seeds(0x2f7e_9a1c, 0x8d43_55b6, 0x51c0_ee02, 0xa9b7_1d48);

const FOLD_SEED: u64 = 0xcbf2_9ce4_8422_2325;
const FOLD_MULT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Per-task scratch for fingerprinting the join-key columns of one chunk.
///
/// One context per worker (and one for the build pump), so hashing needs no
/// synchronization: the accumulators, null flags and codec buffer are all
/// reused from batch to batch.
pub struct HashContext {
    /// `"build"` or `"probe"`, for error reporting.
    side: &'static str,
    key_cols: Vec<usize>,
    /// Per-row 64-bit fingerprint accumulator.
    hashes: Vec<u64>,
    /// Per-row flag: some key column of this row is NULL.
    has_null: Vec<bool>,
    /// Scratch for the canonical byte encoding of one cell.
    buf: Vec<u8>,
}

impl HashContext {
    pub fn new(side: &'static str, key_cols: Vec<usize>) -> Self {
        Self {
            side,
            key_cols,
            hashes: Vec::new(),
            has_null: Vec::new(),
            buf: Vec::new(),
        }
    }

    #[inline]
    pub fn key_cols(&self) -> &[usize] {
        &self.key_cols
    }

    #[inline]
    pub fn hash(&self, row: usize) -> u64 {
        self.hashes[row]
    }

    #[inline]
    pub fn has_null(&self, row: usize) -> bool {
        self.has_null[row]
    }

    /// Re-initializes the per-row state for a batch of `num_rows` rows.
    pub fn reset(&mut self, num_rows: usize) {
        self.hashes.clear();
        self.hashes.resize(num_rows, FOLD_SEED);
        self.has_null.clear();
        self.has_null.resize(num_rows, false);
    }

    /// Folds every key column of `chunk` into the accumulators, raising the
    /// per-row null flag for null cells.
    ///
    /// Rows where `selected` is `false` are skipped entirely: their
    /// accumulator and null flag are left untouched. Pass `None` to hash
    /// every row (the build side has no filter).
    pub fn hash_key_columns(
        &mut self,
        chunk: &Chunk,
        selected: Option<&[bool]>,
    ) -> JoinResult<()> {
        debug_assert_eq!(self.hashes.len(), chunk.num_rows());

        let Self {
            side,
            key_cols,
            hashes,
            has_null,
            buf,
        } = self;
        let key_cols: &[usize] = key_cols;

        for &col in key_cols {
            if col >= chunk.num_columns() {
                return Err(JoinError::KeyOutOfRange {
                    side: *side,
                    index: col,
                    num_columns: chunk.num_columns(),
                });
            }

            let column = chunk.column(col);
            for row in 0..chunk.num_rows() {
                if let Some(selected) = selected {
                    if !selected[row] {
                        continue;
                    }
                }

                buf.clear();
                if column.write_key_bytes(row, buf) {
                    let cell_hash = HASH_STATE.hash_one(buf.as_slice());
                    hashes[row] = (hashes[row] ^ cell_hash).wrapping_mul(FOLD_MULT);
                } else {
                    has_null[row] = true;
                }
            }
        }

        Ok(())
    }
}

// ---

#[cfg(test)]
mod tests {
    use qv_chunk::{Chunk, Datum, DatumKind, Schema};

    use super::HashContext;

    fn single_column_chunk(kind: DatumKind, data: Vec<Datum>) -> Chunk {
        let mut chunk = Chunk::new(Schema::new(vec![kind]), data.len().max(1));
        for datum in data {
            chunk.append_row(&[datum]).unwrap();
        }
        chunk
    }

    #[test]
    fn equal_keys_hash_equal_across_signedness() {
        let signed = single_column_chunk(
            DatumKind::Int64,
            vec![Datum::Int64(7), Datum::Int64(-7)],
        );
        let unsigned = single_column_chunk(
            DatumKind::UInt64,
            vec![Datum::UInt64(7), Datum::UInt64(7u64.wrapping_neg())],
        );

        let mut lhs = HashContext::new("probe", vec![0]);
        lhs.reset(2);
        lhs.hash_key_columns(&signed, None).unwrap();

        let mut rhs = HashContext::new("probe", vec![0]);
        rhs.reset(2);
        rhs.hash_key_columns(&unsigned, None).unwrap();

        assert_eq!(lhs.hash(0), rhs.hash(0));
        // -7 and 2^64-7 compare unequal, so their fingerprints should differ.
        assert_ne!(lhs.hash(1), rhs.hash(1));
    }

    #[test]
    fn null_cells_raise_the_null_flag() {
        let chunk = single_column_chunk(
            DatumKind::Str,
            vec![Datum::Str("a".to_owned()), Datum::Null],
        );

        let mut ctx = HashContext::new("probe", vec![0]);
        ctx.reset(2);
        ctx.hash_key_columns(&chunk, None).unwrap();

        assert!(!ctx.has_null(0));
        assert!(ctx.has_null(1));
    }

    #[test]
    fn unselected_rows_are_untouched() {
        let chunk = single_column_chunk(
            DatumKind::Int64,
            vec![Datum::Int64(1), Datum::Null, Datum::Int64(3)],
        );

        let mut ctx = HashContext::new("probe", vec![0]);
        ctx.reset(3);
        ctx.hash_key_columns(&chunk, Some(&[true, false, false]))
            .unwrap();

        // Row 1 is NULL but unselected: the flag must not be raised.
        assert!(!ctx.has_null(1));
        // Rows 1 and 2 keep the untouched seed accumulator.
        assert_eq!(ctx.hash(1), ctx.hash(2));
        assert_ne!(ctx.hash(0), ctx.hash(1));
    }

    #[test]
    fn multi_column_keys_mix_both_columns() {
        let mut chunk = Chunk::new(
            Schema::new(vec![DatumKind::Int64, DatumKind::Str]),
            4,
        );
        chunk
            .append_row(&[Datum::Int64(1), Datum::Str("a".to_owned())])
            .unwrap();
        chunk
            .append_row(&[Datum::Int64(1), Datum::Str("b".to_owned())])
            .unwrap();

        let mut ctx = HashContext::new("probe", vec![0, 1]);
        ctx.reset(2);
        ctx.hash_key_columns(&chunk, None).unwrap();

        assert_ne!(ctx.hash(0), ctx.hash(1));
    }
}
