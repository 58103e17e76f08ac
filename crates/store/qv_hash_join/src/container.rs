use nohash_hasher::IntMap;
use smallvec::SmallVec;

use qv_chunk::{Chunk, RowRef};

use crate::{HashContext, JoinResult};

// ---

/// A stable handle to one build-side row inside a [`HashRowContainer`].
///
/// Handles stay valid for the container's whole lifetime: the backing chunks
/// are append-only and never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPtr {
    chunk_idx: u32,
    row_idx: u32,
}

/// Maps 64-bit key fingerprints to the build-side rows that produced them.
///
/// Filled sequentially during the build phase, then shared read-only across
/// the join workers (`&self` everywhere, no interior mutability, hence
/// `Sync` for free).
///
/// Fingerprints collide, so [`Self::matched_rows`] re-verifies full key
/// equality on every candidate before yielding it. Rows with a NULL in any
/// key column are never indexed: under SQL equi-join semantics they can match
/// nothing.
pub struct HashRowContainer {
    /// Append-only backing store of build-side chunks.
    chunks: Vec<Chunk>,
    /// Fingerprint -> rows. Fingerprints are already well-mixed, hence the
    /// identity hasher; most keys are near-unique, hence the inline bucket.
    index: IntMap<u64, SmallVec<[RowPtr; 2]>>,
    /// Build-side key column indices, for candidate re-verification.
    key_cols: Vec<usize>,
    num_rows: usize,
    num_indexed_rows: usize,
}

impl HashRowContainer {
    /// `row_hint` is the planner's cardinality estimate for the build side;
    /// zero means unknown.
    pub fn new(key_cols: Vec<usize>, row_hint: usize) -> Self {
        Self {
            chunks: Vec::new(),
            index: IntMap::with_capacity_and_hasher(row_hint, Default::default()),
            key_cols,
            num_rows: 0,
            num_indexed_rows: 0,
        }
    }

    #[inline]
    pub fn key_cols(&self) -> &[usize] {
        &self.key_cols
    }

    /// Total rows stored, including rows with NULL keys.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Rows actually reachable through the fingerprint index.
    #[inline]
    pub fn num_indexed_rows(&self) -> usize {
        self.num_indexed_rows
    }

    #[inline]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    #[inline]
    pub fn row(&self, ptr: RowPtr) -> RowRef<'_> {
        self.chunks[ptr.chunk_idx as usize].row(ptr.row_idx as usize)
    }

    /// Takes ownership of one filled build-side chunk and indexes every row
    /// whose key columns are all non-NULL.
    pub fn insert_chunk(&mut self, chunk: Chunk, hctx: &mut HashContext) -> JoinResult<()> {
        debug_assert_eq!(hctx.key_cols(), self.key_cols.as_slice());

        hctx.reset(chunk.num_rows());
        hctx.hash_key_columns(&chunk, None)?;

        let chunk_idx = self.chunks.len() as u32;
        for row in 0..chunk.num_rows() {
            if hctx.has_null(row) {
                continue;
            }
            self.index
                .entry(hctx.hash(row))
                .or_default()
                .push(RowPtr {
                    chunk_idx,
                    row_idx: row as u32,
                });
            self.num_indexed_rows += 1;
        }

        self.num_rows += chunk.num_rows();
        self.chunks.push(chunk);
        Ok(())
    }

    /// All build-side rows whose keys truly equal `probe_row`'s keys.
    ///
    /// The fingerprint narrows the search to one bucket; every candidate is
    /// then re-checked cell by cell, because distinct keys can share a
    /// fingerprint.
    pub fn matched_rows<'a>(
        &'a self,
        fingerprint: u64,
        probe_row: RowRef<'a>,
        probe_keys: &'a [usize],
    ) -> impl Iterator<Item = RowRef<'a>> + 'a {
        self.index
            .get(&fingerprint)
            .map(|bucket| bucket.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(move |ptr| probe_row.keys_eq(probe_keys, self.row(**ptr), &self.key_cols))
            .map(|ptr| self.row(*ptr))
    }
}

// ---
