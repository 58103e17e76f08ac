use qv_chunk::{Chunk, Datum, Schema};

// ---

#[derive(thiserror::Error, Debug)]
pub enum ExecError {
    #[error(transparent)]
    Chunk(#[from] qv_chunk::ChunkError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ExecResult<T> = Result<T, ExecError>;

/// A volcano-style chunk executor: the interface between operators.
///
/// `Send` because operators are free to drive their children from a worker
/// thread, the way [`crate::HashJoinExec`] drives its probe child.
pub trait Executor: Send {
    fn schema(&self) -> &Schema;

    fn open(&mut self) -> ExecResult<()>;

    /// Fills `out` with the next batch of rows.
    ///
    /// `out` arrives cleared and sized to this executor's schema. Leaving it
    /// empty signals end-of-input. Implementations fill at most
    /// `out.capacity()` rows.
    fn next(&mut self, out: &mut Chunk) -> ExecResult<()>;

    fn close(&mut self) -> ExecResult<()>;
}

// ---

/// An in-memory [`Executor`] over a fixed list of rows.
///
/// The reference implementation of the executor contract, and the source of
/// choice in tests.
pub struct MemSource {
    schema: Schema,
    rows: Vec<Vec<Datum>>,
    cursor: usize,
    /// Upper bound on rows handed out per [`Self::next`] call, to exercise
    /// batch boundaries independently of chunk capacity.
    batch_rows: usize,
}

impl MemSource {
    pub fn new(schema: Schema, rows: Vec<Vec<Datum>>) -> Self {
        Self {
            schema,
            rows,
            cursor: 0,
            batch_rows: usize::MAX,
        }
    }

    #[inline]
    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows.max(1);
        self
    }
}

impl Executor for MemSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> ExecResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self, out: &mut Chunk) -> ExecResult<()> {
        let mut handed_out = 0;
        while self.cursor < self.rows.len() && handed_out < self.batch_rows && !out.is_full() {
            out.append_row(&self.rows[self.cursor])?;
            self.cursor += 1;
            handed_out += 1;
        }
        Ok(())
    }

    fn close(&mut self) -> ExecResult<()> {
        Ok(())
    }
}

// ---

#[cfg(test)]
mod tests {
    use qv_chunk::{Chunk, Datum, DatumKind, Schema};

    use super::{Executor, MemSource};

    #[test]
    fn mem_source_batches() {
        let schema = Schema::new(vec![DatumKind::Int64]);
        let rows: Vec<Vec<Datum>> = (0..5).map(|i| vec![Datum::Int64(i)]).collect();
        let mut source = MemSource::new(schema.clone(), rows).with_batch_rows(2);
        source.open().unwrap();

        let mut out = Chunk::new(schema, 8);
        let mut seen = Vec::new();
        loop {
            out.clear();
            source.next(&mut out).unwrap();
            if out.is_empty() {
                break;
            }
            assert!(out.num_rows() <= 2);
            for row in 0..out.num_rows() {
                seen.push(out.column(0).i64_at(row).unwrap());
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        // Reopening rewinds.
        source.open().unwrap();
        out.clear();
        source.next(&mut out).unwrap();
        assert_eq!(out.num_rows(), 2);
    }
}
