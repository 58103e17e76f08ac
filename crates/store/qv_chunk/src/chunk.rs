use crate::{ChunkError, ChunkResult, Column, Datum, Schema};

// ---

/// A fixed-capacity column-oriented batch of rows.
///
/// Chunks are the unit of transport between operators, and the unit of reuse:
/// [`Self::clear`] zeroes the rows but keeps every buffer, and
/// [`Self::swap_columns`] moves the column buffers between two chunks without
/// copying cell data. An operator that owns a chunk is its only writer; chunks
/// change hands whole.
#[derive(Debug, Clone)]
pub struct Chunk {
    schema: Schema,
    columns: Vec<Column>,
    capacity: usize,
    num_rows: usize,
}

impl Chunk {
    pub fn new(schema: Schema, capacity: usize) -> Self {
        Self::with_capacities(schema, capacity, capacity)
    }

    /// A chunk that reserves room for `initial_rows` up front but only counts
    /// as full once it holds `max_rows`.
    ///
    /// Lets operators start small for short inputs while amortizing towards
    /// `max_rows` on chunks that get recycled many times.
    pub fn with_capacities(schema: Schema, initial_rows: usize, max_rows: usize) -> Self {
        debug_assert!(max_rows > 0);
        let columns = schema
            .kinds()
            .iter()
            .map(|&kind| Column::with_capacity(kind, initial_rows.min(max_rows)))
            .collect();
        Self {
            schema,
            columns,
            capacity: max_rows,
            num_rows: 0,
        }
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.num_rows >= self.capacity
    }

    #[inline]
    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Zero rows, retain buffers.
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.num_rows = 0;
    }

    /// Swaps the cell buffers and row counts of two chunks of the same
    /// schema.
    ///
    /// This is how a filled chunk is handed to a caller that owns a (possibly
    /// emptied) chunk of its own: buffers move, cells are never copied. Each
    /// chunk keeps its own [`Self::capacity`], so a recycled chunk retains
    /// the fill threshold it was allocated with; the received rows may exceed
    /// the receiver's capacity, which merely reports it as full until the
    /// next [`Self::clear`].
    pub fn swap_columns(&mut self, other: &mut Self) -> ChunkResult<()> {
        if self.schema != other.schema {
            return Err(ChunkError::SchemaMismatch);
        }
        std::mem::swap(&mut self.columns, &mut other.columns);
        std::mem::swap(&mut self.num_rows, &mut other.num_rows);
        Ok(())
    }

    // --- Appends ---

    pub fn append_row(&mut self, row: &[Datum]) -> ChunkResult<()> {
        if row.len() != self.columns.len() {
            return Err(ChunkError::ArityMismatch {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        if self.is_full() {
            return Err(ChunkError::Full {
                capacity: self.capacity,
            });
        }

        for (column, datum) in self.columns.iter_mut().zip(row) {
            column.push_datum(datum)?;
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Appends a whole row copied from a chunk with the same schema.
    pub fn append_row_from(&mut self, src: RowRef<'_>) -> ChunkResult<()> {
        if self.schema != src.chunk.schema {
            return Err(ChunkError::SchemaMismatch);
        }
        for (column, src_column) in self.columns.iter_mut().zip(&src.chunk.columns) {
            column.push_from(src_column, src.row)?;
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Appends `left`'s row followed by `right`'s row as one output row.
    ///
    /// The receiving chunk's schema must be the concatenation of the two
    /// source schemas.
    pub fn append_concat_row(&mut self, left: RowRef<'_>, right: RowRef<'_>) -> ChunkResult<()> {
        let left_width = left.chunk.num_columns();
        if left_width + right.chunk.num_columns() != self.columns.len() {
            return Err(ChunkError::SchemaMismatch);
        }

        for (column, src_column) in self.columns[..left_width]
            .iter_mut()
            .zip(&left.chunk.columns)
        {
            column.push_from(src_column, left.row)?;
        }
        for (column, src_column) in self.columns[left_width..]
            .iter_mut()
            .zip(&right.chunk.columns)
        {
            column.push_from(src_column, right.row)?;
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Appends `src`'s row into the leading columns and nulls into the rest.
    pub fn append_padded_row(&mut self, src: RowRef<'_>) -> ChunkResult<()> {
        let src_width = src.chunk.num_columns();
        if src_width > self.columns.len() {
            return Err(ChunkError::SchemaMismatch);
        }

        for (column, src_column) in self.columns[..src_width].iter_mut().zip(&src.chunk.columns)
        {
            column.push_from(src_column, src.row)?;
        }
        for column in &mut self.columns[src_width..] {
            column.push_null();
        }
        self.num_rows += 1;
        Ok(())
    }

    // --- Reads ---

    #[inline]
    pub fn row(&self, row: usize) -> RowRef<'_> {
        debug_assert!(row < self.num_rows);
        RowRef { chunk: self, row }
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        (0..self.num_rows).map(|row| RowRef { chunk: self, row })
    }

    /// Materializes one row as owned [`Datum`]s. Test & debug convenience.
    pub fn row_datums(&self, row: usize) -> Vec<Datum> {
        self.columns
            .iter()
            .map(|column| column.datum_at(row))
            .collect()
    }
}

// ---

/// A borrowed view of one row of a [`Chunk`].
///
/// Copyable and cheap; rows are addressed, never materialized.
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    chunk: &'a Chunk,
    row: usize,
}

impl<'a> RowRef<'a> {
    #[inline]
    pub fn chunk(&self) -> &'a Chunk {
        self.chunk
    }

    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    #[inline]
    pub fn column(&self, index: usize) -> &'a Column {
        self.chunk.column(index)
    }

    #[inline]
    pub fn datum(&self, index: usize) -> Datum {
        self.chunk.column(index).datum_at(self.row)
    }

    /// SQL equality of this row's `keys` columns against `other`'s
    /// `other_keys` columns, pairwise. Any null key cell on either side means
    /// no match.
    pub fn keys_eq(&self, keys: &[usize], other: RowRef<'_>, other_keys: &[usize]) -> bool {
        debug_assert_eq!(keys.len(), other_keys.len());
        keys.iter().zip(other_keys).all(|(&lhs, &rhs)| {
            self.chunk
                .column(lhs)
                .sql_eq_cell(self.row, other.chunk.column(rhs), other.row)
        })
    }
}

// ---
