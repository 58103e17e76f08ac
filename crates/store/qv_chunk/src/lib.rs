//! Fixed-capacity columnar batches ("chunks") of typed values.
//!
//! A [`Chunk`] is the unit of transport between quiver operators: operators fill
//! chunks, hand them downstream, and get emptied chunks back for reuse.
//! Cell data lives in per-column buffers ([`Column`]) with a validity bitmap,
//! so clearing a chunk retains every allocation.

mod chunk;
mod column;
mod datum;

pub use self::chunk::{Chunk, RowRef};
pub use self::column::Column;
pub use self::datum::{Datum, DatumKind, Decimal, Schema};

// ---

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: DatumKind, got: String },

    #[error("row arity mismatch: chunk has {expected} columns, row has {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("schema mismatch between chunks")]
    SchemaMismatch,

    #[error("chunk is full (capacity: {capacity})")]
    Full { capacity: usize },
}

pub type ChunkResult<T> = Result<T, ChunkError>;
