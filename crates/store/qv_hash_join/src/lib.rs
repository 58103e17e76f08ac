//! Parallel hash-join execution operator over [`qv_chunk::Chunk`]s.
//!
//! [`HashJoinExec`] joins two child executors by equality on a list of key
//! columns. The smaller input (the *build* side, by convention the right
//! child) is drained into an in-memory [`HashRowContainer`]; the other input
//! (the *probe* side, the left child) is then streamed through a fan-out/
//! fan-in pipeline:
//!
//! ```text
//! build child ──> build pump ──> HashRowContainer
//!                                      │ (shared, read-only)
//! probe child ──> probe fetcher ──> per-worker channel ──> join worker ×N ──┐
//!                      ▲                                        │           │
//!                      └─────────── recycled probe chunks ──────┘           │
//!                                                                           ▼
//!                                 caller <─────────── shared result channel
//! ```
//!
//! All channels are bounded and every blocking operation also waits on a
//! shutdown signal, so `close` terminates promptly even with workers
//! mid-flight. Chunks are recycled: a channel send transfers exclusive
//! ownership of a chunk, and emptied chunks flow back against the data flow,
//! so the steady state allocates nothing.
//!
//! Output rows of a single probe chunk preserve probe-row order; the
//! interleaving across probe chunks is unspecified.

mod container;
mod executor;
mod hash;
mod join;
mod joiner;

pub use self::container::{HashRowContainer, RowPtr};
pub use self::executor::{ExecError, ExecResult, Executor, MemSource};
pub use self::hash::HashContext;
pub use self::join::{HashJoinConfig, HashJoinExec};
pub use self::joiner::{JoinType, Joiner};

// ---

#[derive(thiserror::Error, Debug)]
pub enum JoinError {
    #[error("upstream executor failed: {0}")]
    Upstream(#[from] ExecError),

    #[error("failed to evaluate the probe-side filter: {0}")]
    Filter(#[from] qv_expr::ExprError),

    #[error("failed to compose an output row: {0}")]
    Joiner(#[source] qv_chunk::ChunkError),

    #[error("join-key arity mismatch: {probe} probe keys vs {build} build keys")]
    OperandShape { probe: usize, build: usize },

    #[error("join-key column #{index} out of range for the {side} side ({num_columns} columns)")]
    KeyOutOfRange {
        side: &'static str,
        index: usize,
        num_columns: usize,
    },

    #[error("concurrency must be non-zero")]
    InvalidConcurrency,

    #[error("chunk capacities must be non-zero")]
    InvalidChunkCapacity,

    #[error("hash join used before open, or after close")]
    NotOpen,

    #[error("failed to spawn a join task: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("unsupported join type: {0:?} (swap the inputs at plan time)")]
    UnsupportedJoinType(JoinType),

    #[error("join task panicked: {0}")]
    TaskPanic(String),

    /// The shutdown signal was observed. Never surfaced through
    /// [`HashJoinExec::next`]; it only makes tasks wind down quietly.
    #[error("hash join was shut down")]
    Cancelled,
}

pub type JoinResult<T> = Result<T, JoinError>;
