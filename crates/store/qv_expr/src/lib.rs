//! Vectorized predicates over [`qv_chunk::Chunk`]s.
//!
//! A [`CnfFilter`] is a conjunction of boolean [`Expr`] clauses. Evaluating it
//! against a chunk fills a caller-provided per-row selection vector; a row
//! survives iff every clause evaluates to SQL-TRUE under three-valued logic
//! (a comparison with a NULL operand is UNKNOWN, and UNKNOWN filters the row
//! out).

mod expr;
mod filter;

pub use self::expr::{CmpOp, Expr};
pub use self::filter::CnfFilter;

use qv_chunk::DatumKind;

// ---

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("column #{index} out of range: chunk has {num_columns} columns")]
    ColumnOutOfRange { index: usize, num_columns: usize },

    #[error("cannot compare {lhs} against {rhs}")]
    TypeMismatch { lhs: DatumKind, rhs: DatumKind },

    #[error("expression is not a predicate")]
    NotAPredicate,
}

pub type ExprResult<T> = Result<T, ExprError>;
