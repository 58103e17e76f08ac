use std::cmp::Ordering;

use qv_chunk::{Chunk, Datum};

use crate::{ExprError, ExprResult};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    #[inline]
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// A scalar expression over the columns of a chunk.
///
/// Build with the constructor helpers: `Expr::col(0).ne(Expr::lit(2))`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(usize),
    Literal(Datum),
    Cmp {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    IsNull(Box<Expr>),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    #[inline]
    pub fn col(index: usize) -> Self {
        Self::Column(index)
    }

    #[inline]
    pub fn lit(datum: impl Into<Datum>) -> Self {
        Self::Literal(datum.into())
    }

    #[inline]
    pub fn cmp(self, op: CmpOp, rhs: Self) -> Self {
        Self::Cmp {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    #[inline]
    pub fn eq(self, rhs: Self) -> Self {
        self.cmp(CmpOp::Eq, rhs)
    }

    #[inline]
    pub fn ne(self, rhs: Self) -> Self {
        self.cmp(CmpOp::Ne, rhs)
    }

    #[inline]
    pub fn lt(self, rhs: Self) -> Self {
        self.cmp(CmpOp::Lt, rhs)
    }

    #[inline]
    pub fn gt(self, rhs: Self) -> Self {
        self.cmp(CmpOp::Gt, rhs)
    }

    #[inline]
    pub fn is_null(self) -> Self {
        Self::IsNull(Box::new(self))
    }

    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluates this expression as a value, for one row.
    fn eval_datum(&self, chunk: &Chunk, row: usize) -> ExprResult<Datum> {
        match self {
            Self::Column(index) => {
                if *index >= chunk.num_columns() {
                    return Err(ExprError::ColumnOutOfRange {
                        index: *index,
                        num_columns: chunk.num_columns(),
                    });
                }
                Ok(chunk.column(*index).datum_at(row))
            }
            Self::Literal(datum) => Ok(datum.clone()),

            Self::Cmp { .. } | Self::IsNull(_) | Self::Not(_) | Self::And(_) | Self::Or(_) => {
                // Predicates are not first-class values (there is no boolean
                // column kind); they only appear under a filter.
                Err(ExprError::NotAPredicate)
            }
        }
    }

    /// Evaluates this expression as a predicate, for one row.
    ///
    /// `None` is SQL UNKNOWN.
    pub fn eval_truth(&self, chunk: &Chunk, row: usize) -> ExprResult<Option<bool>> {
        match self {
            Self::Cmp { op, lhs, rhs } => {
                let lhs = lhs.eval_datum(chunk, row)?;
                let rhs = rhs.eval_datum(chunk, row)?;
                Ok(sql_cmp(&lhs, &rhs)?.map(|ordering| op.holds(ordering)))
            }

            Self::IsNull(expr) => Ok(Some(expr.eval_datum(chunk, row)?.is_null())),

            Self::Not(expr) => Ok(expr.eval_truth(chunk, row)?.map(|value| !value)),

            Self::And(clauses) => {
                let mut saw_unknown = false;
                for clause in clauses {
                    match clause.eval_truth(chunk, row)? {
                        Some(false) => return Ok(Some(false)),
                        None => saw_unknown = true,
                        Some(true) => {}
                    }
                }
                Ok(if saw_unknown { None } else { Some(true) })
            }

            Self::Or(clauses) => {
                let mut saw_unknown = false;
                for clause in clauses {
                    match clause.eval_truth(chunk, row)? {
                        Some(true) => return Ok(Some(true)),
                        None => saw_unknown = true,
                        Some(false) => {}
                    }
                }
                Ok(if saw_unknown { None } else { Some(false) })
            }

            Self::Column(_) | Self::Literal(_) => Err(ExprError::NotAPredicate),
        }
    }
}

// ---

/// SQL comparison of two scalars. `None` iff either side is NULL, or the
/// comparison itself is undefined (NaN).
fn sql_cmp(lhs: &Datum, rhs: &Datum) -> ExprResult<Option<Ordering>> {
    let ordering = match (lhs, rhs) {
        (Datum::Null, _) | (_, Datum::Null) => return Ok(None),

        (Datum::Int64(lhs), Datum::Int64(rhs))
        | (Datum::Timestamp(lhs), Datum::Timestamp(rhs)) => lhs.cmp(rhs),
        (Datum::UInt64(lhs), Datum::UInt64(rhs)) => lhs.cmp(rhs),
        (Datum::Int64(lhs), Datum::UInt64(rhs)) => (*lhs as i128).cmp(&(*rhs as i128)),
        (Datum::UInt64(lhs), Datum::Int64(rhs)) => (*lhs as i128).cmp(&(*rhs as i128)),

        (Datum::Float64(lhs), Datum::Float64(rhs)) => match lhs.partial_cmp(rhs) {
            Some(ordering) => ordering,
            None => return Ok(None),
        },

        (Datum::Decimal(lhs), Datum::Decimal(rhs)) => {
            // Align scales before comparing mantissas; if the widening
            // overflows i128 the magnitudes are wildly apart, so comparing
            // the approximate values is exact enough.
            let scale = lhs.scale().max(rhs.scale());
            let widen = |decimal: &qv_chunk::Decimal| {
                10i128
                    .checked_pow(u32::from(scale - decimal.scale()))
                    .and_then(|pow| decimal.mantissa().checked_mul(pow))
            };
            match (widen(lhs), widen(rhs)) {
                (Some(lhs), Some(rhs)) => lhs.cmp(&rhs),
                _ => {
                    let approx = |decimal: &qv_chunk::Decimal| {
                        decimal.mantissa() as f64 / 10f64.powi(i32::from(decimal.scale()))
                    };
                    match approx(lhs).partial_cmp(&approx(rhs)) {
                        Some(ordering) => ordering,
                        None => return Ok(None),
                    }
                }
            }
        }

        (Datum::Str(lhs), Datum::Str(rhs)) => lhs.as_bytes().cmp(rhs.as_bytes()),

        _ => {
            return Err(ExprError::TypeMismatch {
                // `kind()` is only `None` for nulls, which bailed above.
                lhs: lhs.kind().expect("null handled above"),
                rhs: rhs.kind().expect("null handled above"),
            });
        }
    };

    Ok(Some(ordering))
}
