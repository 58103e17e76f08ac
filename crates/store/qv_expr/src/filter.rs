use qv_chunk::Chunk;

use crate::{Expr, ExprResult};

// ---

/// A filter in conjunctive normal form: a row passes iff every clause
/// evaluates to SQL-TRUE.
///
/// An empty conjunction accepts every row.
#[derive(Debug, Clone, PartialEq)]
pub struct CnfFilter {
    clauses: Vec<Expr>,
}

impl CnfFilter {
    #[inline]
    pub fn new(clauses: impl Into<Vec<Expr>>) -> Self {
        Self {
            clauses: clauses.into(),
        }
    }

    #[inline]
    pub fn clauses(&self) -> &[Expr] {
        &self.clauses
    }

    /// Fills `selected` with one boolean per row of `chunk`.
    ///
    /// The caller's buffer is reused as-is: resized to the chunk's row count,
    /// never reallocated once it has reached chunk capacity.
    pub fn eval_selected(&self, chunk: &Chunk, selected: &mut Vec<bool>) -> ExprResult<()> {
        selected.clear();
        selected.resize(chunk.num_rows(), true);

        for clause in &self.clauses {
            for (row, slot) in selected.iter_mut().enumerate() {
                if !*slot {
                    continue; // already filtered out by an earlier clause
                }
                *slot = clause.eval_truth(chunk, row)? == Some(true);
            }
        }

        Ok(())
    }
}

// ---

#[cfg(test)]
mod tests {
    use qv_chunk::{Chunk, Datum, DatumKind, Schema};

    use crate::{CnfFilter, Expr, ExprError};

    fn test_chunk() -> Chunk {
        let mut chunk = Chunk::new(
            Schema::new(vec![DatumKind::Int64, DatumKind::Str]),
            8,
        );
        for (int, text) in [
            (Some(1), "x"),
            (Some(2), "y"),
            (Some(2), "z"),
            (Some(3), "w"),
            (None, "v"),
        ] {
            chunk
                .append_row(&[
                    int.map_or(Datum::Null, Datum::Int64),
                    Datum::Str(text.to_owned()),
                ])
                .unwrap();
        }
        chunk
    }

    #[test]
    fn ne_filters_nulls_out() {
        let chunk = test_chunk();
        let filter = CnfFilter::new(vec![Expr::col(0).ne(Expr::lit(2i64))]);

        let mut selected = Vec::new();
        filter.eval_selected(&chunk, &mut selected).unwrap();

        // NULL != 2 is UNKNOWN, which does not select.
        assert_eq!(selected, vec![true, false, false, true, false]);
    }

    #[test]
    fn conjunction_narrows() {
        let chunk = test_chunk();
        let filter = CnfFilter::new(vec![
            Expr::col(0).gt(Expr::lit(1i64)),
            Expr::col(1).ne(Expr::lit("z")),
        ]);

        let mut selected = Vec::new();
        filter.eval_selected(&chunk, &mut selected).unwrap();

        assert_eq!(selected, vec![false, true, false, true, false]);
    }

    #[test]
    fn empty_conjunction_accepts_everything() {
        let chunk = test_chunk();
        let filter = CnfFilter::new(Vec::new());

        let mut selected = vec![false; 64]; // stale contents must not leak through
        filter.eval_selected(&chunk, &mut selected).unwrap();

        assert_eq!(selected, vec![true; 5]);
    }

    #[test]
    fn is_null_and_not() {
        let chunk = test_chunk();
        let filter = CnfFilter::new(vec![Expr::col(0).is_null()]);

        let mut selected = Vec::new();
        filter.eval_selected(&chunk, &mut selected).unwrap();
        assert_eq!(selected, vec![false, false, false, false, true]);

        let filter = CnfFilter::new(vec![Expr::col(0).is_null().not()]);
        filter.eval_selected(&chunk, &mut selected).unwrap();
        assert_eq!(selected, vec![true, true, true, true, false]);
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let chunk = test_chunk();
        let filter = CnfFilter::new(vec![Expr::col(0).eq(Expr::lit("oops"))]);

        let mut selected = Vec::new();
        assert!(matches!(
            filter.eval_selected(&chunk, &mut selected),
            Err(ExprError::TypeMismatch { .. })
        ));
    }
}
