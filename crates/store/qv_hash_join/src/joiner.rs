use qv_chunk::{Chunk, RowRef};

use crate::{JoinError, JoinResult};

// ---

/// The join flavors the operator executes.
///
/// `RightOuter` exists so planners can name it, but the operator itself only
/// runs left-flavored plans: a right outer join is a left outer join with the
/// inputs swapped, and the swap is the planner's job. Constructing the
/// operator with `RightOuter` is rejected at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    LeftSemi,
    LeftAnti,
}

impl JoinType {
    /// Does the output row layout carry the build side's columns?
    #[inline]
    pub fn emits_build_columns(&self) -> bool {
        match self {
            Self::Inner | Self::LeftOuter | Self::RightOuter => true,
            Self::LeftSemi | Self::LeftAnti => false,
        }
    }
}

/// Per-worker row-emission strategy: everything that differs between join
/// types lives behind these two hooks.
///
/// Each worker owns its own joiner, so implementations are free to keep
/// scratch state without locking.
pub trait Joiner: Send {
    /// Emit whatever the join type requires for a probe row with no match:
    /// nothing (inner/semi), the probe row padded with NULLs (left outer), or
    /// the probe row as-is (anti).
    fn on_miss_match(&mut self, probe_row: RowRef<'_>, out: &mut Chunk) -> JoinResult<()>;

    /// Emit output rows for a probe row against its matching build rows.
    ///
    /// May consume any prefix of `build_rows` and append any number of rows;
    /// implementations stop early when `out` fills up, and the caller hands
    /// the iterator back after rotating `out`. Returns whether at least one
    /// match was consumed.
    fn try_match_build_rows<'a>(
        &mut self,
        probe_row: RowRef<'_>,
        build_rows: &mut dyn Iterator<Item = RowRef<'a>>,
        out: &mut Chunk,
    ) -> JoinResult<bool>;
}

/// Builds the joiner for `join_type`.
pub(crate) fn make_joiner(join_type: JoinType) -> JoinResult<Box<dyn Joiner>> {
    match join_type {
        JoinType::Inner => Ok(Box::new(InnerJoiner)),
        JoinType::LeftOuter => Ok(Box::new(LeftOuterJoiner)),
        JoinType::LeftSemi => Ok(Box::new(SemiJoiner)),
        JoinType::LeftAnti => Ok(Box::new(AntiJoiner)),
        JoinType::RightOuter => Err(JoinError::UnsupportedJoinType(join_type)),
    }
}

// ---

/// Inner join: the Cartesian product of the probe row and its matches.
struct InnerJoiner;

impl Joiner for InnerJoiner {
    fn on_miss_match(&mut self, _probe_row: RowRef<'_>, _out: &mut Chunk) -> JoinResult<()> {
        Ok(())
    }

    fn try_match_build_rows<'a>(
        &mut self,
        probe_row: RowRef<'_>,
        build_rows: &mut dyn Iterator<Item = RowRef<'a>>,
        out: &mut Chunk,
    ) -> JoinResult<bool> {
        let mut matched = false;
        while !out.is_full() {
            let Some(build_row) = build_rows.next() else {
                break;
            };
            out.append_concat_row(probe_row, build_row)
                .map_err(JoinError::Joiner)?;
            matched = true;
        }
        Ok(matched)
    }
}

/// Left outer join: like inner, but unmatched probe rows surface once,
/// padded with NULLs on the build side.
struct LeftOuterJoiner;

impl Joiner for LeftOuterJoiner {
    fn on_miss_match(&mut self, probe_row: RowRef<'_>, out: &mut Chunk) -> JoinResult<()> {
        out.append_padded_row(probe_row).map_err(JoinError::Joiner)
    }

    fn try_match_build_rows<'a>(
        &mut self,
        probe_row: RowRef<'_>,
        build_rows: &mut dyn Iterator<Item = RowRef<'a>>,
        out: &mut Chunk,
    ) -> JoinResult<bool> {
        let mut matched = false;
        while !out.is_full() {
            let Some(build_row) = build_rows.next() else {
                break;
            };
            out.append_concat_row(probe_row, build_row)
                .map_err(JoinError::Joiner)?;
            matched = true;
        }
        Ok(matched)
    }
}

/// Left semi join: the probe row itself, once, iff it has any match.
struct SemiJoiner;

impl Joiner for SemiJoiner {
    fn on_miss_match(&mut self, _probe_row: RowRef<'_>, _out: &mut Chunk) -> JoinResult<()> {
        Ok(())
    }

    fn try_match_build_rows<'a>(
        &mut self,
        probe_row: RowRef<'_>,
        build_rows: &mut dyn Iterator<Item = RowRef<'a>>,
        out: &mut Chunk,
    ) -> JoinResult<bool> {
        if build_rows.next().is_none() {
            return Ok(false);
        }
        out.append_row_from(probe_row).map_err(JoinError::Joiner)?;
        // One emission per probe row: drain the remaining candidates so the
        // caller sees the iterator as done.
        for _ in build_rows {}
        Ok(true)
    }
}

/// Left anti-semi join: the probe row itself, once, iff it has no match.
///
/// The emission happens in [`Joiner::on_miss_match`]; a match only suppresses
/// it.
struct AntiJoiner;

impl Joiner for AntiJoiner {
    fn on_miss_match(&mut self, probe_row: RowRef<'_>, out: &mut Chunk) -> JoinResult<()> {
        out.append_row_from(probe_row).map_err(JoinError::Joiner)
    }

    fn try_match_build_rows<'a>(
        &mut self,
        _probe_row: RowRef<'_>,
        build_rows: &mut dyn Iterator<Item = RowRef<'a>>,
        _out: &mut Chunk,
    ) -> JoinResult<bool> {
        if build_rows.next().is_none() {
            return Ok(false);
        }
        for _ in build_rows {}
        Ok(true)
    }
}

// ---
