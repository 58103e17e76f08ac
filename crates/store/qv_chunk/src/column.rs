use crate::{ChunkError, ChunkResult, Datum, DatumKind, Decimal};

// ---

// Tags prepended to the canonical byte encoding of a cell, so that values of
// different kinds never alias in a fingerprint.
const KEY_TAG_INT: u8 = 1;
const KEY_TAG_FLOAT: u8 = 2;
const KEY_TAG_DECIMAL: u8 = 3;
const KEY_TAG_STR: u8 = 4;
const KEY_TAG_TIMESTAMP: u8 = 5;

/// Dense storage for the cells of one column.
///
/// Strings are stored arrow-style: one contiguous byte buffer plus offsets.
#[derive(Debug, Clone, PartialEq)]
enum ColumnData {
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float64(Vec<f64>),
    Decimal(Vec<Decimal>),
    Str { offsets: Vec<u32>, bytes: Vec<u8> },
    Timestamp(Vec<i64>),
}

impl ColumnData {
    fn with_capacity(kind: DatumKind, capacity: usize) -> Self {
        match kind {
            DatumKind::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            DatumKind::UInt64 => Self::UInt64(Vec::with_capacity(capacity)),
            DatumKind::Float64 => Self::Float64(Vec::with_capacity(capacity)),
            DatumKind::Decimal => Self::Decimal(Vec::with_capacity(capacity)),
            DatumKind::Str => Self::Str {
                offsets: {
                    let mut offsets = Vec::with_capacity(capacity + 1);
                    offsets.push(0);
                    offsets
                },
                bytes: Vec::new(),
            },
            DatumKind::Timestamp => Self::Timestamp(Vec::with_capacity(capacity)),
        }
    }
}

/// One column of a [`crate::Chunk`]: a [`DatumKind`], dense value storage and
/// a validity bitmap.
///
/// All mutation goes through the row-oriented methods on [`crate::Chunk`],
/// which keep every column of a chunk at the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    kind: DatumKind,
    data: ColumnData,
    /// `true` iff the cell holds a value. Same length as the value storage.
    validity: Vec<bool>,
}

impl Column {
    pub fn with_capacity(kind: DatumKind, capacity: usize) -> Self {
        Self {
            kind,
            data: ColumnData::with_capacity(kind, capacity),
            validity: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn kind(&self) -> DatumKind {
        self.kind
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.validity.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    #[inline]
    pub fn is_null(&self, row: usize) -> bool {
        !self.validity[row]
    }

    /// Zero cells, retain buffers.
    pub(crate) fn clear(&mut self) {
        self.validity.clear();
        match &mut self.data {
            ColumnData::Int64(values) | ColumnData::Timestamp(values) => values.clear(),
            ColumnData::UInt64(values) => values.clear(),
            ColumnData::Float64(values) => values.clear(),
            ColumnData::Decimal(values) => values.clear(),
            ColumnData::Str { offsets, bytes } => {
                offsets.truncate(1);
                bytes.clear();
            }
        }
    }

    // --- Writes ---

    pub(crate) fn push_null(&mut self) {
        self.validity.push(false);
        match &mut self.data {
            ColumnData::Int64(values) | ColumnData::Timestamp(values) => values.push(0),
            ColumnData::UInt64(values) => values.push(0),
            ColumnData::Float64(values) => values.push(0.0),
            ColumnData::Decimal(values) => values.push(Decimal::new(0, 0)),
            ColumnData::Str { offsets, .. } => offsets.push(*offsets.last().unwrap_or(&0)),
        }
    }

    pub(crate) fn push_datum(&mut self, datum: &Datum) -> ChunkResult<()> {
        let type_mismatch = || ChunkError::TypeMismatch {
            expected: self.kind,
            got: datum
                .kind()
                .map_or_else(|| "NULL".to_owned(), |kind| kind.to_string()),
        };

        match (&mut self.data, datum) {
            (_, Datum::Null) => {
                self.push_null();
                return Ok(());
            }

            (ColumnData::Int64(values), Datum::Int64(value))
            | (ColumnData::Timestamp(values), Datum::Timestamp(value)) => values.push(*value),
            (ColumnData::UInt64(values), Datum::UInt64(value)) => values.push(*value),
            (ColumnData::Float64(values), Datum::Float64(value)) => values.push(*value),
            (ColumnData::Decimal(values), Datum::Decimal(value)) => values.push(*value),
            (ColumnData::Str { offsets, bytes }, Datum::Str(value)) => {
                bytes.extend_from_slice(value.as_bytes());
                offsets.push(bytes.len() as u32);
            }

            _ => return Err(type_mismatch()),
        }

        self.validity.push(true);
        Ok(())
    }

    /// Copies one cell over from another column of the same kind.
    pub(crate) fn push_from(&mut self, other: &Self, row: usize) -> ChunkResult<()> {
        if self.kind != other.kind {
            return Err(ChunkError::SchemaMismatch);
        }

        if other.is_null(row) {
            self.push_null();
            return Ok(());
        }

        match (&mut self.data, &other.data) {
            (ColumnData::Int64(dst), ColumnData::Int64(src))
            | (ColumnData::Timestamp(dst), ColumnData::Timestamp(src)) => dst.push(src[row]),
            (ColumnData::UInt64(dst), ColumnData::UInt64(src)) => dst.push(src[row]),
            (ColumnData::Float64(dst), ColumnData::Float64(src)) => dst.push(src[row]),
            (ColumnData::Decimal(dst), ColumnData::Decimal(src)) => dst.push(src[row]),
            (
                ColumnData::Str { offsets, bytes },
                ColumnData::Str {
                    offsets: src_offsets,
                    bytes: src_bytes,
                },
            ) => {
                let start = src_offsets[row] as usize;
                let end = src_offsets[row + 1] as usize;
                bytes.extend_from_slice(&src_bytes[start..end]);
                offsets.push(bytes.len() as u32);
            }

            _ => return Err(ChunkError::SchemaMismatch),
        }

        self.validity.push(true);
        Ok(())
    }

    // --- Reads ---

    #[inline]
    pub fn i64_at(&self, row: usize) -> Option<i64> {
        match &self.data {
            ColumnData::Int64(values) if self.validity[row] => Some(values[row]),
            _ => None,
        }
    }

    #[inline]
    pub fn u64_at(&self, row: usize) -> Option<u64> {
        match &self.data {
            ColumnData::UInt64(values) if self.validity[row] => Some(values[row]),
            _ => None,
        }
    }

    #[inline]
    pub fn f64_at(&self, row: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Float64(values) if self.validity[row] => Some(values[row]),
            _ => None,
        }
    }

    #[inline]
    pub fn str_at(&self, row: usize) -> Option<&str> {
        match &self.data {
            ColumnData::Str { offsets, bytes } if self.validity[row] => {
                let start = offsets[row] as usize;
                let end = offsets[row + 1] as usize;
                // The buffer is only ever extended with `str::as_bytes`.
                std::str::from_utf8(&bytes[start..end]).ok()
            }
            _ => None,
        }
    }

    /// Materializes one cell as an owned [`Datum`]. Allocates for strings;
    /// meant for row ingress/egress and tests, not for per-cell hot loops.
    pub fn datum_at(&self, row: usize) -> Datum {
        if self.is_null(row) {
            return Datum::Null;
        }
        match &self.data {
            ColumnData::Int64(values) => Datum::Int64(values[row]),
            ColumnData::UInt64(values) => Datum::UInt64(values[row]),
            ColumnData::Float64(values) => Datum::Float64(values[row]),
            ColumnData::Decimal(values) => Datum::Decimal(values[row]),
            ColumnData::Str { .. } => {
                Datum::Str(self.str_at(row).unwrap_or_default().to_owned())
            }
            ColumnData::Timestamp(values) => Datum::Timestamp(values[row]),
        }
    }

    // --- Key semantics ---

    /// SQL equality of two cells, without materializing them.
    ///
    /// `NULL` equals nothing; signed and unsigned integer columns compare by
    /// numeric value.
    pub fn sql_eq_cell(&self, row: usize, other: &Self, other_row: usize) -> bool {
        if self.is_null(row) || other.is_null(other_row) {
            return false;
        }

        match (&self.data, &other.data) {
            (ColumnData::Int64(lhs), ColumnData::Int64(rhs))
            | (ColumnData::Timestamp(lhs), ColumnData::Timestamp(rhs)) => {
                lhs[row] == rhs[other_row]
            }
            (ColumnData::UInt64(lhs), ColumnData::UInt64(rhs)) => lhs[row] == rhs[other_row],
            (ColumnData::Int64(lhs), ColumnData::UInt64(rhs)) => {
                lhs[row] as i128 == rhs[other_row] as i128
            }
            (ColumnData::UInt64(lhs), ColumnData::Int64(rhs)) => {
                lhs[row] as i128 == rhs[other_row] as i128
            }

            (ColumnData::Float64(lhs), ColumnData::Float64(rhs)) => lhs[row] == rhs[other_row],
            (ColumnData::Decimal(lhs), ColumnData::Decimal(rhs)) => lhs[row] == rhs[other_row],
            (
                ColumnData::Str {
                    offsets: lhs_offsets,
                    bytes: lhs_bytes,
                },
                ColumnData::Str {
                    offsets: rhs_offsets,
                    bytes: rhs_bytes,
                },
            ) => {
                let lhs = &lhs_bytes[lhs_offsets[row] as usize..lhs_offsets[row + 1] as usize];
                let rhs =
                    &rhs_bytes[rhs_offsets[other_row] as usize..rhs_offsets[other_row + 1] as usize];
                lhs == rhs
            }

            _ => false,
        }
    }

    /// Appends the canonical byte encoding of one cell to `buf`, for key
    /// fingerprinting. Returns `false` (and writes nothing) for a null cell.
    ///
    /// The encoding is chosen so that cells that are [`Self::sql_eq_cell`]
    /// produce identical bytes: signed and unsigned integers widen to `i128`,
    /// `-0.0` is folded onto `0.0`, decimals are already normalized.
    pub fn write_key_bytes(&self, row: usize, buf: &mut Vec<u8>) -> bool {
        if self.is_null(row) {
            return false;
        }

        match &self.data {
            ColumnData::Int64(values) => {
                buf.push(KEY_TAG_INT);
                buf.extend_from_slice(&(values[row] as i128).to_le_bytes());
            }
            ColumnData::UInt64(values) => {
                buf.push(KEY_TAG_INT);
                buf.extend_from_slice(&(values[row] as i128).to_le_bytes());
            }
            ColumnData::Float64(values) => {
                let value = if values[row] == 0.0 { 0.0 } else { values[row] };
                buf.push(KEY_TAG_FLOAT);
                buf.extend_from_slice(&value.to_bits().to_le_bytes());
            }
            ColumnData::Decimal(values) => {
                buf.push(KEY_TAG_DECIMAL);
                buf.extend_from_slice(&values[row].mantissa().to_le_bytes());
                buf.push(values[row].scale());
            }
            ColumnData::Str { offsets, bytes } => {
                buf.push(KEY_TAG_STR);
                buf.extend_from_slice(&bytes[offsets[row] as usize..offsets[row + 1] as usize]);
            }
            ColumnData::Timestamp(values) => {
                buf.push(KEY_TAG_TIMESTAMP);
                buf.extend_from_slice(&values[row].to_le_bytes());
            }
        }

        true
    }
}

// ---
