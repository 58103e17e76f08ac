use std::fmt;

// ---

/// A fixed-point decimal value: `mantissa * 10^-scale`.
///
/// Always kept in normalized form (no trailing fractional zeros), so that
/// values that compare equal are bitwise identical. This is what makes it safe
/// to feed decimals straight into key fingerprinting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

impl Decimal {
    #[inline]
    pub fn new(mantissa: i128, scale: u8) -> Self {
        Self { mantissa, scale }.normalized()
    }

    #[inline]
    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    #[inline]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    fn normalized(mut self) -> Self {
        if self.mantissa == 0 {
            self.scale = 0;
            return self;
        }
        while self.scale > 0 && self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale -= 1;
        }
        self
    }
}

impl From<i64> for Decimal {
    #[inline]
    fn from(value: i64) -> Self {
        Self::new(value as i128, 0)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return self.mantissa.fmt(f);
        }

        let sign = if self.mantissa < 0 { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int}.{frac}")
        } else {
            write!(f, "{sign}0.{digits:0>scale$}")
        }
    }
}

// ---

/// The type of a [`crate::Column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatumKind {
    Int64,
    UInt64,
    Float64,
    Decimal,
    Str,
    /// Microseconds since the unix epoch.
    Timestamp,
}

impl fmt::Display for DatumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int64 => "i64",
            Self::UInt64 => "u64",
            Self::Float64 => "f64",
            Self::Decimal => "decimal",
            Self::Str => "str",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

// ---

/// An owned scalar value, i.e. one cell of a [`crate::Chunk`].
///
/// `Datum` is the slow path: it is how rows enter and leave the columnar world
/// (appends, tests, debug output). Hot paths compare and hash cells directly
/// through [`crate::Column`] without materializing one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Decimal(Decimal),
    Str(String),
    /// Microseconds since the unix epoch.
    Timestamp(i64),
}

impl Datum {
    /// The kind of this datum, or `None` for `Null` (nulls are untyped -- the
    /// column they live in carries the type).
    #[inline]
    pub fn kind(&self) -> Option<DatumKind> {
        match self {
            Self::Null => None,
            Self::Int64(_) => Some(DatumKind::Int64),
            Self::UInt64(_) => Some(DatumKind::UInt64),
            Self::Float64(_) => Some(DatumKind::Float64),
            Self::Decimal(_) => Some(DatumKind::Decimal),
            Self::Str(_) => Some(DatumKind::Str),
            Self::Timestamp(_) => Some(DatumKind::Timestamp),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// SQL equality: `NULL` equals nothing (not even `NULL`), and integers
    /// compare by numeric value across signedness.
    pub fn sql_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => false,

            (Self::Int64(lhs), Self::Int64(rhs))
            | (Self::Timestamp(lhs), Self::Timestamp(rhs)) => lhs == rhs,
            (Self::UInt64(lhs), Self::UInt64(rhs)) => lhs == rhs,
            (Self::Int64(lhs), Self::UInt64(rhs)) => *lhs as i128 == *rhs as i128,
            (Self::UInt64(lhs), Self::Int64(rhs)) => *lhs as i128 == *rhs as i128,

            (Self::Float64(lhs), Self::Float64(rhs)) => lhs == rhs,
            (Self::Decimal(lhs), Self::Decimal(rhs)) => lhs == rhs,
            (Self::Str(lhs), Self::Str(rhs)) => lhs == rhs,

            _ => false,
        }
    }
}

impl From<i64> for Datum {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u64> for Datum {
    #[inline]
    fn from(value: u64) -> Self {
        Self::UInt64(value)
    }
}

impl From<f64> for Datum {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<Decimal> for Datum {
    #[inline]
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for Datum {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Datum {
    #[inline]
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int64(value) => value.fmt(f),
            Self::UInt64(value) => value.fmt(f),
            Self::Float64(value) => value.fmt(f),
            Self::Decimal(value) => value.fmt(f),
            Self::Str(value) => write!(f, "{value:?}"),
            Self::Timestamp(value) => write!(f, "{value}us"),
        }
    }
}

// ---

/// The ordered column types of a [`crate::Chunk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema(Vec<DatumKind>);

impl Schema {
    #[inline]
    pub fn new(kinds: impl Into<Vec<DatumKind>>) -> Self {
        Self(kinds.into())
    }

    #[inline]
    pub fn kinds(&self) -> &[DatumKind] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The schema of rows made of a row of `self` followed by a row of `other`.
    #[inline]
    pub fn concat(&self, other: &Self) -> Self {
        Self(self.0.iter().chain(other.0.iter()).copied().collect())
    }
}

impl std::ops::Index<usize> for Schema {
    type Output = DatumKind;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

// ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_normalization() {
        assert_eq!(Decimal::new(1230, 2), Decimal::new(123, 1));
        assert_eq!(Decimal::new(1230, 2).to_string(), "12.3");
        assert_eq!(Decimal::new(0, 7), Decimal::new(0, 0));
        assert_eq!(Decimal::new(-500, 2), Decimal::new(-5, 0));
        assert_eq!(Decimal::new(5, 3).to_string(), "0.005");
    }

    #[test]
    fn sql_equality() {
        assert!(Datum::Int64(42).sql_eq(&Datum::UInt64(42)));
        assert!(Datum::UInt64(42).sql_eq(&Datum::Int64(42)));
        assert!(!Datum::Int64(-1).sql_eq(&Datum::UInt64(u64::MAX)));

        assert!(!Datum::Null.sql_eq(&Datum::Null));
        assert!(!Datum::Null.sql_eq(&Datum::Int64(0)));

        assert!(Datum::Float64(0.0).sql_eq(&Datum::Float64(-0.0)));
        assert!(!Datum::Float64(f64::NAN).sql_eq(&Datum::Float64(f64::NAN)));
    }
}
