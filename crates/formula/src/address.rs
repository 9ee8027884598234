//! A1-style addressing: column letters, cells, single-column ranges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FormulaError;

/// `0 -> "A"`, `25 -> "Z"`, `26 -> "AA"`.
pub fn column_letters(column: u32) -> String {
    let mut n = column + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Inverse of [`column_letters`]; case-insensitive.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut n: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(n - 1)
}

// ── CellAddr ────────────────────────────────────────────────────────

/// Zero-based column, one-based row. Orders row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddr {
    pub row: u32,
    pub column: u32,
}

impl CellAddr {
    pub fn new(column: u32, row: u32) -> Self {
        Self { row, column }
    }

    /// Parse `"B3"` (dollar signs are tolerated and ignored).
    pub fn parse(s: &str) -> Result<Self, FormulaError> {
        let cleaned: String = s.chars().filter(|c| *c != '$').collect();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| FormulaError::InvalidReference(s.to_string()))?;
        let (letters, digits) = cleaned.split_at(split);
        let column =
            column_index(letters).ok_or_else(|| FormulaError::InvalidReference(s.to_string()))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| FormulaError::InvalidReference(s.to_string()))?;
        if row == 0 {
            return Err(FormulaError::InvalidReference(s.to_string()));
        }
        Ok(Self { row, column })
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.column), self.row)
    }
}

impl FromStr for CellAddr {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CellAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CellAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ── References inside formulas ──────────────────────────────────────

/// A single-cell reference, optionally sheet-qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRef {
    pub sheet: Option<String>,
    pub addr: CellAddr,
    /// Rendered with `$` on both column and row.
    pub absolute: bool,
}

impl CellRef {
    pub fn local(addr: CellAddr) -> Self {
        Self {
            sheet: None,
            addr,
            absolute: false,
        }
    }

    pub fn on(sheet: impl Into<String>, addr: CellAddr) -> Self {
        Self {
            sheet: Some(sheet.into()),
            addr,
            absolute: true,
        }
    }

    pub fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }
}

/// A range within one column: whole column (`$D:$D`) or bounded
/// (`$N$2:$N$9`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub column: u32,
    /// Inclusive row bounds; `None` is the whole column.
    pub rows: Option<(u32, u32)>,
}

impl RangeRef {
    pub fn whole_column(sheet: impl Into<String>, column: u32) -> Self {
        Self {
            sheet: Some(sheet.into()),
            column,
            rows: None,
        }
    }

    pub fn bounded(sheet: impl Into<String>, column: u32, first: u32, last: u32) -> Self {
        Self {
            sheet: Some(sheet.into()),
            column,
            rows: Some((first, last)),
        }
    }

    pub fn first_row(&self) -> u32 {
        self.rows.map(|(first, _)| first).unwrap_or(1)
    }
}
