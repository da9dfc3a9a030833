use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]+)([1-9][0-9]*)$").expect("address regex"));

/// The string did not name a cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cell address: {0}")]
pub struct AddressError(pub String);

/// A cell position within a sheet. Rows are 1-based, columns 0-based
/// (column 0 renders as `A`).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub row: u32,
    pub col: u32,
}

impl Address {
    pub const fn new(row: u32, col: u32) -> Self {
        Address { row, col }
    }

    /// Parse A1 notation, case-insensitively (`"aa10"` -> row 10, col 26).
    pub fn from_a1(notation: &str) -> Result<Self, AddressError> {
        let upper = notation.trim().to_ascii_uppercase();
        let caps = ADDRESS_RE
            .captures(&upper)
            .ok_or_else(|| AddressError(notation.to_string()))?;

        let col = column_index(&caps[1]).ok_or_else(|| AddressError(notation.to_string()))?;
        let row: u32 = caps[2]
            .parse()
            .map_err(|_| AddressError(notation.to_string()))?;

        Ok(Address { row, col })
    }

    /// Render as upper-case A1 notation.
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_label(self.col), self.row)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_a1(s)
    }
}

/// Column index to letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_label(col: u32) -> String {
    let mut label = String::new();
    let mut n = col + 1;

    while n > 0 {
        n -= 1;
        label.insert(0, char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }

    label
}

/// Column letters to index: A -> 0, Z -> 25, AA -> 26. `None` for anything
/// that is not a run of ASCII letters.
pub fn column_index(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }

    let mut col: u32 = 0;
    for c in label.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }

    Some(col - 1)
}
