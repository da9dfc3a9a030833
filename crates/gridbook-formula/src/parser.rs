use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use gridbook_core::Address;

use crate::FormulaError;

static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z]+[0-9]+):([A-Z]+[0-9]+)").expect("range regex"));

// The digit suffix keeps function names (SUM, AVERAGE, COUNT) from matching.
static CELL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]+)([0-9]+)").expect("cell regex"));

/// True iff the trimmed input starts with `=`.
pub fn is_formula(value: &str) -> bool {
    value.trim().starts_with('=')
}

/// Reject formulas with no body or unbalanced parentheses. Reference
/// resolution happens later; this is purely lexical.
pub fn validate(formula: &str) -> Result<(), FormulaError> {
    let trimmed = formula.trim();
    let body = trimmed
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("formula must start with '='".into()))?
        .trim();

    if body.is_empty() {
        return Err(FormulaError::Parse("empty formula".into()));
    }

    let mut balance: i32 = 0;
    for c in body.chars() {
        match c {
            '(' => balance += 1,
            ')' => balance -= 1,
            _ => {}
        }
        if balance < 0 {
            return Err(FormulaError::Parse("unbalanced parentheses".into()));
        }
    }

    if balance != 0 {
        return Err(FormulaError::Parse("unbalanced parentheses".into()));
    }

    Ok(())
}

/// Every cell address the formula body references, with ranges expanded to
/// their full rectangular cover. Non-formulas reference nothing.
pub fn extract_refs(formula: &str) -> Result<HashSet<Address>, FormulaError> {
    let mut refs = HashSet::new();

    let trimmed = formula.trim();
    let body = match trimmed.strip_prefix('=') {
        Some(body) => body.trim(),
        None => return Ok(refs),
    };

    for caps in RANGE_RE.captures_iter(body) {
        refs.extend(expand_range(&caps[1], &caps[2])?);
    }

    // Range endpoints also match here; the set deduplicates them.
    for caps in CELL_RE.captures_iter(body) {
        match Address::from_a1(&caps[0]) {
            Ok(addr) => {
                refs.insert(addr);
            }
            Err(_) => {
                tracing::warn!("ignoring invalid cell reference: {}", &caps[0]);
            }
        }
    }

    Ok(refs)
}

/// Expand `A1:B3` into every covered address. Endpoints may come in either
/// order; `A3:A1` covers the same cells as `A1:A3`.
fn expand_range(start: &str, end: &str) -> Result<Vec<Address>, FormulaError> {
    let (start, end) = match (Address::from_a1(start), Address::from_a1(end)) {
        (Ok(s), Ok(e)) => (s, e),
        _ => {
            return Err(FormulaError::Ref(format!("invalid range: {start}:{end}")));
        }
    };

    let (row_lo, row_hi) = (start.row.min(end.row), start.row.max(end.row));
    let (col_lo, col_hi) = (start.col.min(end.col), start.col.max(end.col));

    let mut cells =
        Vec::with_capacity(((row_hi - row_lo + 1) * (col_hi - col_lo + 1)) as usize);
    for row in row_lo..=row_hi {
        for col in col_lo..=col_hi {
            cells.push(Address::new(row, col));
        }
    }

    Ok(cells)
}
