use std::fmt;

use serde::{Deserialize, Serialize};

/// The user-visible formula error vocabulary. Each kind renders as the
/// spreadsheet error symbol stored in a cell's computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// #DIV/0! - division produced an infinity
    DivZero,
    /// #REF! - a reference or range could not be resolved
    RefError,
    /// #CYCLE! - the formula would create a circular dependency
    CycleError,
    /// #VALUE! - a referenced cell holds an error value
    ValueError,
    /// #NAME? - unrecognized function or name
    NameError,
    /// #ERROR! - the formula could not be parsed
    ParseError,
    /// #NUM! - the result is not a representable number
    NumError,
}

impl ErrorKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            ErrorKind::DivZero => "#DIV/0!",
            ErrorKind::RefError => "#REF!",
            ErrorKind::CycleError => "#CYCLE!",
            ErrorKind::ValueError => "#VALUE!",
            ErrorKind::NameError => "#NAME?",
            ErrorKind::ParseError => "#ERROR!",
            ErrorKind::NumError => "#NUM!",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::DivZero => "Division by zero",
            ErrorKind::RefError => "Invalid cell reference",
            ErrorKind::CycleError => "Circular dependency detected",
            ErrorKind::ValueError => "Invalid value type",
            ErrorKind::NameError => "Unrecognized formula or function",
            ErrorKind::ParseError => "Formula parsing error",
            ErrorKind::NumError => "Invalid numeric value",
        }
    }

    /// True if a computed value carries an error symbol.
    pub fn is_error_value(value: &str) -> bool {
        value.starts_with('#')
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols() {
        assert_eq!(ErrorKind::DivZero.to_string(), "#DIV/0!");
        assert_eq!(ErrorKind::CycleError.to_string(), "#CYCLE!");
        assert_eq!(ErrorKind::NameError.to_string(), "#NAME?");
    }

    #[test]
    fn test_error_value_detection() {
        assert!(ErrorKind::is_error_value("#VALUE!"));
        assert!(!ErrorKind::is_error_value("42"));
        assert!(!ErrorKind::is_error_value("hello"));
    }
}
