use std::fmt;

use serde::{Deserialize, Serialize};

/// How a cell's raw input is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CellKind {
    Text,
    Number,
    Formula,
    Boolean,
    Error,
}

impl CellKind {
    /// Classify a trimmed, non-empty user input. `=`-prefixed input is a
    /// formula; otherwise numbers, then booleans, then text.
    pub fn classify(value: &str) -> CellKind {
        if value.starts_with('=') {
            CellKind::Formula
        } else if value.parse::<f64>().is_ok() {
            CellKind::Number
        } else if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
            CellKind::Boolean
        } else {
            CellKind::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::Text => "TEXT",
            CellKind::Number => "NUMBER",
            CellKind::Formula => "FORMULA",
            CellKind::Boolean => "BOOLEAN",
            CellKind::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<CellKind> {
        match s {
            "TEXT" => Some(CellKind::Text),
            "NUMBER" => Some(CellKind::Number),
            "FORMULA" => Some(CellKind::Formula),
            "BOOLEAN" => Some(CellKind::Boolean),
            "ERROR" => Some(CellKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
