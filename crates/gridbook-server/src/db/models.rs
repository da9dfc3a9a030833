use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridbook_core::{Address, CellKind};

/// Workbook database model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkbookRecord {
    pub id: i64,
    pub name: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sheet database model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SheetRecord {
    pub id: i64,
    pub workbook_id: i64,
    pub name: String,
    pub row_count: i64,
    pub column_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A materialized cell. Only cells with a non-empty raw value have rows;
/// `version` starts at 1 and moves by exactly 1 per committed mutation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CellRecord {
    pub id: i64,
    pub sheet_id: i64,
    pub row_index: i64,
    pub column_index: i64,
    pub cell_type: String,
    pub raw_value: String,
    pub computed_value: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl CellRecord {
    /// A1 address of this cell within its sheet.
    pub fn address(&self) -> Address {
        Address::new(self.row_index as u32, self.column_index as u32)
    }

    pub fn kind(&self) -> CellKind {
        CellKind::parse(&self.cell_type).unwrap_or(CellKind::Error)
    }
}
