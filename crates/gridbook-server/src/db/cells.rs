use chrono::Utc;
use sqlx::Sqlite;

use gridbook_core::CellKind;

use super::models::CellRecord;
use crate::error::AppError;

const CELL_COLUMNS: &str =
    "id, sheet_id, row_index, column_index, cell_type, raw_value, computed_value, version, updated_at";

/// A cell write about to be persisted. The stored version is managed by
/// `upsert`, not by the caller.
#[derive(Debug)]
pub struct CellWrite<'a> {
    pub sheet_id: i64,
    pub row_index: i64,
    pub column_index: i64,
    pub kind: CellKind,
    pub raw_value: &'a str,
    pub computed_value: &'a str,
}

/// Point lookup on the logical key.
pub async fn get<'e, E>(
    executor: E,
    sheet_id: i64,
    row_index: i64,
    column_index: i64,
) -> Result<Option<CellRecord>, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let cell = sqlx::query_as::<_, CellRecord>(&format!(
        "SELECT {CELL_COLUMNS} FROM cells
         WHERE sheet_id = ? AND row_index = ? AND column_index = ?"
    ))
    .bind(sheet_id)
    .bind(row_index)
    .bind(column_index)
    .fetch_optional(executor)
    .await?;

    Ok(cell)
}

/// All materialized cells of a sheet. Runs on every formula edit to build
/// the dependency graph and the values map.
pub async fn list<'e, E>(executor: E, sheet_id: i64) -> Result<Vec<CellRecord>, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let cells = sqlx::query_as::<_, CellRecord>(&format!(
        "SELECT {CELL_COLUMNS} FROM cells
         WHERE sheet_id = ? ORDER BY row_index, column_index"
    ))
    .bind(sheet_id)
    .fetch_all(executor)
    .await?;

    Ok(cells)
}

/// Only the formula cells of a sheet.
pub async fn list_formulas<'e, E>(executor: E, sheet_id: i64) -> Result<Vec<CellRecord>, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let cells = sqlx::query_as::<_, CellRecord>(&format!(
        "SELECT {CELL_COLUMNS} FROM cells
         WHERE sheet_id = ? AND cell_type = 'FORMULA' ORDER BY row_index, column_index"
    ))
    .bind(sheet_id)
    .fetch_all(executor)
    .await?;

    Ok(cells)
}

/// Create or overwrite a cell. With `expected_version` the write only lands
/// if the stored version still matches (the row advances by 1); without it
/// the cell must not exist yet and materializes at version 1. Either guard
/// failing is a version conflict.
pub async fn upsert<'e, E>(
    executor: E,
    cell: &CellWrite<'_>,
    expected_version: Option<i64>,
) -> Result<CellRecord, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    match expected_version {
        Some(version) => {
            let updated = sqlx::query_as::<_, CellRecord>(&format!(
                "UPDATE cells
                 SET cell_type = ?, raw_value = ?, computed_value = ?,
                     version = version + 1, updated_at = ?
                 WHERE sheet_id = ? AND row_index = ? AND column_index = ? AND version = ?
                 RETURNING {CELL_COLUMNS}"
            ))
            .bind(cell.kind.as_str())
            .bind(cell.raw_value)
            .bind(cell.computed_value)
            .bind(Utc::now())
            .bind(cell.sheet_id)
            .bind(cell.row_index)
            .bind(cell.column_index)
            .bind(version)
            .fetch_optional(executor)
            .await?;

            updated.ok_or(AppError::VersionConflict)
        }
        None => {
            let inserted = sqlx::query_as::<_, CellRecord>(&format!(
                "INSERT INTO cells
                     (sheet_id, row_index, column_index, cell_type, raw_value, computed_value, version, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, 1, ?)
                 RETURNING {CELL_COLUMNS}"
            ))
            .bind(cell.sheet_id)
            .bind(cell.row_index)
            .bind(cell.column_index)
            .bind(cell.kind.as_str())
            .bind(cell.raw_value)
            .bind(cell.computed_value)
            .bind(Utc::now())
            .fetch_one(executor)
            .await;

            match inserted {
                Ok(cell) => Ok(cell),
                // A concurrent edit materialized the cell first.
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    Err(AppError::VersionConflict)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Remove a cell; a no-op when absent. With `expected_version`, a vanished
/// or moved row is a version conflict.
pub async fn delete<'e, E>(
    executor: E,
    sheet_id: i64,
    row_index: i64,
    column_index: i64,
    expected_version: Option<i64>,
) -> Result<(), AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    match expected_version {
        Some(version) => {
            let result = sqlx::query(
                "DELETE FROM cells
                 WHERE sheet_id = ? AND row_index = ? AND column_index = ? AND version = ?",
            )
            .bind(sheet_id)
            .bind(row_index)
            .bind(column_index)
            .bind(version)
            .execute(executor)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::VersionConflict);
            }
            Ok(())
        }
        None => {
            sqlx::query(
                "DELETE FROM cells WHERE sheet_id = ? AND row_index = ? AND column_index = ?",
            )
            .bind(sheet_id)
            .bind(row_index)
            .bind(column_index)
            .execute(executor)
            .await?;
            Ok(())
        }
    }
}
