pub mod cells;
pub mod models;

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::AppError;
use models::{SheetRecord, WorkbookRecord};

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database. SQLite takes a single writer, so the pool
    /// holds one connection and edit transactions serialize on it.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction scoped to one edit.
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    /// List all workbooks, most recently updated first
    pub async fn list_workbooks(&self) -> Result<Vec<WorkbookRecord>, AppError> {
        let workbooks = sqlx::query_as::<_, WorkbookRecord>(
            r#"SELECT id, name, version, created_at, updated_at FROM workbooks ORDER BY updated_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(workbooks)
    }

    /// Create a workbook together with its default sheet
    pub async fn create_workbook(
        &self,
        name: &str,
        sheet_name: &str,
    ) -> Result<WorkbookRecord, AppError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let workbook = sqlx::query_as::<_, WorkbookRecord>(
            r#"INSERT INTO workbooks (name, version, created_at, updated_at)
               VALUES (?, 0, ?, ?)
               RETURNING id, name, version, created_at, updated_at"#,
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO sheets (workbook_id, name, row_count, column_count, created_at, updated_at)
               VALUES (?, ?, 1000, 26, ?, ?)"#,
        )
        .bind(workbook.id)
        .bind(sheet_name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(workbook)
    }

    /// Get a workbook by ID
    pub async fn get_workbook(&self, id: i64) -> Result<Option<WorkbookRecord>, AppError> {
        let workbook = sqlx::query_as::<_, WorkbookRecord>(
            r#"SELECT id, name, version, created_at, updated_at FROM workbooks WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(workbook)
    }

    /// Delete a workbook; sheets and cells cascade. Returns false if absent.
    pub async fn delete_workbook(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM workbooks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Create a sheet in a workbook
    pub async fn create_sheet(
        &self,
        workbook_id: i64,
        name: &str,
        row_count: i64,
        column_count: i64,
    ) -> Result<SheetRecord, AppError> {
        if self.get_workbook(workbook_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Workbook {workbook_id} not found"
            )));
        }

        let now = Utc::now();
        let sheet = sqlx::query_as::<_, SheetRecord>(
            r#"INSERT INTO sheets (workbook_id, name, row_count, column_count, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               RETURNING id, workbook_id, name, row_count, column_count, created_at, updated_at"#,
        )
        .bind(workbook_id)
        .bind(name)
        .bind(row_count)
        .bind(column_count)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(sheet)
    }

    /// List all sheets of a workbook
    pub async fn list_sheets(&self, workbook_id: i64) -> Result<Vec<SheetRecord>, AppError> {
        let sheets = sqlx::query_as::<_, SheetRecord>(
            r#"SELECT id, workbook_id, name, row_count, column_count, created_at, updated_at
               FROM sheets WHERE workbook_id = ? ORDER BY id"#,
        )
        .bind(workbook_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sheets)
    }

    /// Get a sheet by ID
    pub async fn get_sheet(&self, id: i64) -> Result<Option<SheetRecord>, AppError> {
        fetch_sheet(&self.pool, id).await
    }

    /// Delete a sheet; its cells cascade. Returns false if absent.
    pub async fn delete_sheet(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sheets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Fetch a sheet through any executor, so the update coordinator can read
/// it inside its edit transaction.
pub async fn fetch_sheet<'e, E>(executor: E, id: i64) -> Result<Option<SheetRecord>, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sheet = sqlx::query_as::<_, SheetRecord>(
        r#"SELECT id, workbook_id, name, row_count, column_count, created_at, updated_at
           FROM sheets WHERE id = ?"#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(sheet)
}
