use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::SheetRecord;
use crate::error::AppError;
use crate::AppState;

/// Request to create a sheet within a workbook
#[derive(Debug, Deserialize)]
pub struct CreateSheetRequest {
    pub name: String,
    pub row_count: Option<i64>,
    pub column_count: Option<i64>,
}

/// Response for sheet operations
#[derive(Debug, Serialize)]
pub struct SheetResponse {
    pub id: i64,
    pub workbook_id: i64,
    pub name: String,
    pub row_count: i64,
    pub column_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SheetRecord> for SheetResponse {
    fn from(sheet: SheetRecord) -> Self {
        Self {
            id: sheet.id,
            workbook_id: sheet.workbook_id,
            name: sheet.name,
            row_count: sheet.row_count,
            column_count: sheet.column_count,
            created_at: sheet.created_at,
            updated_at: sheet.updated_at,
        }
    }
}

/// Create a sheet in a workbook
async fn create_sheet(
    State(state): State<AppState>,
    Path(workbook_id): Path<i64>,
    Json(req): Json<CreateSheetRequest>,
) -> Result<Json<SheetResponse>, AppError> {
    tracing::info!(workbook_id, name = %req.name, "creating sheet");

    let sheet = state
        .db
        .create_sheet(
            workbook_id,
            &req.name,
            req.row_count.unwrap_or(1000),
            req.column_count.unwrap_or(26),
        )
        .await?;

    Ok(Json(sheet.into()))
}

/// List the sheets of a workbook
async fn list_sheets(
    State(state): State<AppState>,
    Path(workbook_id): Path<i64>,
) -> Result<Json<Vec<SheetResponse>>, AppError> {
    let sheets = state.db.list_sheets(workbook_id).await?;
    Ok(Json(sheets.into_iter().map(Into::into).collect()))
}

/// Get a sheet by ID
async fn get_sheet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SheetResponse>, AppError> {
    let sheet = state
        .db
        .get_sheet(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Sheet {id} not found")))?;
    Ok(Json(sheet.into()))
}

/// Delete a sheet and all its cells
async fn delete_sheet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.db.delete_sheet(id).await? {
        return Err(AppError::NotFound(format!("Sheet {id} not found")));
    }
    tracing::info!(sheet_id = id, "deleted sheet");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/workbooks/{id}/sheets",
            get(list_sheets).post(create_sheet),
        )
        .route("/api/sheets/{id}", get(get_sheet).delete(delete_sheet))
}
