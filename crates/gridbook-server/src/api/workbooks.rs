use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::WorkbookRecord;
use crate::error::AppError;
use crate::AppState;

/// Request to create a new workbook
#[derive(Debug, Deserialize)]
pub struct CreateWorkbookRequest {
    pub name: String,
    /// Name for the default sheet created with the workbook
    pub sheet_name: Option<String>,
}

/// Response for workbook operations
#[derive(Debug, Serialize)]
pub struct WorkbookResponse {
    pub id: i64,
    pub name: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WorkbookRecord> for WorkbookResponse {
    fn from(wb: WorkbookRecord) -> Self {
        Self {
            id: wb.id,
            name: wb.name,
            version: wb.version,
            created_at: wb.created_at,
            updated_at: wb.updated_at,
        }
    }
}

/// List all workbooks
async fn list_workbooks(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkbookResponse>>, AppError> {
    let workbooks = state.db.list_workbooks().await?;
    let response: Vec<WorkbookResponse> = workbooks.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Create a new workbook with its default sheet
async fn create_workbook(
    State(state): State<AppState>,
    Json(req): Json<CreateWorkbookRequest>,
) -> Result<Json<WorkbookResponse>, AppError> {
    tracing::info!(name = %req.name, "creating workbook");

    let sheet_name = req.sheet_name.as_deref().unwrap_or("Sheet1");
    let workbook = state.db.create_workbook(&req.name, sheet_name).await?;

    Ok(Json(workbook.into()))
}

/// Get a workbook by ID
async fn get_workbook(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WorkbookResponse>, AppError> {
    let workbook = state
        .db
        .get_workbook(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Workbook {id} not found")))?;
    Ok(Json(workbook.into()))
}

/// Delete a workbook; its sheets and cells go with it
async fn delete_workbook(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.db.delete_workbook(id).await? {
        return Err(AppError::NotFound(format!("Workbook {id} not found")));
    }
    tracing::info!(workbook_id = id, "deleted workbook");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/workbooks", get(list_workbooks).post(create_workbook))
        .route(
            "/api/workbooks/{id}",
            get(get_workbook).delete(delete_workbook),
        )
}
