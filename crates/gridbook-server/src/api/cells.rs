use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::engine::{CellView, UpdateCellRequest};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchUpdateRequest {
    pub cells: Vec<UpdateCellRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CellQuery {
    pub row_index: i64,
    pub column_index: i64,
}

/// Result of a single edit; `cell` is absent when the edit cleared the cell.
#[derive(Debug, Serialize)]
pub struct UpdateCellResponse {
    pub cleared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<CellView>,
}

/// Update a single cell
async fn update_cell(
    State(state): State<AppState>,
    Path(sheet_id): Path<i64>,
    Json(request): Json<UpdateCellRequest>,
) -> Result<Json<UpdateCellResponse>, AppError> {
    tracing::info!(
        sheet_id,
        row = request.row_index,
        col = request.column_index,
        "updating cell"
    );

    let cell = state.engine.update_cell(sheet_id, &request).await?;
    Ok(Json(UpdateCellResponse {
        cleared: cell.is_none(),
        cell,
    }))
}

/// Batch update multiple cells
async fn batch_update_cells(
    State(state): State<AppState>,
    Path(sheet_id): Path<i64>,
    Json(request): Json<BatchUpdateRequest>,
) -> Result<Json<Vec<CellView>>, AppError> {
    let cells = state.engine.batch_update(sheet_id, &request.cells).await?;
    Ok(Json(cells))
}

/// Get a specific cell
async fn get_cell(
    State(state): State<AppState>,
    Path(sheet_id): Path<i64>,
    Query(query): Query<CellQuery>,
) -> Result<Json<CellView>, AppError> {
    let cell = state
        .engine
        .get_cell(sheet_id, query.row_index, query.column_index)
        .await?;
    Ok(Json(cell))
}

/// Get all non-empty cells in a sheet
async fn list_cells(
    State(state): State<AppState>,
    Path(sheet_id): Path<i64>,
) -> Result<Json<Vec<CellView>>, AppError> {
    let cells = state.engine.list_cells(sheet_id).await?;
    Ok(Json(cells))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/sheets/{id}/cells",
            put(update_cell).get(get_cell),
        )
        .route("/api/sheets/{id}/cells/batch", put(batch_update_cells))
        .route("/api/sheets/{id}/cells/all", get(list_cells))
}
