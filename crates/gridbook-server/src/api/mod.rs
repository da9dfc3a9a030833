mod cells;
mod health;
mod sheets;
mod workbooks;

use axum::Router;

use crate::AppState;

/// Create the API router
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(workbooks::router())
        .merge(sheets::router())
        .merge(cells::router())
}
