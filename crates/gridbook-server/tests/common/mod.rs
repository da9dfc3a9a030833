#![allow(dead_code)]

use tokio::sync::watch;

use gridbook_server::db::Database;
use gridbook_server::engine::{CellEngine, UpdateCellRequest};
use gridbook_server::events::ChangeNotifier;
use gridbook_server::AppState;

/// A fully wired application over an in-memory store. The shutdown sender is
/// held so in-flight retries are not cancelled mid-test.
pub struct TestApp {
    pub state: AppState,
    pub shutdown: watch::Sender<bool>,
}

pub async fn test_app() -> TestApp {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    db.migrate().await.expect("migrate");

    let (shutdown, shutdown_rx) = watch::channel(false);
    let notifier = ChangeNotifier::default();
    let engine = CellEngine::new(db.clone(), notifier.clone(), shutdown_rx);

    TestApp {
        state: AppState {
            db,
            engine,
            notifier,
        },
        shutdown,
    }
}

/// A test app plus the id of a freshly created default sheet.
pub async fn test_app_with_sheet() -> (TestApp, i64) {
    let app = test_app().await;

    let workbook = app
        .state
        .db
        .create_workbook("Test Book", "Sheet1")
        .await
        .expect("workbook");
    let sheets = app.state.db.list_sheets(workbook.id).await.expect("sheets");
    let sheet_id = sheets[0].id;

    (app, sheet_id)
}

pub fn edit(row: i64, col: i64, value: &str) -> UpdateCellRequest {
    UpdateCellRequest {
        row_index: row,
        column_index: col,
        value: value.to_string(),
    }
}
