mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::test_app;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app().await;
    let router = gridbook_server::router(app.state.clone());

    let response = router.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn workbook_lifecycle_over_http() {
    let app = test_app().await;
    let router = gridbook_server::router(app.state.clone());

    // Create: the default sheet comes with it.
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/workbooks",
            json!({"name": "Budget"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let workbook = body_json(response).await;
    let workbook_id = workbook["id"].as_i64().unwrap();
    assert_eq!(workbook["name"], "Budget");

    let response = router
        .clone()
        .oneshot(get_request(&format!("/api/workbooks/{workbook_id}/sheets")))
        .await
        .unwrap();
    let sheets = body_json(response).await;
    assert_eq!(sheets.as_array().unwrap().len(), 1);
    assert_eq!(sheets[0]["name"], "Sheet1");
    assert_eq!(sheets[0]["row_count"], 1000);
    assert_eq!(sheets[0]["column_count"], 26);

    // Delete cascades; the sheet is gone too.
    let sheet_id = sheets[0]["id"].as_i64().unwrap();
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/workbooks/{workbook_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(get_request(&format!("/api/sheets/{sheet_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cell_update_and_fetch_over_http() {
    let app = test_app().await;
    let router = gridbook_server::router(app.state.clone());

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/workbooks",
            json!({"name": "Book"}),
        ))
        .await
        .unwrap();
    let workbook_id = body_json(response).await["id"].as_i64().unwrap();

    let response = router
        .clone()
        .oneshot(get_request(&format!("/api/workbooks/{workbook_id}/sheets")))
        .await
        .unwrap();
    let sheet_id = body_json(response).await[0]["id"].as_i64().unwrap();

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/sheets/{sheet_id}/cells"),
            json!({"row_index": 1, "column_index": 0, "value": "=2*3"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cleared"], false);
    assert_eq!(body["cell"]["address"], "A1");
    assert_eq!(body["cell"]["cell_type"], "FORMULA");
    assert_eq!(body["cell"]["computed_value"], "6");

    let response = router
        .clone()
        .oneshot(get_request(&format!(
            "/api/sheets/{sheet_id}/cells?row_index=1&column_index=0"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cell = body_json(response).await;
    assert_eq!(cell["raw_value"], "=2*3");
    assert_eq!(cell["version"], 1);

    let response = router
        .oneshot(get_request(&format!("/api/sheets/{sheet_id}/cells/all")))
        .await
        .unwrap();
    let cells = body_json(response).await;
    assert_eq!(cells.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cycle_maps_to_bad_request_with_symbol() {
    let app = test_app().await;
    let router = gridbook_server::router(app.state.clone());

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/workbooks",
            json!({"name": "Book"}),
        ))
        .await
        .unwrap();
    let workbook_id = body_json(response).await["id"].as_i64().unwrap();
    let response = router
        .clone()
        .oneshot(get_request(&format!("/api/workbooks/{workbook_id}/sheets")))
        .await
        .unwrap();
    let sheet_id = body_json(response).await[0]["id"].as_i64().unwrap();

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/sheets/{sheet_id}/cells"),
            json!({"row_index": 1, "column_index": 0, "value": "=A1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("#CYCLE!"));
}

#[tokio::test]
async fn missing_resources_map_to_not_found() {
    let app = test_app().await;
    let router = gridbook_server::router(app.state.clone());

    let response = router
        .clone()
        .oneshot(get_request("/api/workbooks/404"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(json_request(
            "PUT",
            "/api/sheets/404/cells",
            json!({"row_index": 1, "column_index": 0, "value": "1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
