//! Car import/export and back-office inventory edits.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use autosalon_integration_tests::{ADMIN_EMAIL, TestApp, car, draft};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;

/// Ten import records; the fourth has no brand.
fn ten_records() -> String {
    let mut records: Vec<Value> = (0..10)
        .map(|i| serde_json::to_value(draft("Kia", &format!("Rio {i}"), 1_200_000 + i)).unwrap())
        .collect();
    records[3].as_object_mut().unwrap().remove("brand");
    Value::Array(records).to_string()
}

#[tokio::test]
async fn test_import_reports_each_bad_record() {
    let app = TestApp::spawn(vec![car("Skoda", "Octavia", 1_850_000, 3)]).await;
    let context = app.state.context();

    let report = context
        .import_cars_data(&ten_records(), &app.shutdown)
        .await;

    assert_eq!(report.total, 10);
    assert_eq!(report.successful, 9);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Record 4:"), "{:?}", report.errors);

    // The list is replaced by what was imported
    let cars = context.cars().await;
    assert_eq!(cars.len(), 9);
    assert!(cars.iter().all(|c| c.brand == "Kia"));
    // Earlier cars stay in the backend; import never deletes
    assert_eq!(app.store.stored_cars().len(), 10);
}

#[tokio::test]
async fn test_import_of_export_is_idempotent() {
    let app = TestApp::spawn(vec![
        car("Skoda", "Octavia", 1_850_000, 3),
        car("Toyota", "Camry", 3_200_000, 1),
    ])
    .await;
    let context = app.state.context();
    let before = context.cars().await;

    let exported = context.export_cars_data().await.unwrap();
    let report = context.import_cars_data(&exported, &app.shutdown).await;

    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(context.cars().await, before);
    assert_eq!(app.store.stored_cars().len(), 2);
}

#[tokio::test]
async fn test_import_rejects_non_array() {
    let app = TestApp::spawn(Vec::new()).await;

    let report = app
        .state
        .context()
        .import_cars_data("{\"brand\": \"Kia\"}", &app.shutdown)
        .await;
    assert_eq!(report.total, 0);
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn test_admin_export_download() {
    let app = TestApp::spawn(vec![car("Skoda", "Octavia", 1_850_000, 3)]).await;
    let cookie = app.login(ADMIN_EMAIL).await;

    let response = app.get("/admin/cars/export", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    let disposition = response.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"cars-"));
    assert_eq!(response.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_import_upload_shows_report() {
    let app = TestApp::spawn(Vec::new()).await;
    let cookie = app.login(ADMIN_EMAIL).await;

    let boundary = "autosalon-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"cars.json\"\r\n\
         Content-Type: application/json\r\n\r\n\
         {}\r\n\
         --{boundary}--\r\n",
        ten_records()
    );
    let request = Request::post("/admin/cars/import")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header(header::COOKIE, &cookie)
        .body(Body::from(body))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert!(response.body.contains("Processed 10: 9 imported, 1 failed."));
    assert!(response.body.contains("Cars already in the database were kept"));
    assert!(response.body.contains("Record 4:"));
}

#[tokio::test]
async fn test_admin_creates_and_deletes_car() {
    let app = TestApp::spawn(Vec::new()).await;
    let cookie = app.login(ADMIN_EMAIL).await;

    let form = [
        ("brand", "Haval"),
        ("model", "Jolion"),
        ("year", "2024"),
        ("displacement", "1.5"),
        ("power", "143"),
        ("fuel_type", "petrol"),
        ("transmission", "robot"),
        ("drivetrain", "fwd"),
        ("body_type", "crossover"),
        ("base_price", "2100000"),
        ("discount", "100000"),
        ("images", ""),
        ("is_new", "on"),
        ("mileage", "0"),
        ("color", "White"),
        ("description", ""),
    ];
    let created = app.post_form("/admin/cars", &form, Some(&cookie)).await;
    assert_eq!(created.status, StatusCode::SEE_OTHER, "{}", created.body);
    assert_eq!(created.location(), Some("/admin/cars?notice=created"));

    let stored = app.store.stored_cars();
    assert_eq!(stored.len(), 1);
    let id = stored[0].id;
    assert_eq!(app.state.context().cars().await.len(), 1);

    let deleted = app
        .post(&format!("/admin/cars/{id}/delete"), Some(&cookie))
        .await;
    assert_eq!(deleted.location(), Some("/admin/cars?notice=deleted"));
    assert!(app.store.stored_cars().is_empty());

    let again = app
        .post(&format!("/admin/cars/{id}/delete"), Some(&cookie))
        .await;
    assert_eq!(again.location(), Some("/admin/cars?notice=missing"));
}

#[tokio::test]
async fn test_invalid_car_form_is_rerendered() {
    let app = TestApp::spawn(Vec::new()).await;
    let cookie = app.login(ADMIN_EMAIL).await;

    let response = app
        .post_form(
            "/admin/cars",
            &[("brand", ""), ("model", "Jolion"), ("year", "abc")],
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("Jolion"));
    assert!(app.store.stored_cars().is_empty());
}
