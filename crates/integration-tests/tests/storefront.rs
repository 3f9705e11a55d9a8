//! Public catalog, favorites, compare and inquiries.

#![allow(clippy::unwrap_used)]

use autosalon_core::{CarId, OrderStatus};
use autosalon_integration_tests::{TestApp, car};
use autosalon_sync::{RemoteError, RemoteStore};
use axum::http::StatusCode;

#[tokio::test]
async fn test_catalog_lists_and_filters_cars() {
    let app = TestApp::spawn(vec![
        car("Skoda", "Octavia", 1_850_000, 3),
        car("Toyota", "Camry", 3_200_000, 1),
    ])
    .await;

    let all = app.get("/", None).await;
    assert_eq!(all.status, StatusCode::OK);
    assert!(all.body.contains("Skoda Octavia"));
    assert!(all.body.contains("Toyota Camry"));

    let filtered = app.get("/?brand=Toyota&min_price=", None).await;
    assert_eq!(filtered.status, StatusCode::OK);
    assert!(filtered.body.contains("Toyota Camry"));
    assert!(!filtered.body.contains("Skoda Octavia"));
}

#[tokio::test]
async fn test_car_page_counts_views() {
    let octavia = car("Skoda", "Octavia", 1_850_000, 3);
    let id = octavia.id;
    let app = TestApp::spawn(vec![octavia]).await;

    let response = app.get(&format!("/cars/{id}"), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("name=\"customer_phone\""));

    let stored = app.store.stored_cars();
    assert_eq!(stored.first().unwrap().views, 1);
}

#[tokio::test]
async fn test_unknown_car_is_404() {
    let app = TestApp::spawn(Vec::new()).await;

    let response = app.get(&format!("/cars/{}", CarId::generate()), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_favorite_toggle_persists_per_visitor() {
    let octavia = car("Skoda", "Octavia", 1_850_000, 3);
    let id = octavia.id;
    let app = TestApp::spawn(vec![octavia]).await;

    // First visit hands out the visitor cookie
    let home = app.get("/", None).await;
    let cookie = home.cookie().unwrap();

    let on = app
        .post(&format!("/api/favorites/{id}/toggle"), Some(&cookie))
        .await;
    assert_eq!(on.status, StatusCode::OK);
    assert_eq!(on.headers.get("hx-trigger").unwrap(), "favorites-updated");
    let body = on.json();
    assert_eq!(body["is_favorite"], true);
    assert_eq!(body["count"], 1);

    let page = app.get("/favorites", Some(&cookie)).await;
    assert!(page.body.contains("Skoda Octavia"));

    let off = app
        .post(&format!("/api/favorites/{id}/toggle"), Some(&cookie))
        .await;
    assert_eq!(off.json()["is_favorite"], false);

    // Another visitor starts empty
    let other = app.get("/favorites", None).await;
    assert!(!other.body.contains("Skoda Octavia"));
}

#[tokio::test]
async fn test_favorite_toggle_is_not_saved_when_favorites_fail_to_load() {
    let octavia = car("Skoda", "Octavia", 1_850_000, 3);
    let id = octavia.id;
    let app = TestApp::spawn(vec![octavia]).await;
    let unavailable = || RemoteError::Rejected {
        status: 503,
        message: "service unavailable".into(),
    };

    app.store.fail_next("fetch_favorites", unavailable());
    let home = app.get("/", None).await;
    assert_eq!(home.status, StatusCode::OK);
    let cookie = home.cookie().unwrap();

    app.store.fail_next("fetch_favorites", unavailable());
    let failed = app
        .post(&format!("/api/favorites/{id}/toggle"), Some(&cookie))
        .await;
    let body = failed.json();
    assert_eq!(body["write"], "rolled_back");
    assert_eq!(body["is_favorite"], false);
    assert_eq!(app.store.calls("replace_favorites"), 0);

    let saved = app
        .post(&format!("/api/favorites/{id}/toggle"), Some(&cookie))
        .await;
    let body = saved.json();
    assert_eq!(body["write"], "committed");
    assert_eq!(body["is_favorite"], true);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_favorite_toggle_for_unknown_car_is_404() {
    let app = TestApp::spawn(Vec::new()).await;

    let response = app
        .post(&format!("/api/favorites/{}/toggle", CarId::generate()), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_compare_holds_three_cars() {
    let cars: Vec<_> = ["A", "B", "C", "D"]
        .iter()
        .map(|model| car("Lada", model, 1_000_000, 1))
        .collect();
    let ids: Vec<CarId> = cars.iter().map(|c| c.id).collect();
    let app = TestApp::spawn(cars).await;
    let cookie = app.get("/", None).await.cookie().unwrap();

    for id in ids.iter().take(3) {
        let response = app.post(&format!("/api/compare/{id}"), Some(&cookie)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()["in_compare"], true);
    }

    let fourth = app
        .post(&format!("/api/compare/{}", ids.last().unwrap()), Some(&cookie))
        .await;
    assert_eq!(fourth.status, StatusCode::CONFLICT);

    let table = app.get("/compare", Some(&cookie)).await;
    assert!(table.body.contains("Lada A"));
    assert!(!table.body.contains("Lada D"));
}

#[tokio::test]
async fn test_inquiry_creates_new_order() {
    let octavia = car("Skoda", "Octavia", 1_850_000, 3);
    let id = octavia.id.to_string();
    let app = TestApp::spawn(vec![octavia]).await;

    let response = app
        .post_form(
            "/api/orders",
            &[
                ("car_id", &id),
                ("customer_name", "Ivan"),
                ("customer_phone", "+7 900 123-45-67"),
                ("customer_email", ""),
                ("message", "Is it still available?"),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert!(response.body.contains("Thank you, Ivan!"));

    let orders = app.store.fetch_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    let order = orders.first().unwrap();
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.customer_email, None);
}

#[tokio::test]
async fn test_inquiry_without_phone_is_rejected() {
    let octavia = car("Skoda", "Octavia", 1_850_000, 3);
    let id = octavia.id.to_string();
    let app = TestApp::spawn(vec![octavia]).await;

    let response = app
        .post_form(
            "/api/orders",
            &[
                ("car_id", &id),
                ("customer_name", "Ivan"),
                ("customer_phone", " "),
                ("customer_email", ""),
                ("message", ""),
            ],
            None,
        )
        .await;
    assert!(response.status.is_client_error());
    assert!(app.store.fetch_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_and_health() {
    let app = TestApp::spawn(vec![car("Skoda", "Octavia", 1_850_000, 3)]).await;

    let status = app.get("/api/status", None).await.json();
    assert_eq!(status["online"], true);
    assert_eq!(status["cars"], 1);

    assert_eq!(app.get("/health", None).await.status, StatusCode::OK);
    assert_eq!(app.get("/health/ready", None).await.status, StatusCode::OK);

    app.store.set_offline(true);
    assert_eq!(
        app.get("/health/ready", None).await.status,
        StatusCode::SERVICE_UNAVAILABLE
    );
}
