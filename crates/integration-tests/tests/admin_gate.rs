//! Back-office authentication and role checks.

#![allow(clippy::unwrap_used)]

use autosalon_integration_tests::{ADMIN_EMAIL, MANAGER_EMAIL, TestApp};
use axum::http::StatusCode;

#[tokio::test]
async fn test_unauthenticated_pages_redirect_to_login() {
    let app = TestApp::spawn(Vec::new()).await;

    for path in ["/admin", "/admin/orders", "/admin/cars", "/admin/settings"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "{path}");
        assert_eq!(response.location(), Some("/admin/login"), "{path}");
    }
}

#[tokio::test]
async fn test_unauthenticated_api_gets_401() {
    let app = TestApp::spawn(Vec::new()).await;

    let response = app.get("/admin/api/status", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_page_is_public() {
    let app = TestApp::spawn(Vec::new()).await;

    let response = app.get("/admin/login", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("name=\"password\""));
}

#[tokio::test]
async fn test_wrong_password_rerenders_login() {
    let app = TestApp::spawn(Vec::new()).await;

    let response = app
        .post_form(
            "/admin/login",
            &[("email", ADMIN_EMAIL), ("password", "wrong")],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.body.contains("Invalid email or password"));
}

#[tokio::test]
async fn test_admin_reaches_every_section() {
    let app = TestApp::spawn(Vec::new()).await;
    let cookie = app.login(ADMIN_EMAIL).await;

    for path in [
        "/admin",
        "/admin/cars",
        "/admin/cars/new",
        "/admin/orders",
        "/admin/chat",
        "/admin/settings",
    ] {
        let response = app.get(path, Some(&cookie)).await;
        assert_eq!(response.status, StatusCode::OK, "{path}: {}", response.body);
    }

    let status = app.get("/admin/api/status", Some(&cookie)).await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.json()["online"], true);
}

#[tokio::test]
async fn test_manager_cannot_manage_inventory_or_settings() {
    let app = TestApp::spawn(Vec::new()).await;
    let cookie = app.login(MANAGER_EMAIL).await;

    assert_eq!(app.get("/admin/orders", Some(&cookie)).await.status, StatusCode::OK);
    assert_eq!(app.get("/admin/chat", Some(&cookie)).await.status, StatusCode::OK);
    assert_eq!(app.get("/admin/cars", Some(&cookie)).await.status, StatusCode::FORBIDDEN);
    assert_eq!(app.get("/admin/settings", Some(&cookie)).await.status, StatusCode::FORBIDDEN);

    // The sidebar only offers what the role may open
    let dashboard = app.get("/admin", Some(&cookie)).await;
    assert!(!dashboard.body.contains("href=\"/admin/cars\""));
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let app = TestApp::spawn(Vec::new()).await;
    let cookie = app.login(ADMIN_EMAIL).await;

    let response = app.post("/admin/logout", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/admin/login"));

    let after = app.get("/admin", Some(&cookie)).await;
    assert_eq!(after.location(), Some("/admin/login"));
}
