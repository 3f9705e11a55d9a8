//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Catalog (filters, sort, pagination)
//! POST /refresh                   - Manual reload of the car list
//! GET  /cars/{id}                 - Car detail (counts a view)
//! GET  /favorites                 - Visitor favorites
//! GET  /compare                   - Compare table
//! GET  /blog                      - Blog with the car-advice assistant
//!
//! # JSON API
//! POST /api/favorites/{id}/toggle - Toggle a favorite
//! POST /api/compare/{id}          - Toggle a car in the compare list
//! POST /api/orders                - Customer inquiry (rate limited)
//! POST /api/blog/ask              - Ask the assistant (rate limited)
//! GET  /api/status                - Online flag and load state
//!
//! GET  /health                    - Liveness
//! GET  /health/ready              - Backend reachability
//! GET  /static/*                  - Assets
//! ```
//!
//! Back-office routes live in [`admin`].

pub mod admin;
pub mod blog;
pub mod cars;
pub mod catalog;
pub mod compare;
pub mod favorites;
pub mod orders;
pub mod status;
pub mod views;

use axum::{
    Router,
    http::{Request, Response},
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    create_session_layer, public_write_rate_limiter, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Directory served under `/static`.
pub const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Public pages and JSON endpoints.
pub fn public_routes() -> Router<AppState> {
    // Writes that reach the backend or a paid function are rate limited
    let writes = Router::new()
        .route("/api/orders", post(orders::create))
        .route("/api/blog/ask", post(blog::ask))
        .layer(public_write_rate_limiter());

    Router::new()
        .route("/", get(catalog::index))
        .route("/refresh", post(catalog::refresh))
        .route("/cars/{id}", get(cars::show))
        .route("/favorites", get(favorites::index))
        .route("/compare", get(compare::index))
        .route("/blog", get(blog::index))
        .route("/api/favorites/{id}/toggle", post(favorites::toggle))
        .route("/api/compare/{id}", post(compare::toggle))
        .route("/api/status", get(status::status))
        .route("/health", get(status::health))
        .route("/health/ready", get(status::ready))
        .merge(writes)
}

/// The complete application with its middleware stack.
///
/// Sentry layers are added by the binary on top of this.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .merge(public_routes())
        .merge(admin::router())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        admin = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &Response<_>, latency: std::time::Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
