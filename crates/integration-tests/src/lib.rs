//! Integration tests for Autosalon.
//!
//! The storefront router runs in-process on top of the in-memory backend,
//! so no network or hosted project is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p autosalon-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `admin_gate` - Back-office authentication and roles
//! - `storefront` - Catalog, favorites, compare and inquiries
//! - `inventory` - Import/export through the context and the admin routes
//! - `reconnect` - Resync after the backend comes back

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use autosalon_core::{
    AdminRole, BodyType, Car, CarDraft, CarId, CarPrice, Drivetrain, Email, Engine, FuelType,
    Transmission,
};
use autosalon_storefront::config::{BackendConfig, StorefrontConfig};
use autosalon_storefront::{AppState, app};
use autosalon_sync::{
    CarsContext, FunctionsClient, InMemoryStore, NetworkMonitor, RemoteStore, SettingsStore,
};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use url::Url;

pub const ADMIN_EMAIL: &str = "admin@autosalon.example";
pub const MANAGER_EMAIL: &str = "manager@autosalon.example";
pub const PASSWORD: &str = "correct horse battery";

/// Client address sent to rate-limited routes.
pub const CLIENT_IP: &str = "203.0.113.10";

/// A valid draft for `brand`.
#[must_use]
pub fn draft(brand: &str, model: &str, base_price: i64) -> CarDraft {
    CarDraft {
        brand: brand.to_string(),
        model: model.to_string(),
        year: 2022,
        engine: Engine {
            displacement: 2.0,
            power: 180,
            fuel_type: FuelType::Petrol,
        },
        transmission: Transmission::Automatic,
        drivetrain: Drivetrain::Awd,
        body_type: BodyType::Crossover,
        price: CarPrice::new(Decimal::new(base_price, 0), Decimal::ZERO),
        images: Vec::new(),
        is_new: true,
        mileage: 0,
        color: None,
        description: None,
    }
}

/// A stored car, `age_days` old.
#[must_use]
pub fn car(brand: &str, model: &str, base_price: i64, age_days: i64) -> Car {
    draft(brand, model, base_price).into_car(
        CarId::generate(),
        Utc::now() - ChronoDuration::days(age_days),
    )
}

fn config(settings_path: PathBuf) -> StorefrontConfig {
    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        settings_path,
        probe_interval: Duration::from_secs(15),
        backend: BackendConfig {
            // Nothing listens here; fire-and-forget notifications fail fast
            url: Url::parse("http://127.0.0.1:9").unwrap(),
            anon_key: SecretString::from("anon_key_value_8f3Kq"),
            service_key: None,
        },
        telegram_admin_chat_ids: None,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// The storefront wired to an in-memory backend.
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
    pub router: Router,
    pub shutdown: CancellationToken,
    _settings_dir: TempDir,
}

impl TestApp {
    /// Start with `cars` in the backend and one account per role.
    pub async fn spawn(cars: Vec<Car>) -> Self {
        let store = Arc::new(
            InMemoryStore::new()
                .with_cars(cars)
                .with_account(&Email::parse(ADMIN_EMAIL).unwrap(), PASSWORD, AdminRole::Admin)
                .with_account(&Email::parse(MANAGER_EMAIL).unwrap(), PASSWORD, AdminRole::Manager),
        );
        let remote: Arc<dyn RemoteStore> = store.clone();

        let settings_dir = TempDir::new().unwrap();
        let config = config(settings_dir.path().join("site-settings.json"));
        let functions = FunctionsClient::new(&config.backend.remote_config()).unwrap();
        let settings = SettingsStore::load(config.settings_path.clone());
        let context = CarsContext::new(remote);
        let shutdown = CancellationToken::new();
        context.init(&shutdown).await;

        let state = AppState::new(
            config,
            context,
            NetworkMonitor::new(true),
            functions,
            settings,
            shutdown.clone(),
        );

        Self {
            store,
            router: app(state.clone()),
            state,
            shutdown,
            _settings_dir: settings_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    /// POST a urlencoded form from [`CLIENT_IP`].
    pub async fn post_form(&self, uri: &str, form: &[(&str, &str)], cookie: Option<&str>) -> TestResponse {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let mut request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-forwarded-for", CLIENT_IP);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body)).unwrap()).await
    }

    /// POST with an empty body.
    pub async fn post(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.post_form(uri, &[], cookie).await
    }

    /// Sign in through the login form and return the session cookie.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .post_form("/admin/login", &[("email", email), ("password", PASSWORD)], None)
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "login failed: {}", response.body);
        assert_eq!(response.location(), Some("/admin"));
        response.cookie().expect("login sets the session cookie")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    /// `name=value` of the session cookie, if one was set.
    #[must_use]
    pub fn cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| v.split(';').next())
            .map(str::to_string)
    }

    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}
