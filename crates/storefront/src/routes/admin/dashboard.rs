//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::{Car, Order, OrderStatus, format_amount};
use axum::{Router, extract::State, routing::get};
use tracing::instrument;

use super::AdminPage;
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::state::AppState;

const TOP_LIMIT: usize = 5;

/// Dashboard metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardMetrics {
    pub cars: usize,
    pub new_cars: usize,
    pub views: u64,
    pub open_orders: usize,
    pub new_orders: usize,
}

impl DashboardMetrics {
    #[must_use]
    pub fn compute(cars: &[Car], orders: &[Order]) -> Self {
        Self {
            cars: cars.len(),
            new_cars: cars.iter().filter(|car| car.is_new).count(),
            views: cars.iter().map(|car| car.views).sum(),
            open_orders: orders.iter().filter(|order| order.status.is_open()).count(),
            new_orders: orders
                .iter()
                .filter(|order| order.status == OrderStatus::New)
                .count(),
        }
    }
}

/// Most viewed car row.
#[derive(Debug, Clone)]
pub struct PopularCarView {
    pub id: String,
    pub title: String,
    pub price: String,
    pub views: u64,
}

/// Recent order row.
#[derive(Debug, Clone)]
pub struct RecentOrderView {
    pub customer_name: String,
    pub car: String,
    pub status: &'static str,
    pub created_at: String,
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub page: AdminPage,
    pub metrics: DashboardMetrics,
    pub load_state: &'static str,
    pub popular: Vec<PopularCarView>,
    pub recent_orders: Vec<RecentOrderView>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/admin", get(dashboard))
}

/// GET /admin
#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> DashboardTemplate {
    let context = state.context();
    let cars = context.cars().await;
    let orders = context.orders().await;
    let currency = state.settings().current().await.currency_symbol;

    let mut popular: Vec<_> = cars.iter().collect();
    popular.sort_by(|a, b| b.views.cmp(&a.views));
    let popular = popular
        .into_iter()
        .take(TOP_LIMIT)
        .map(|car| PopularCarView {
            id: car.id.to_string(),
            title: car.title(),
            price: format_amount(car.price.final_price(), &currency),
            views: car.views,
        })
        .collect();

    // Orders are kept newest first
    let recent_orders = orders
        .iter()
        .take(TOP_LIMIT)
        .map(|order| RecentOrderView {
            customer_name: order.customer_name.clone(),
            car: order
                .car
                .as_ref()
                .map_or_else(|| order.car_id.to_string(), |car| car.title()),
            status: order.status.label(),
            created_at: order.created_at.format("%d.%m.%Y %H:%M").to_string(),
        })
        .collect();

    DashboardTemplate {
        page: AdminPage::build(&state, &admin, "/admin").await,
        metrics: DashboardMetrics::compute(&cars, &orders),
        load_state: context.load_state().await.as_str(),
        popular,
        recent_orders,
    }
}
