//! Order list and status changes.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::{Order, OrderId, OrderStatus};
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use super::AdminPage;
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::routes::views::SelectOption;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/orders", get(index))
        .route("/admin/orders/{id}/status", post(update_status))
}

/// Order row.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub car: String,
    pub car_href: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub message: Option<String>,
    pub status: OrderStatus,
    pub created_at: String,
    pub statuses: Vec<SelectOption>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            car: order
                .car
                .as_ref()
                .map_or_else(|| "Deleted car".to_string(), |car| car.title()),
            car_href: format!("/cars/{}", order.car_id),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            customer_email: order.customer_email.as_ref().map(ToString::to_string),
            message: order.message.clone(),
            status: order.status,
            created_at: order.created_at.format("%d.%m.%Y %H:%M").to_string(),
            statuses: status_options(Some(order.status)),
        }
    }
}

fn status_options(selected: Option<OrderStatus>) -> Vec<SelectOption> {
    OrderStatus::ALL
        .iter()
        .map(|&status| SelectOption::new(status.as_str(), status.label(), selected == Some(status)))
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/orders.html")]
pub struct OrdersTemplate {
    pub page: AdminPage,
    pub orders: Vec<OrderRow>,
    pub filter: Vec<SelectOption>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<OrderStatus>,
}

/// Treat `?status=` (the "all" option) as no filter.
fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<OrderStatus>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Pull fresh orders, then list them.
///
/// GET /admin/orders
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<OrdersQuery>,
) -> OrdersTemplate {
    let context = state.context();
    context.load_orders(&state.request_token()).await;

    let all = context.orders().await;
    let orders: Vec<OrderRow> = all
        .iter()
        .filter(|order| query.status.is_none_or(|status| order.status == status))
        .map(OrderRow::from)
        .collect();

    OrdersTemplate {
        page: AdminPage::build(&state, &admin, "/admin/orders").await,
        orders,
        filter: status_options(query.status),
        total: all.len(),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: OrderStatus,
}

/// POST /admin/orders/{id}/status
#[instrument(skip(state, admin))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let order = state
        .context()
        .update_order_status(id, form.status, &state.request_token())
        .await?;
    tracing::info!(order_id = %order.id, status = %order.status, admin = %admin.email, "Order status changed");
    Ok(Redirect::to("/admin/orders"))
}
