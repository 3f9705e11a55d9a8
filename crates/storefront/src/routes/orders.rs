//! Customer inquiries ("orders") from the car page.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::{CarId, Email, NewOrder, Order};
use axum::{Form, extract::State};
use serde::Deserialize;
use tracing::instrument;

use super::views::Layout;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::Visitor;
use crate::state::AppState;

/// Inquiry form as posted by the browser. Blank optional fields arrive as
/// empty strings.
#[derive(Debug, Deserialize)]
pub struct OrderForm {
    pub car_id: CarId,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub message: String,
}

impl OrderForm {
    /// Convert to a [`NewOrder`], rejecting a malformed email.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] if a non-blank email does not parse.
    pub fn into_new_order(self) -> Result<NewOrder> {
        let email = self.customer_email.trim();
        let customer_email = if email.is_empty() {
            None
        } else {
            Some(Email::parse(email).map_err(|e| AppError::BadRequest(format!("email: {e}")))?)
        };
        let message = self.message.trim();

        Ok(NewOrder {
            car_id: self.car_id,
            customer_name: self.customer_name.trim().to_string(),
            customer_phone: self.customer_phone.trim().to_string(),
            customer_email,
            message: (!message.is_empty()).then(|| message.to_string()),
        })
    }
}

/// Confirmation page shown after an inquiry is accepted.
#[derive(Template, WebTemplate)]
#[template(path = "order_sent.html")]
pub struct OrderSentTemplate {
    pub layout: Layout,
    pub customer_name: String,
    pub car_title: String,
    pub car_id: String,
}

/// Send the sales team a Telegram notification without holding up the response.
fn notify_in_background(state: &AppState, order: Order) {
    let functions = state.functions().clone();
    let chat_ids = state.config().telegram_admin_chat_ids.clone();
    tokio::spawn(async move {
        if let Err(e) = functions.notify_order(&order, chat_ids.as_deref()).await {
            tracing::warn!(order_id = %order.id, error = %e, "Order notification failed");
        }
    });
}

/// Accept a customer inquiry.
///
/// POST /api/orders
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<OrderForm>,
) -> Result<OrderSentTemplate> {
    let new_order = form.into_new_order()?;
    let context = state.context();
    let cancel = state.request_token();

    let order = context.submit_order(new_order, &cancel).await?;
    tracing::info!(order_id = %order.id, car_id = %order.car_id, "Order received");

    let favorites = context.favorites(&visitor.owner, &cancel).await;
    let compare = visitor.compare_list().await?;
    let layout = Layout::build(&state, &favorites, &compare).await;

    let car_title = order
        .car
        .as_ref()
        .map(|car| car.title())
        .unwrap_or_default();
    let template = OrderSentTemplate {
        layout,
        customer_name: order.customer_name.clone(),
        car_title,
        car_id: order.car_id.to_string(),
    };

    notify_in_background(&state, order);
    Ok(template)
}
