//! Back-office route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /admin/login               - Login page
//! POST /admin/login               - Password sign-in (rate limited)
//! POST /admin/logout              - Logout
//!
//! GET  /admin                     - Dashboard
//!
//! # Cars (admin role)
//! GET  /admin/cars                - Car list
//! POST /admin/cars                - Create car
//! GET  /admin/cars/new            - New car form
//! GET  /admin/cars/{id}/edit      - Edit form
//! POST /admin/cars/{id}           - Update car
//! POST /admin/cars/{id}/delete    - Delete car
//! GET  /admin/cars/export         - Download the car list as JSON
//! GET  /admin/cars/import         - Import form
//! POST /admin/cars/import         - Import JSON (upload or pasted)
//! POST /admin/api/images          - Image upload, returns the public URL
//!
//! # Orders
//! GET  /admin/orders              - Order list
//! POST /admin/orders/{id}/status  - Change order status
//!
//! # Chat
//! GET  /admin/chat                - Conversations
//! POST /admin/chat/reply          - Reply to a conversation
//!
//! # Settings (admin role)
//! GET  /admin/settings            - Settings form
//! POST /admin/settings            - Save settings
//!
//! POST /admin/refresh             - Reload cars, orders and favorites
//! GET  /admin/api/status          - Badge counters for polling
//! ```
//!
//! Everything except the login routes sits behind [`require_admin`].

pub mod auth;
pub mod cars;
pub mod chat;
pub mod dashboard;
pub mod orders;
pub mod settings;

use autosalon_core::AdminRole;
use axum::{
    Json, Router,
    extract::State,
    middleware::from_fn,
    response::Redirect,
    routing::{get, post},
};
use serde::Serialize;
use tracing::instrument;

use crate::middleware::{RequireAdminAuth, require_admin};
use crate::models::CurrentAdmin;
use crate::state::AppState;

// =============================================================================
// Navigation
// =============================================================================

/// One entry of the back-office sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub href: &'static str,
    pub badge: Option<usize>,
}

/// Sidebar entries visible to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminNav {
    pub items: Vec<NavItem>,
}

impl AdminNav {
    /// Build the sidebar. Cars and Settings are only listed for roles that
    /// may use them; the Orders entry carries the count of new orders.
    #[must_use]
    pub fn for_role(role: AdminRole, new_orders: usize) -> Self {
        let item = |label, href| NavItem {
            label,
            href,
            badge: None,
        };

        let mut items = vec![item("Dashboard", "/admin")];
        if role.can_manage_inventory() {
            items.push(item("Cars", "/admin/cars"));
        }
        items.push(NavItem {
            badge: (new_orders > 0).then_some(new_orders),
            ..item("Orders", "/admin/orders")
        });
        items.push(item("Chat", "/admin/chat"));
        if role.can_edit_settings() {
            items.push(item("Settings", "/admin/settings"));
        }

        Self { items }
    }
}

/// Chrome shared by every back-office page.
#[derive(Debug, Clone)]
pub struct AdminPage {
    pub site_name: String,
    pub email: String,
    pub role: AdminRole,
    pub nav: AdminNav,
    pub current_path: &'static str,
    pub online: bool,
}

impl AdminPage {
    pub async fn build(state: &AppState, admin: &CurrentAdmin, current_path: &'static str) -> Self {
        let new_orders = state.context().new_order_count().await;
        Self {
            site_name: state.settings().current().await.site_name,
            email: admin.email.to_string(),
            role: admin.role,
            nav: AdminNav::for_role(admin.role, new_orders),
            current_path,
            online: state.monitor().is_online(),
        }
    }

    /// Whether a sidebar entry is the current section.
    #[must_use]
    pub fn is_active(&self, href: &str) -> bool {
        if href == "/admin" {
            self.current_path == href
        } else {
            self.current_path.starts_with(href)
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Build the back-office router.
///
/// Paths are absolute so the gate sees the full `/admin/...` URI.
pub fn router() -> Router<AppState> {
    let gated = Router::new()
        .merge(dashboard::router())
        .merge(cars::router())
        .merge(orders::router())
        .merge(chat::router())
        .merge(settings::router())
        .route("/admin/logout", post(auth::logout))
        .route("/admin/refresh", post(refresh))
        .route("/admin/api/status", get(status))
        .route_layer(from_fn(require_admin));

    Router::new().merge(auth::router()).merge(gated)
}

// =============================================================================
// Shared handlers
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AdminStatus {
    pub online: bool,
    pub new_orders: usize,
}

/// GET /admin/api/status
pub async fn status(State(state): State<AppState>, _admin: RequireAdminAuth) -> Json<AdminStatus> {
    Json(AdminStatus {
        online: state.monitor().is_online(),
        new_orders: state.context().new_order_count().await,
    })
}

/// Full reload of cars, orders and favorites.
///
/// POST /admin/refresh
#[instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, RequireAdminAuth(admin): RequireAdminAuth) -> Redirect {
    tracing::info!(admin = %admin.email, "Manual full resync");
    state.context().full_resync(&state.request_token()).await;
    Redirect::to("/admin")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(nav: &AdminNav) -> Vec<&'static str> {
        nav.items.iter().map(|item| item.label).collect()
    }

    #[test]
    fn test_admin_sees_every_section() {
        let nav = AdminNav::for_role(AdminRole::Admin, 0);
        assert_eq!(labels(&nav), ["Dashboard", "Cars", "Orders", "Chat", "Settings"]);
        assert!(nav.items.iter().all(|item| item.badge.is_none()));
    }

    #[test]
    fn test_manager_nav_hides_inventory_and_settings() {
        let nav = AdminNav::for_role(AdminRole::Manager, 3);
        assert_eq!(labels(&nav), ["Dashboard", "Orders", "Chat"]);

        let orders = nav.items.iter().find(|item| item.label == "Orders");
        assert_eq!(orders.and_then(|item| item.badge), Some(3));
    }

    #[test]
    fn test_active_section() {
        let page = AdminPage {
            site_name: String::new(),
            email: String::new(),
            role: AdminRole::Admin,
            nav: AdminNav::for_role(AdminRole::Admin, 0),
            current_path: "/admin/cars",
            online: true,
        };
        assert!(page.is_active("/admin/cars"));
        assert!(!page.is_active("/admin"));
    }
}
