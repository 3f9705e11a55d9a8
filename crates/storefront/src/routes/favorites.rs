//! Visitor favorites.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::CarId;
use autosalon_sync::FavoritesWrite;
use axum::{
    Json,
    extract::{Path, State},
    response::{AppendHeaders, IntoResponse},
};
use serde::Serialize;
use tracing::instrument;

use super::views::{CarView, Layout};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::Visitor;
use crate::state::AppState;

/// Favorites page template.
#[derive(Template, WebTemplate)]
#[template(path = "favorites.html")]
pub struct FavoritesTemplate {
    pub layout: Layout,
    pub cars: Vec<CarView>,
}

/// Response of a favorite toggle.
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub car_id: CarId,
    pub is_favorite: bool,
    pub write: FavoritesWrite,
    pub count: usize,
}

/// Display the visitor's favorite cars.
///
/// GET /favorites
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, visitor: Visitor) -> Result<FavoritesTemplate> {
    let context = state.context();
    let cancel = state.request_token();

    let favorites = context.refresh_favorites(&visitor.owner, &cancel).await;
    let compare = visitor.compare_list().await?;
    let layout = Layout::build(&state, &favorites, &compare).await;

    // Favorites pointing at cars that no longer exist are not shown
    let cars: Vec<_> = context
        .cars()
        .await
        .into_iter()
        .filter(|car| favorites.contains(car.id))
        .collect();

    Ok(FavoritesTemplate {
        cars: CarView::list(&cars, &layout.site.currency_symbol, &favorites, &compare),
        layout,
    })
}

/// Add or remove a car from the visitor's favorites.
///
/// POST /api/favorites/{id}/toggle
#[instrument(skip(state, visitor))]
pub async fn toggle(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<CarId>,
) -> Result<impl IntoResponse> {
    let context = state.context();
    if context.car(id).await.is_none() {
        return Err(AppError::NotFound(format!("car {id}")));
    }

    let cancel = state.request_token();
    let result = context.toggle_favorite(&visitor.owner, id, &cancel).await;
    let count = context.favorites(&visitor.owner, &cancel).await.len();

    if result.write == FavoritesWrite::RolledBack {
        tracing::warn!("Favorite change was not saved");
    }

    Ok((
        AppendHeaders([("HX-Trigger", "favorites-updated")]),
        Json(ToggleResponse {
            car_id: id,
            is_favorite: result.is_favorite,
            write: result.write,
            count,
        }),
    ))
}
