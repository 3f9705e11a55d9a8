//! Side-by-side comparison of up to three cars.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::CarId;
use autosalon_sync::CompareList;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use super::views::{CarView, Layout};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::Visitor;
use crate::state::AppState;

/// Compare page template.
#[derive(Template, WebTemplate)]
#[template(path = "compare.html")]
pub struct CompareTemplate {
    pub layout: Layout,
    pub cars: Vec<CarView>,
    pub max: usize,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub car_id: CarId,
    pub in_compare: bool,
    pub count: usize,
    pub max: usize,
}

/// Display the compare table.
///
/// GET /compare
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, visitor: Visitor) -> Result<CompareTemplate> {
    let context = state.context();
    let cars = context.cars().await;

    let mut compare = visitor.compare_list().await?;
    let before = compare.len();
    compare.retain_known(&cars);
    if compare.len() != before {
        visitor.save_compare_list(&compare).await?;
    }

    let favorites = context.favorites(&visitor.owner, &state.request_token()).await;
    let layout = Layout::build(&state, &favorites, &compare).await;

    // Keep the order in which the visitor picked the cars
    let picked: Vec<_> = compare
        .ids()
        .iter()
        .filter_map(|id| cars.iter().find(|car| car.id == *id).cloned())
        .collect();

    Ok(CompareTemplate {
        cars: CarView::list(&picked, &layout.site.currency_symbol, &favorites, &compare),
        max: CompareList::MAX,
        layout,
    })
}

/// Add a car to the compare list or remove it.
///
/// POST /api/compare/{id}
#[instrument(skip(state, visitor))]
pub async fn toggle(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<CarId>,
) -> Result<Response> {
    if state.context().car(id).await.is_none() {
        return Err(AppError::NotFound(format!("car {id}")));
    }

    let mut compare = visitor.compare_list().await?;
    let in_compare = match compare.toggle(id) {
        Ok(in_compare) => in_compare,
        Err(full) => {
            return Ok((StatusCode::CONFLICT, full.to_string()).into_response());
        }
    };
    visitor.save_compare_list(&compare).await?;

    Ok(Json(CompareResponse {
        car_id: id,
        in_compare,
        count: compare.len(),
        max: CompareList::MAX,
    })
    .into_response())
}
