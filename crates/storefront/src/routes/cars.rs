//! Car detail page.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::CarId;
use axum::extract::{Path, State};
use tracing::instrument;

use super::views::{CarView, Layout};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::Visitor;
use crate::state::AppState;

/// Car detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "cars/show.html")]
pub struct CarShowTemplate {
    pub layout: Layout,
    pub car: CarView,
    pub similar: Vec<CarView>,
}

const SIMILAR_LIMIT: usize = 4;

/// Display one car and record the view.
///
/// GET /cars/{id}
#[instrument(skip(state, visitor))]
pub async fn show(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<CarId>,
) -> Result<CarShowTemplate> {
    let context = state.context();
    let cancel = state.request_token();

    let car = context
        .view_car(id, &cancel)
        .await
        .ok_or_else(|| AppError::NotFound(format!("car {id}")))?;

    let favorites = context.favorites(&visitor.owner, &cancel).await;
    let compare = visitor.compare_list().await?;
    let layout = Layout::build(&state, &favorites, &compare).await;
    let currency = layout.site.currency_symbol.clone();

    let similar: Vec<_> = context
        .cars()
        .await
        .into_iter()
        .filter(|other| other.id != car.id && other.body_type == car.body_type)
        .take(SIMILAR_LIMIT)
        .collect();

    Ok(CarShowTemplate {
        car: CarView::new(&car, &currency, &favorites, &compare),
        similar: CarView::list(&similar, &currency, &favorites, &compare),
        layout,
    })
}
