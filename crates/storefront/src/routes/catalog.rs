//! Public catalog: filter form, sorted and paginated car grid.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::{BodyType, FuelType, Transmission};
use autosalon_sync::catalog::{self, CatalogFilter, CatalogSort};
use autosalon_sync::{LoadState, ReloadTrigger};
use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::instrument;
use url::form_urlencoded;

use super::views::{CarView, Layout, SelectOption};
use crate::error::Result;
use crate::filters;
use crate::middleware::Visitor;
use crate::state::AppState;

/// Sort and page parameters, parsed separately from the filter.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogParams {
    pub sort: CatalogSort,
    pub page: Option<usize>,
}

/// Catalog page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/index.html")]
pub struct CatalogTemplate {
    pub layout: Layout,
    pub cars: Vec<CarView>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub filter: CatalogFilter,
    pub filter_active: bool,
    pub brands: Vec<SelectOption>,
    pub body_types: Vec<SelectOption>,
    pub fuel_types: Vec<SelectOption>,
    pub transmissions: Vec<SelectOption>,
    pub sorts: Vec<SelectOption>,
    pub loading: bool,
}

impl CatalogTemplate {
    /// Text value of an optional filter field for the form.
    fn field<T: ToString>(value: Option<&T>) -> String {
        value.map(ToString::to_string).unwrap_or_default()
    }

    pub fn query_value(&self) -> String {
        Self::field(self.filter.query.as_ref())
    }

    pub fn min_price_value(&self) -> String {
        Self::field(self.filter.min_price.as_ref())
    }

    pub fn max_price_value(&self) -> String {
        Self::field(self.filter.max_price.as_ref())
    }

    pub fn min_year_value(&self) -> String {
        Self::field(self.filter.min_year.as_ref())
    }

    pub fn max_year_value(&self) -> String {
        Self::field(self.filter.max_year.as_ref())
    }
}

/// Link to another page of the same filtered listing.
pub fn page_href(filter: &CatalogFilter, sort: CatalogSort, page: usize) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut put = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            query.append_pair(key, &value);
        }
    };

    put("brand", filter.brand.clone());
    put("body_type", filter.body_type.map(|v| v.as_str().to_string()));
    put("fuel_type", filter.fuel_type.map(|v| v.as_str().to_string()));
    put("transmission", filter.transmission.map(|v| v.as_str().to_string()));
    put("min_price", filter.min_price.map(|v| v.to_string()));
    put("max_price", filter.max_price.map(|v| v.to_string()));
    put("min_year", filter.min_year.map(|v| v.to_string()));
    put("max_year", filter.max_year.map(|v| v.to_string()));
    put("only_new", filter.only_new.then(|| "true".to_string()));
    put("query", filter.query.clone());
    put(
        "sort",
        (sort != CatalogSort::default()).then(|| sort.as_str().to_string()),
    );
    put("page", (page > 1).then(|| page.to_string()));

    let query = query.finish();
    if query.is_empty() {
        "/".to_string()
    } else {
        format!("/?{query}")
    }
}

fn options<T: Copy + PartialEq>(
    all: &[T],
    selected: Option<T>,
    value: impl Fn(T) -> &'static str,
    label: impl Fn(T) -> &'static str,
) -> Vec<SelectOption> {
    all.iter()
        .map(|&item| SelectOption::new(value(item), label(item), selected == Some(item)))
        .collect()
}

/// Display the catalog.
///
/// GET /
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(filter): Query<CatalogFilter>,
    Query(params): Query<CatalogParams>,
) -> Result<CatalogTemplate> {
    let context = state.context();
    let cancel = state.request_token();

    // A visit before startup loading finished starts it
    if context.load_state().await == LoadState::Uninitialized {
        context.reload_cars(ReloadTrigger::Navigation, &cancel).await;
    }

    let cars = context.cars().await;
    let favorites = context.favorites(&visitor.owner, &cancel).await;
    let compare = visitor.compare_list().await?;
    let layout = Layout::build(&state, &favorites, &compare).await;

    let page = catalog::browse(
        &cars,
        &filter,
        params.sort,
        params.page.unwrap_or(1),
        layout.site.cars_per_page,
    );

    let brands = catalog::brands(&cars)
        .into_iter()
        .map(|brand| {
            let selected = filter
                .brand
                .as_deref()
                .is_some_and(|b| b.eq_ignore_ascii_case(&brand));
            SelectOption::new(brand.clone(), brand, selected)
        })
        .collect();

    Ok(CatalogTemplate {
        cars: CarView::list(&page.items, &layout.site.currency_symbol, &favorites, &compare),
        total: page.total,
        previous_href: page
            .has_previous()
            .then(|| page_href(&filter, params.sort, page.page - 1)),
        next_href: page
            .has_next()
            .then(|| page_href(&filter, params.sort, page.page + 1)),
        page: page.page,
        total_pages: page.total_pages,
        filter_active: filter.is_active(),
        brands,
        body_types: options(BodyType::ALL, filter.body_type, BodyType::as_str, BodyType::label),
        fuel_types: options(FuelType::ALL, filter.fuel_type, FuelType::as_str, FuelType::label),
        transmissions: options(
            Transmission::ALL,
            filter.transmission,
            Transmission::as_str,
            Transmission::label,
        ),
        sorts: CatalogSort::ALL
            .iter()
            .map(|&sort| SelectOption::new(sort.as_str(), sort.label(), sort == params.sort))
            .collect(),
        loading: context.load_state().await == LoadState::Loading,
        filter,
        layout,
    })
}

/// Manual refresh of the car list, the retry path out of the error state.
///
/// POST /refresh
#[instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>) -> Redirect {
    let load_state = state.context().refresh(&state.request_token()).await;
    tracing::info!(state = load_state.as_str(), "Manual car list refresh");
    Redirect::to("/")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_page_href_keeps_filter() {
        let filter = CatalogFilter {
            brand: Some("Land Rover".into()),
            body_type: Some(BodyType::Suv),
            min_price: Some(Decimal::new(1_000_000, 0)),
            only_new: true,
            ..CatalogFilter::default()
        };
        assert_eq!(
            page_href(&filter, CatalogSort::PriceAsc, 2),
            "/?brand=Land+Rover&body_type=suv&min_price=1000000&only_new=true&sort=price_asc&page=2"
        );
    }

    #[test]
    fn test_page_href_first_page_is_root() {
        assert_eq!(page_href(&CatalogFilter::default(), CatalogSort::Newest, 1), "/");
    }
}
