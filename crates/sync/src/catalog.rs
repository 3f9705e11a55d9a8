//! Catalog browsing over the in-memory car list: filters, sorting,
//! pagination and the compare list.

use std::fmt::Display;
use std::str::FromStr;

use autosalon_core::{BodyType, Car, CarId, FuelType, Transmission};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Treat empty query-string values (`?brand=`) as absent.
fn empty_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Catalog filter as submitted by the filter form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFilter {
    #[serde(deserialize_with = "empty_as_none")]
    pub brand: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub body_type: Option<BodyType>,
    #[serde(deserialize_with = "empty_as_none")]
    pub fuel_type: Option<FuelType>,
    #[serde(deserialize_with = "empty_as_none")]
    pub transmission: Option<Transmission>,
    #[serde(deserialize_with = "empty_as_none")]
    pub min_price: Option<Decimal>,
    #[serde(deserialize_with = "empty_as_none")]
    pub max_price: Option<Decimal>,
    #[serde(deserialize_with = "empty_as_none")]
    pub min_year: Option<u16>,
    #[serde(deserialize_with = "empty_as_none")]
    pub max_year: Option<u16>,
    pub only_new: bool,
    /// Free-text search over brand, model and description.
    #[serde(deserialize_with = "empty_as_none")]
    pub query: Option<String>,
}

impl CatalogFilter {
    /// Whether `car` passes every set criterion. Prices compare against the final price.
    #[must_use]
    pub fn matches(&self, car: &Car) -> bool {
        let price = car.price.final_price();

        if let Some(brand) = &self.brand
            && !car.brand.eq_ignore_ascii_case(brand.trim())
        {
            return false;
        }
        if self.body_type.is_some_and(|b| b != car.body_type)
            || self.fuel_type.is_some_and(|f| f != car.engine.fuel_type)
            || self.transmission.is_some_and(|t| t != car.transmission)
            || self.min_price.is_some_and(|min| price < min)
            || self.max_price.is_some_and(|max| price > max)
            || self.min_year.is_some_and(|min| car.year < min)
            || self.max_year.is_some_and(|max| car.year > max)
            || (self.only_new && !car.is_new)
        {
            return false;
        }
        if let Some(query) = &self.query {
            let query = query.to_lowercase();
            let haystack = format!(
                "{} {} {}",
                car.brand,
                car.model,
                car.description.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            if !query.split_whitespace().all(|word| haystack.contains(word)) {
                return false;
            }
        }
        true
    }

    /// Whether any criterion is set.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self != &Self::default()
    }
}

/// Catalog ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    YearDesc,
    MileageAsc,
    Popular,
}

impl CatalogSort {
    pub const ALL: [Self; 6] = [
        Self::Newest,
        Self::PriceAsc,
        Self::PriceDesc,
        Self::YearDesc,
        Self::MileageAsc,
        Self::Popular,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::YearDesc => "year_desc",
            Self::MileageAsc => "mileage_asc",
            Self::Popular => "popular",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest first",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::YearDesc => "Year: newest",
            Self::MileageAsc => "Lowest mileage",
            Self::Popular => "Most viewed",
        }
    }

    fn sort(self, cars: &mut [&Car]) {
        match self {
            Self::Newest => cars.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            Self::PriceAsc => cars.sort_by_key(|c| c.price.final_price()),
            Self::PriceDesc => cars.sort_by(|a, b| b.price.final_price().cmp(&a.price.final_price())),
            Self::YearDesc => cars.sort_by(|a, b| b.year.cmp(&a.year)),
            Self::MileageAsc => cars.sort_by_key(|c| c.mileage),
            Self::Popular => cars.sort_by(|a, b| b.views.cmp(&a.views)),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number, clamped to the last page.
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Filter, sort and paginate `cars`.
#[must_use]
pub fn browse(
    cars: &[Car],
    filter: &CatalogFilter,
    sort: CatalogSort,
    page: usize,
    per_page: usize,
) -> Page<Car> {
    let per_page = per_page.max(1);
    let mut matching: Vec<&Car> = cars.iter().filter(|car| filter.matches(car)).collect();
    sort.sort(&mut matching);

    let total = matching.len();
    let total_pages = total.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let items = matching
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    Page {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}

/// Distinct brands, sorted, for the filter dropdown.
#[must_use]
pub fn brands(cars: &[Car]) -> Vec<String> {
    let mut brands: Vec<String> = cars.iter().map(|car| car.brand.clone()).collect();
    brands.sort_by_key(|b| b.to_lowercase());
    brands.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    brands
}

/// Returned when adding to a full compare list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("compare list is full ({max} cars)")]
pub struct CompareFull {
    pub max: usize,
}

/// Cars a visitor picked for side-by-side comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareList {
    ids: Vec<CarId>,
}

impl CompareList {
    pub const MAX: usize = 3;

    /// Add or remove `id`, returning whether it is now in the list.
    ///
    /// # Errors
    ///
    /// Returns [`CompareFull`] when adding to a list that already has [`Self::MAX`] cars.
    pub fn toggle(&mut self, id: CarId) -> Result<bool, CompareFull> {
        if let Some(pos) = self.ids.iter().position(|&existing| existing == id) {
            self.ids.remove(pos);
            return Ok(false);
        }
        if self.ids.len() >= Self::MAX {
            return Err(CompareFull { max: Self::MAX });
        }
        self.ids.push(id);
        Ok(true)
    }

    #[must_use]
    pub fn contains(&self, id: CarId) -> bool {
        self.ids.contains(&id)
    }

    #[must_use]
    pub fn ids(&self) -> &[CarId] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drop ids of cars that no longer exist.
    pub fn retain_known(&mut self, cars: &[Car]) {
        self.ids.retain(|id| cars.iter().any(|car| car.id == *id));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use autosalon_core::{CarDraft, CarPrice, Drivetrain, Engine};
    use chrono::{Duration, Utc};

    use super::*;

    fn car(brand: &str, model: &str, price: i64, year: u16, age_days: i64) -> Car {
        CarDraft {
            brand: brand.into(),
            model: model.into(),
            year,
            engine: Engine {
                displacement: 1.6,
                power: 123,
                fuel_type: FuelType::Petrol,
            },
            transmission: Transmission::Automatic,
            drivetrain: Drivetrain::Fwd,
            body_type: BodyType::Sedan,
            price: CarPrice::new(Decimal::new(price, 0), Decimal::ZERO),
            images: vec![],
            is_new: year >= 2024,
            mileage: 0,
            color: None,
            description: None,
        }
        .into_car(CarId::generate(), Utc::now() - Duration::days(age_days))
    }

    fn fleet() -> Vec<Car> {
        vec![
            car("Kia", "Rio", 1_500_000, 2022, 3),
            car("Hyundai", "Solaris", 1_400_000, 2021, 2),
            car("Kia", "K5", 2_900_000, 2024, 1),
            car("Toyota", "Camry", 3_300_000, 2024, 5),
        ]
    }

    #[test]
    fn test_filter_by_brand_and_price() {
        let filter = CatalogFilter {
            brand: Some("kia".into()),
            max_price: Some(Decimal::new(2_000_000, 0)),
            ..CatalogFilter::default()
        };
        let page = browse(&fleet(), &filter, CatalogSort::Newest, 1, 10);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].model, "Rio");
    }

    #[test]
    fn test_query_matches_all_words() {
        let filter = CatalogFilter {
            query: Some("kia k5".into()),
            ..CatalogFilter::default()
        };
        let page = browse(&fleet(), &filter, CatalogSort::Newest, 1, 10);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_sort_and_paginate() {
        let page = browse(&fleet(), &CatalogFilter::default(), CatalogSort::PriceAsc, 2, 3);
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].model, "Camry");
        assert!(page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn test_page_is_clamped() {
        let page = browse(&fleet(), &CatalogFilter::default(), CatalogSort::Newest, 99, 3);
        assert_eq!(page.page, 2);
        let empty = browse(&[], &CatalogFilter::default(), CatalogSort::Newest, 0, 3);
        assert_eq!(empty.page, 1);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }

    #[test]
    fn test_empty_query_values_are_ignored() {
        let filter: CatalogFilter =
            serde_json::from_value(serde_json::json!({ "brand": "", "min_price": " ", "only_new": true }))
                .unwrap();
        assert_eq!(filter.brand, None);
        assert_eq!(filter.min_price, None);
        assert!(filter.only_new);
    }

    #[test]
    fn test_brands_are_distinct() {
        assert_eq!(brands(&fleet()), vec!["Hyundai", "Kia", "Toyota"]);
    }

    #[test]
    fn test_compare_list_caps_at_three() {
        let mut list = CompareList::default();
        let ids: Vec<CarId> = (0..4).map(|_| CarId::generate()).collect();
        for id in &ids[..3] {
            assert!(list.toggle(*id).unwrap());
        }
        assert_eq!(list.toggle(ids[3]), Err(CompareFull { max: 3 }));
        assert!(!list.toggle(ids[0]).unwrap());
        assert!(list.toggle(ids[3]).unwrap());
        assert_eq!(list.len(), 3);
    }
}
