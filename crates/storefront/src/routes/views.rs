//! Display models shared by page templates.

use autosalon_core::{Car, FavoriteSet, format_amount};
use autosalon_sync::{CompareList, LoadState, SiteSettings};

use crate::state::AppState;

/// Data every public page renders in its header and footer.
#[derive(Clone)]
pub struct Layout {
    pub site: SiteSettings,
    pub online: bool,
    /// Reason the car list failed to load, shown with a retry button.
    pub load_error: Option<String>,
    pub favorites_count: usize,
    pub compare_count: usize,
}

impl Layout {
    pub async fn build(state: &AppState, favorites: &FavoriteSet, compare: &CompareList) -> Self {
        let load_error = match state.context().load_state().await {
            LoadState::Error(reason) => Some(reason),
            _ => None,
        };
        Self {
            site: state.settings().current().await,
            online: state.monitor().is_online(),
            load_error,
            favorites_count: favorites.len(),
            compare_count: compare.len(),
        }
    }
}

/// A car as shown on cards and detail pages.
#[derive(Clone)]
pub struct CarView {
    pub id: String,
    pub title: String,
    pub year: u16,
    pub price: String,
    /// Base price, set only when a discount applies.
    pub old_price: Option<String>,
    pub discount_percent: u32,
    pub thumbnail: Option<String>,
    pub images: Vec<String>,
    pub mileage: String,
    pub engine: String,
    pub fuel: &'static str,
    pub transmission: &'static str,
    pub drivetrain: &'static str,
    pub body: &'static str,
    pub color: Option<String>,
    pub description: Option<String>,
    pub is_new: bool,
    pub views: u64,
    pub is_favorite: bool,
    pub in_compare: bool,
}

impl CarView {
    #[must_use]
    pub fn new(car: &Car, currency: &str, favorites: &FavoriteSet, compare: &CompareList) -> Self {
        let engine = if car.engine.displacement > 0.0 {
            format!("{:.1} L, {} hp", car.engine.displacement, car.engine.power)
        } else {
            format!("{} hp", car.engine.power)
        };

        Self {
            id: car.id.to_string(),
            title: car.title(),
            year: car.year,
            price: format_amount(car.price.final_price(), currency),
            old_price: car
                .price
                .has_discount()
                .then(|| format_amount(car.price.base, currency)),
            discount_percent: car.price.discount_percent(),
            thumbnail: car.thumbnail().map(str::to_string),
            images: car.images.clone(),
            mileage: format!("{} km", format_amount(car.mileage.into(), "")),
            engine,
            fuel: car.engine.fuel_type.label(),
            transmission: car.transmission.label(),
            drivetrain: car.drivetrain.label(),
            body: car.body_type.label(),
            color: car.color.clone(),
            description: car.description.clone(),
            is_new: car.is_new,
            views: car.views,
            is_favorite: favorites.contains(car.id),
            in_compare: compare.contains(car.id),
        }
    }

    /// Views for a list of cars.
    #[must_use]
    pub fn list(cars: &[Car], currency: &str, favorites: &FavoriteSet, compare: &CompareList) -> Vec<Self> {
        cars.iter()
            .map(|car| Self::new(car, currency, favorites, compare))
            .collect()
    }
}

/// A `<select>` option.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use autosalon_core::{
        BodyType, CarDraft, CarId, CarPrice, Drivetrain, Engine, FuelType, Transmission,
    };
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_car_view_formats_prices() {
        let car = CarDraft {
            brand: "Kia".into(),
            model: "Sportage".into(),
            year: 2023,
            engine: Engine {
                displacement: 2.0,
                power: 150,
                fuel_type: FuelType::Petrol,
            },
            transmission: Transmission::Automatic,
            drivetrain: Drivetrain::Awd,
            body_type: BodyType::Crossover,
            price: CarPrice::new(Decimal::new(3_000_000, 0), Decimal::new(300_000, 0)),
            images: vec![],
            is_new: true,
            mileage: 12_500,
            color: None,
            description: None,
        }
        .into_car(CarId::generate(), Utc::now());

        let mut favorites = FavoriteSet::new();
        favorites.insert(car.id);
        let view = CarView::new(&car, "₽", &favorites, &CompareList::default());

        assert_eq!(view.price, "2 700 000 ₽");
        assert_eq!(view.old_price.as_deref(), Some("3 000 000 ₽"));
        assert_eq!(view.discount_percent, 10);
        assert_eq!(view.mileage, "12 500 km");
        assert_eq!(view.engine, "2.0 L, 150 hp");
        assert!(view.is_favorite);
        assert!(!view.in_compare);
    }
}
