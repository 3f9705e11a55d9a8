//! Vehicles listed in the public catalog.
//!
//! Cars are created and edited only through the admin back-office; the public
//! catalog reads them. JSON uses camelCase field names so exported files stay
//! readable by the existing import tooling (`fuelType`, `bodyType`, `isNew`).

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::CarId;
use super::price::CarPrice;

/// Defines a lowercase-serialized vehicle attribute enum with label and parsing.
macro_rules! vehicle_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => ($wire:literal, $label:literal)),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in display order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire representation (matches the serde form).
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            /// Human readable label for the catalog.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(format!(concat!("invalid ", stringify!($name), ": {}"), other)),
                }
            }
        }
    };
}

vehicle_enum! {
    /// Fuel the engine runs on.
    FuelType {
        Petrol => ("petrol", "Petrol"),
        Diesel => ("diesel", "Diesel"),
        Hybrid => ("hybrid", "Hybrid"),
        Electric => ("electric", "Electric"),
        Gas => ("gas", "Gas"),
    }
}

vehicle_enum! {
    /// Gearbox type.
    Transmission {
        Manual => ("manual", "Manual"),
        Automatic => ("automatic", "Automatic"),
        Robot => ("robot", "Robotized"),
        Cvt => ("cvt", "CVT"),
    }
}

vehicle_enum! {
    /// Driven wheels.
    Drivetrain {
        Fwd => ("fwd", "Front-wheel drive"),
        Rwd => ("rwd", "Rear-wheel drive"),
        Awd => ("awd", "All-wheel drive"),
    }
}

vehicle_enum! {
    /// Body style.
    BodyType {
        Sedan => ("sedan", "Sedan"),
        Hatchback => ("hatchback", "Hatchback"),
        Suv => ("suv", "SUV"),
        Crossover => ("crossover", "Crossover"),
        Coupe => ("coupe", "Coupe"),
        Wagon => ("wagon", "Wagon"),
        Pickup => ("pickup", "Pickup"),
        Minivan => ("minivan", "Minivan"),
        Convertible => ("convertible", "Convertible"),
    }
}

/// Engine characteristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engine {
    /// Displacement in litres (0 for electric cars).
    pub displacement: f64,
    /// Power in horsepower.
    pub power: u32,
    pub fuel_type: FuelType,
}

/// A car as stored remotely and shown in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: CarId,
    pub brand: String,
    pub model: String,
    pub year: u16,
    pub engine: Engine,
    pub transmission: Transmission,
    pub drivetrain: Drivetrain,
    pub body_type: BodyType,
    pub price: CarPrice,
    /// Image URLs; the first one is the thumbnail.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub mileage: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub views: u64,
    pub created_at: DateTime<Utc>,
}

impl Car {
    /// "Brand Model" for titles and notifications.
    #[must_use]
    pub fn title(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    /// First image, used as the catalog thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// The editable part of this car.
    #[must_use]
    pub fn to_draft(&self) -> CarDraft {
        CarDraft {
            brand: self.brand.clone(),
            model: self.model.clone(),
            year: self.year,
            engine: self.engine.clone(),
            transmission: self.transmission,
            drivetrain: self.drivetrain,
            body_type: self.body_type,
            price: self.price,
            images: self.images.clone(),
            is_new: self.is_new,
            mileage: self.mileage,
            color: self.color.clone(),
            description: self.description.clone(),
        }
    }
}

/// A rule a [`CarDraft`] breaks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CarValidationError {
    #[error("brand is required")]
    MissingBrand,
    #[error("model is required")]
    MissingModel,
    #[error("year {year} is outside {min}..={max}")]
    YearOutOfRange { year: u16, min: u16, max: u16 },
    #[error("price must not be negative")]
    NegativePrice,
    #[error("discount must be between 0 and the base price")]
    InvalidDiscount,
}

/// Car fields supplied by the admin form or an import file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarDraft {
    pub brand: String,
    pub model: String,
    pub year: u16,
    pub engine: Engine,
    pub transmission: Transmission,
    pub drivetrain: Drivetrain,
    pub body_type: BodyType,
    pub price: CarPrice,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub mileage: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CarDraft {
    /// Oldest model year the catalog accepts.
    pub const MIN_YEAR: u16 = 1900;

    /// Check the draft against the catalog rules, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns all violated rules, in field order.
    pub fn validate(&self) -> Result<(), Vec<CarValidationError>> {
        let mut errors = Vec::new();

        if self.brand.trim().is_empty() {
            errors.push(CarValidationError::MissingBrand);
        }
        if self.model.trim().is_empty() {
            errors.push(CarValidationError::MissingModel);
        }

        let max_year = u16::try_from(Utc::now().year() + 1).unwrap_or(u16::MAX);
        if !(Self::MIN_YEAR..=max_year).contains(&self.year) {
            errors.push(CarValidationError::YearOutOfRange {
                year: self.year,
                min: Self::MIN_YEAR,
                max: max_year,
            });
        }

        if self.price.base < Decimal::ZERO {
            errors.push(CarValidationError::NegativePrice);
        } else if self.price.discount < Decimal::ZERO || self.price.discount > self.price.base {
            errors.push(CarValidationError::InvalidDiscount);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Materialize the draft as a stored car.
    #[must_use]
    pub fn into_car(self, id: CarId, created_at: DateTime<Utc>) -> Car {
        Car {
            id,
            brand: self.brand.trim().to_string(),
            model: self.model.trim().to_string(),
            year: self.year,
            engine: self.engine,
            transmission: self.transmission,
            drivetrain: self.drivetrain,
            body_type: self.body_type,
            price: self.price,
            images: self.images,
            is_new: self.is_new,
            mileage: self.mileage,
            color: self.color,
            description: self.description,
            views: 0,
            created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn draft() -> CarDraft {
        CarDraft {
            brand: "Toyota".to_string(),
            model: "Camry".to_string(),
            year: 2022,
            engine: Engine {
                displacement: 2.5,
                power: 200,
                fuel_type: FuelType::Petrol,
            },
            transmission: Transmission::Automatic,
            drivetrain: Drivetrain::Fwd,
            body_type: BodyType::Sedan,
            price: CarPrice::new(Decimal::new(3_200_000, 0), Decimal::new(100_000, 0)),
            images: vec!["https://cdn.example.com/camry.jpg".to_string()],
            is_new: true,
            mileage: 0,
            color: None,
            description: None,
        }
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut bad = draft();
        bad.brand = "  ".to_string();
        bad.model = String::new();
        bad.year = 1800;
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.first(), Some(&CarValidationError::MissingBrand));
    }

    #[test]
    fn test_validate_discount() {
        let mut bad = draft();
        bad.price.discount = Decimal::new(5_000_000, 0);
        assert_eq!(bad.validate().unwrap_err(), vec![CarValidationError::InvalidDiscount]);
    }

    #[test]
    fn test_json_uses_camel_case() {
        let car = draft().into_car(CarId::generate(), Utc::now());
        let json = serde_json::to_value(&car).unwrap();
        assert_eq!(json["bodyType"], "sedan");
        assert_eq!(json["engine"]["fuelType"], "petrol");
        assert_eq!(json["isNew"], true);
        assert_eq!(car.thumbnail(), Some("https://cdn.example.com/camry.jpg"));
    }

    #[test]
    fn test_enum_parse_is_case_insensitive() {
        assert_eq!("SUV".parse::<BodyType>().unwrap(), BodyType::Suv);
        assert!("hovercraft".parse::<BodyType>().is_err());
        assert_eq!(Transmission::Cvt.label(), "CVT");
    }
}
