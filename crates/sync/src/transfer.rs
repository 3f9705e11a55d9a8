//! JSON import/export of the car list.
//!
//! Export is the in-memory list as a pretty-printed JSON array of [`Car`]s.
//! Import accepts the same shape: ids, view counts and creation timestamps
//! are optional and kept when present, so importing an export reproduces the
//! same list. Each record is checked on its own; one bad record never aborts
//! the batch.

use autosalon_core::{Car, CarDraft, CarId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::join_errors;

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// One message per failed record, `Record N: reason` with `N` 1-based.
    pub errors: Vec<String>,
}

impl ImportReport {
    pub(crate) fn record_failure(&mut self, index: usize, reason: impl std::fmt::Display) {
        self.failed += 1;
        self.errors.push(format!("Record {}: {reason}", index + 1));
    }
}

/// One car record of an import file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRecord {
    #[serde(default)]
    id: Option<CarId>,
    #[serde(default)]
    views: Option<u64>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    draft: CarDraft,
}

/// Serialize cars for export.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn export_cars(cars: &[Car]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(cars)
}

/// Parse an import file into per-record results.
///
/// # Errors
///
/// Returns a message when the input is not a JSON array at all.
pub fn parse_import(data: &str, now: DateTime<Utc>) -> Result<Vec<Result<Car, String>>, String> {
    let records: Vec<serde_json::Value> =
        serde_json::from_str(data).map_err(|e| format!("Invalid JSON: expected an array of cars ({e})"))?;

    Ok(records.into_iter().map(|value| parse_record(value, now)).collect())
}

fn parse_record(value: serde_json::Value, now: DateTime<Utc>) -> Result<Car, String> {
    if !value.is_object() {
        return Err("expected an object".to_string());
    }
    let record: ImportRecord = serde_json::from_value(value).map_err(|e| e.to_string())?;
    record.draft.validate().map_err(|errors| join_errors(&errors))?;

    let mut car = record
        .draft
        .into_car(record.id.unwrap_or_else(CarId::generate), record.created_at.unwrap_or(now));
    car.views = record.views.unwrap_or(0);
    Ok(car)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(brand: &str) -> serde_json::Value {
        serde_json::json!({
            "brand": brand,
            "model": "Octavia",
            "year": 2020,
            "engine": { "displacement": 1.4, "power": 150, "fuelType": "petrol" },
            "transmission": "robot",
            "drivetrain": "fwd",
            "bodyType": "hatchback",
            "price": { "base": "1850000", "discount": "0" }
        })
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(parse_import("{\"brand\": \"Skoda\"}", Utc::now()).is_err());
        assert!(parse_import("not json", Utc::now()).is_err());
    }

    #[test]
    fn test_per_record_results() {
        let mut missing_brand = record("Skoda");
        missing_brand.as_object_mut().unwrap().remove("brand");
        let data = serde_json::json!([record("Skoda"), missing_brand, record("  "), 42]).to_string();

        let results = parse_import(&data, Utc::now()).unwrap();
        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().contains("brand"));
        assert_eq!(results[2].as_ref().unwrap_err(), "brand is required");
        assert_eq!(results[3].as_ref().unwrap_err(), "expected an object");
    }

    #[test]
    fn test_export_then_parse_keeps_ids() {
        let car = parse_record(record("Skoda"), Utc::now()).unwrap();
        let exported = export_cars(std::slice::from_ref(&car)).unwrap();
        let reparsed = parse_import(&exported, Utc::now()).unwrap();
        assert_eq!(reparsed[0].as_ref().unwrap(), &car);
    }

    #[test]
    fn test_report_numbers_records_from_one() {
        let mut report = ImportReport::default();
        report.record_failure(3, "brand is required");
        assert_eq!(report.errors, vec!["Record 4: brand is required"]);
        assert_eq!(report.failed, 1);
    }
}
