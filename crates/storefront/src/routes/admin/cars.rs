//! Inventory management: car CRUD, JSON export/import and image upload.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::{
    BodyType, Car, CarDraft, CarId, CarPrice, DeleteOutcome, Drivetrain, Engine, FuelType,
    Transmission, format_amount,
};
use autosalon_sync::remote::{MAX_IMAGE_BYTES, storage_object_name};
use autosalon_sync::{ImportReport, SyncError};
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::AdminPage;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{ManageInventory, RequireRole};
use crate::models::CurrentAdmin;
use crate::routes::views::SelectOption;
use crate::state::AppState;

/// Multipart overhead allowed on top of the image itself.
const UPLOAD_SLACK: usize = 64 * 1024;

/// Import files are plain JSON; 5 MB is plenty for a dealership inventory.
const MAX_IMPORT_BYTES: usize = 5 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/cars", get(index).post(create))
        .route("/admin/cars/new", get(new_form))
        .route("/admin/cars/export", get(export))
        .route(
            "/admin/cars/import",
            get(import_form)
                .post(import)
                .layer(DefaultBodyLimit::max(MAX_IMPORT_BYTES)),
        )
        .route("/admin/cars/{id}", post(update))
        .route("/admin/cars/{id}/edit", get(edit_form))
        .route("/admin/cars/{id}/delete", post(delete))
        .route(
            "/admin/api/images",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + UPLOAD_SLACK)),
        )
}

// =============================================================================
// Form parsing
// =============================================================================

/// Car form as posted by the browser; every field arrives as text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CarForm {
    pub brand: String,
    pub model: String,
    pub year: String,
    pub displacement: String,
    pub power: String,
    pub fuel_type: String,
    pub transmission: String,
    pub drivetrain: String,
    pub body_type: String,
    pub base_price: String,
    pub discount: String,
    /// One image URL per line.
    pub images: String,
    /// Checkbox: present only when checked.
    pub is_new: Option<String>,
    pub mileage: String,
    pub color: String,
    pub description: String,
}

fn parse_field<T: FromStr>(errors: &mut Vec<String>, label: &str, value: &str) -> Option<T> {
    let value = value.trim();
    if value.is_empty() {
        errors.push(format!("{label} is required"));
        return None;
    }
    let parsed = value.parse().ok();
    if parsed.is_none() {
        errors.push(format!("{label}: '{value}' is not valid"));
    }
    parsed
}

/// Parse an optional numeric field, treating blank as `default`.
fn parse_or<T: FromStr>(errors: &mut Vec<String>, label: &str, value: &str, default: T) -> Option<T> {
    if value.trim().is_empty() {
        Some(default)
    } else {
        parse_field(errors, label, value)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl CarForm {
    /// Pre-filled form for an existing car.
    #[must_use]
    pub fn from_car(car: &Car) -> Self {
        Self {
            brand: car.brand.clone(),
            model: car.model.clone(),
            year: car.year.to_string(),
            displacement: car.engine.displacement.to_string(),
            power: car.engine.power.to_string(),
            fuel_type: car.engine.fuel_type.as_str().to_string(),
            transmission: car.transmission.as_str().to_string(),
            drivetrain: car.drivetrain.as_str().to_string(),
            body_type: car.body_type.as_str().to_string(),
            base_price: car.price.base.to_string(),
            discount: car.price.discount.to_string(),
            images: car.images.join("\n"),
            is_new: car.is_new.then(|| "on".to_string()),
            mileage: car.mileage.to_string(),
            color: car.color.clone().unwrap_or_default(),
            description: car.description.clone().unwrap_or_default(),
        }
    }

    /// Convert the text fields into a draft.
    ///
    /// Only checks that fields parse; catalog rules are checked by
    /// [`CarDraft::validate`] when the draft is saved.
    ///
    /// # Errors
    ///
    /// Returns one message per field that is missing or malformed.
    pub fn to_draft(&self) -> std::result::Result<CarDraft, Vec<String>> {
        let mut errors = Vec::new();

        let year = parse_field::<u16>(&mut errors, "Year", &self.year);
        let displacement = parse_or(&mut errors, "Engine displacement", &self.displacement, 0.0_f64);
        let power = parse_field::<u32>(&mut errors, "Power", &self.power);
        let fuel_type = parse_field::<FuelType>(&mut errors, "Fuel type", &self.fuel_type);
        let transmission = parse_field::<Transmission>(&mut errors, "Transmission", &self.transmission);
        let drivetrain = parse_field::<Drivetrain>(&mut errors, "Drivetrain", &self.drivetrain);
        let body_type = parse_field::<BodyType>(&mut errors, "Body type", &self.body_type);
        let base_price = parse_field::<Decimal>(&mut errors, "Price", &self.base_price);
        let discount = parse_or(&mut errors, "Discount", &self.discount, Decimal::ZERO);
        let mileage = parse_or(&mut errors, "Mileage", &self.mileage, 0_u32);

        let (
            Some(year),
            Some(displacement),
            Some(power),
            Some(fuel_type),
            Some(transmission),
            Some(drivetrain),
            Some(body_type),
            Some(base_price),
            Some(discount),
            Some(mileage),
        ) = (
            year,
            displacement,
            power,
            fuel_type,
            transmission,
            drivetrain,
            body_type,
            base_price,
            discount,
            mileage,
        )
        else {
            return Err(errors);
        };

        Ok(CarDraft {
            brand: self.brand.trim().to_string(),
            model: self.model.trim().to_string(),
            year,
            engine: Engine {
                displacement,
                power,
                fuel_type,
            },
            transmission,
            drivetrain,
            body_type,
            price: CarPrice::new(base_price, discount),
            images: self
                .images
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            is_new: self.is_new.is_some(),
            mileage,
            color: non_blank(&self.color),
            description: non_blank(&self.description),
        })
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Car list row.
#[derive(Debug, Clone)]
pub struct CarRow {
    pub id: String,
    pub title: String,
    pub year: u16,
    pub price: String,
    pub views: u64,
    pub is_new: bool,
    pub thumbnail: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/cars/index.html")]
pub struct CarsTemplate {
    pub page: AdminPage,
    pub cars: Vec<CarRow>,
    pub notice: Option<&'static str>,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/cars/form.html")]
pub struct CarFormTemplate {
    pub page: AdminPage,
    pub heading: String,
    pub action: String,
    pub form: CarForm,
    pub errors: Vec<String>,
    pub fuel_types: Vec<SelectOption>,
    pub transmissions: Vec<SelectOption>,
    pub drivetrains: Vec<SelectOption>,
    pub body_types: Vec<SelectOption>,
}

impl CarFormTemplate {
    async fn build(
        state: &AppState,
        admin: &CurrentAdmin,
        heading: String,
        action: String,
        form: CarForm,
        errors: Vec<String>,
    ) -> Self {
        fn options<T: Copy>(
            all: &[T],
            current: &str,
            value: impl Fn(T) -> &'static str,
            label: impl Fn(T) -> &'static str,
        ) -> Vec<SelectOption> {
            all.iter()
                .map(|&item| SelectOption::new(value(item), label(item), value(item) == current))
                .collect()
        }

        Self {
            page: AdminPage::build(state, admin, "/admin/cars").await,
            heading,
            action,
            fuel_types: options(FuelType::ALL, &form.fuel_type, FuelType::as_str, FuelType::label),
            transmissions: options(
                Transmission::ALL,
                &form.transmission,
                Transmission::as_str,
                Transmission::label,
            ),
            drivetrains: options(
                Drivetrain::ALL,
                &form.drivetrain,
                Drivetrain::as_str,
                Drivetrain::label,
            ),
            body_types: options(BodyType::ALL, &form.body_type, BodyType::as_str, BodyType::label),
            form,
            errors,
        }
    }

    fn into_invalid_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, self).into_response()
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/cars/import.html")]
pub struct ImportTemplate {
    pub page: AdminPage,
    pub report: Option<ImportReport>,
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct NoticeParams {
    pub notice: Option<String>,
}

fn notice_text(code: &str) -> Option<&'static str> {
    match code {
        "created" => Some("Car added"),
        "updated" => Some("Car updated"),
        "deleted" => Some("Car deleted"),
        "missing" => Some("That car no longer exists"),
        "delete_failed" => Some("The car could not be deleted, try again"),
        _ => None,
    }
}

/// GET /admin/cars
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
    Query(params): Query<NoticeParams>,
) -> CarsTemplate {
    let currency = state.settings().current().await.currency_symbol;
    let cars = state
        .context()
        .cars()
        .await
        .iter()
        .map(|car| CarRow {
            id: car.id.to_string(),
            title: car.title(),
            year: car.year,
            price: format_amount(car.price.final_price(), &currency),
            views: car.views,
            is_new: car.is_new,
            thumbnail: car.thumbnail().map(str::to_string),
        })
        .collect();

    CarsTemplate {
        page: AdminPage::build(&state, &admin, "/admin/cars").await,
        cars,
        notice: params.notice.as_deref().and_then(notice_text),
    }
}

/// GET /admin/cars/new
pub async fn new_form(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
) -> CarFormTemplate {
    let form = CarForm {
        fuel_type: FuelType::Petrol.as_str().to_string(),
        transmission: Transmission::Automatic.as_str().to_string(),
        drivetrain: Drivetrain::Fwd.as_str().to_string(),
        body_type: BodyType::Sedan.as_str().to_string(),
        is_new: Some("on".to_string()),
        ..CarForm::default()
    };
    CarFormTemplate::build(
        &state,
        &admin,
        "New car".to_string(),
        "/admin/cars".to_string(),
        form,
        Vec::new(),
    )
    .await
}

/// Messages for a rejected draft, or `None` for errors the form cannot fix.
fn form_errors(err: &SyncError) -> Option<Vec<String>> {
    match err {
        SyncError::InvalidCar(errors) => Some(errors.iter().map(ToString::to_string).collect()),
        _ => None,
    }
}

/// POST /admin/cars
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
    Form(form): Form<CarForm>,
) -> Result<Response> {
    let invalid = |form, errors| {
        CarFormTemplate::build(&state, &admin, "New car".to_string(), "/admin/cars".to_string(), form, errors)
    };

    let draft = match form.to_draft() {
        Ok(draft) => draft,
        Err(errors) => return Ok(invalid(form, errors).await.into_invalid_response()),
    };

    match state.context().add_car(draft, &state.request_token()).await {
        Ok(car) => {
            tracing::info!(car_id = %car.id, admin = %admin.email, "Car created");
            Ok(Redirect::to("/admin/cars?notice=created").into_response())
        }
        Err(e) => match form_errors(&e) {
            Some(errors) => Ok(invalid(form, errors).await.into_invalid_response()),
            None => Err(e.into()),
        },
    }
}

/// GET /admin/cars/{id}/edit
pub async fn edit_form(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
    Path(id): Path<CarId>,
) -> Result<CarFormTemplate> {
    let car = state
        .context()
        .car(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("car {id}")))?;

    Ok(CarFormTemplate::build(
        &state,
        &admin,
        format!("Edit {}", car.title()),
        format!("/admin/cars/{id}"),
        CarForm::from_car(&car),
        Vec::new(),
    )
    .await)
}

/// POST /admin/cars/{id}
#[instrument(skip(state, admin, form))]
pub async fn update(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
    Path(id): Path<CarId>,
    Form(form): Form<CarForm>,
) -> Result<Response> {
    let context = state.context();
    let existing = context
        .car(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("car {id}")))?;

    let invalid = |form, errors| {
        CarFormTemplate::build(
            &state,
            &admin,
            format!("Edit {}", existing.title()),
            format!("/admin/cars/{id}"),
            form,
            errors,
        )
    };

    let draft = match form.to_draft() {
        Ok(draft) => draft,
        Err(errors) => return Ok(invalid(form, errors).await.into_invalid_response()),
    };

    let mut car = draft.into_car(id, existing.created_at);
    car.views = existing.views;

    match context.update_car(car, &state.request_token()).await {
        Ok(_) => {
            tracing::info!(car_id = %id, admin = %admin.email, "Car updated");
            Ok(Redirect::to("/admin/cars?notice=updated").into_response())
        }
        Err(e) => match form_errors(&e) {
            Some(errors) => Ok(invalid(form, errors).await.into_invalid_response()),
            None => Err(e.into()),
        },
    }
}

/// POST /admin/cars/{id}/delete
#[instrument(skip(state, admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
    Path(id): Path<CarId>,
) -> Redirect {
    let outcome = state.context().delete_car(id, &state.request_token()).await;
    let notice = match outcome {
        DeleteOutcome::Success => {
            tracing::info!(car_id = %id, admin = %admin.email, "Car deleted");
            "deleted"
        }
        DeleteOutcome::NotFound => "missing",
        DeleteOutcome::Failure(reason) => {
            tracing::warn!(car_id = %id, reason = %reason, "Car delete failed");
            "delete_failed"
        }
    };
    Redirect::to(&format!("/admin/cars?notice={notice}"))
}

/// Download the car list as a JSON file.
///
/// GET /admin/cars/export
#[instrument(skip_all)]
pub async fn export(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
) -> Result<Response> {
    let data = state.context().export_cars_data().await?;
    let filename = format!("cars-{}.json", chrono::Utc::now().format("%Y-%m-%d"));
    tracing::info!(admin = %admin.email, bytes = data.len(), "Cars exported");

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        data,
    )
        .into_response())
}

/// GET /admin/cars/import
pub async fn import_form(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
) -> ImportTemplate {
    ImportTemplate {
        page: AdminPage::build(&state, &admin, "/admin/cars").await,
        report: None,
    }
}

fn multipart_error(err: &axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(err.body_text())
}

/// Import cars from an uploaded file (`file`) or pasted JSON (`data`).
/// A non-empty upload wins over the text field.
///
/// POST /admin/cars/import
#[instrument(skip_all)]
pub async fn import(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
    mut multipart: Multipart,
) -> Result<ImportTemplate> {
    let mut file = None;
    let mut pasted = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        match field.name() {
            Some("file") => {
                let text = field.text().await.map_err(|e| multipart_error(&e))?;
                if !text.trim().is_empty() {
                    file = Some(text);
                }
            }
            Some("data") => {
                pasted = Some(field.text().await.map_err(|e| multipart_error(&e))?);
            }
            _ => {}
        }
    }

    let data = file
        .or(pasted)
        .ok_or_else(|| AppError::BadRequest("no import data".to_string()))?;

    let report = state
        .context()
        .import_cars_data(&data, &state.request_token())
        .await;
    tracing::info!(
        admin = %admin.email,
        total = report.total,
        successful = report.successful,
        failed = report.failed,
        "Cars imported"
    );

    Ok(ImportTemplate {
        page: AdminPage::build(&state, &admin, "/admin/cars").await,
        report: Some(report),
    })
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Upload a car image to the public bucket.
///
/// POST /admin/api/images
#[instrument(skip_all)]
pub async fn upload_image(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<ManageInventory>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest("only image files can be uploaded".to_string()));
        }
        let name = storage_object_name(field.file_name().unwrap_or("image"));
        let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;

        let url = state
            .context()
            .remote()
            .upload_image(&name, bytes.to_vec(), &content_type)
            .await?;
        tracing::info!(admin = %admin.email, name = %name, size = bytes.len(), "Image uploaded");
        return Ok(Json(UploadResponse { url }));
    }

    Err(AppError::BadRequest("missing image field".to_string()))
}
