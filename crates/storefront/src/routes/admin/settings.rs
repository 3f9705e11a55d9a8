//! Site settings form.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_sync::{SettingsError, SiteSettings, settings::SocialLinks};
use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use super::AdminPage;
use crate::error::Result;
use crate::filters;
use crate::middleware::{EditSettings, RequireRole};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/settings", get(show).post(save))
}

/// Settings form as posted; social links are blank when unused.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsForm {
    pub site_name: String,
    pub tagline: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub address: String,
    pub working_hours: String,
    pub telegram: String,
    pub vk: String,
    pub whatsapp: String,
    pub youtube: String,
    pub currency_symbol: String,
    pub cars_per_page: String,
}

fn link(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl SettingsForm {
    #[must_use]
    pub fn from_settings(settings: &SiteSettings) -> Self {
        Self {
            site_name: settings.site_name.clone(),
            tagline: settings.tagline.clone(),
            contact_phone: settings.contact_phone.clone(),
            contact_email: settings.contact_email.clone(),
            address: settings.address.clone(),
            working_hours: settings.working_hours.clone(),
            telegram: settings.social.telegram.clone().unwrap_or_default(),
            vk: settings.social.vk.clone().unwrap_or_default(),
            whatsapp: settings.social.whatsapp.clone().unwrap_or_default(),
            youtube: settings.social.youtube.clone().unwrap_or_default(),
            currency_symbol: settings.currency_symbol.clone(),
            cars_per_page: settings.cars_per_page.to_string(),
        }
    }

    /// Convert to settings; range checks happen in [`SiteSettings::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] if cars per page is not a number.
    pub fn to_settings(&self) -> std::result::Result<SiteSettings, SettingsError> {
        let cars_per_page = self
            .cars_per_page
            .trim()
            .parse()
            .map_err(|_| SettingsError::Invalid("cars per page must be a number".into()))?;

        Ok(SiteSettings {
            site_name: self.site_name.trim().to_string(),
            tagline: self.tagline.trim().to_string(),
            contact_phone: self.contact_phone.trim().to_string(),
            contact_email: self.contact_email.trim().to_string(),
            address: self.address.trim().to_string(),
            working_hours: self.working_hours.trim().to_string(),
            social: SocialLinks {
                telegram: link(&self.telegram),
                vk: link(&self.vk),
                whatsapp: link(&self.whatsapp),
                youtube: link(&self.youtube),
            },
            currency_symbol: self.currency_symbol.trim().to_string(),
            cars_per_page,
        })
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/settings.html")]
pub struct SettingsTemplate {
    pub page: AdminPage,
    pub form: SettingsForm,
    pub saved: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsQuery {
    #[serde(default)]
    pub saved: bool,
}

/// GET /admin/settings
pub async fn show(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<EditSettings>,
    Query(query): Query<SettingsQuery>,
) -> SettingsTemplate {
    let settings = state.settings().current().await;
    SettingsTemplate {
        page: AdminPage::build(&state, &admin, "/admin/settings").await,
        form: SettingsForm::from_settings(&settings),
        saved: query.saved,
        error: None,
    }
}

/// POST /admin/settings
#[instrument(skip_all)]
pub async fn save(
    State(state): State<AppState>,
    RequireRole(admin, ..): RequireRole<EditSettings>,
    Form(form): Form<SettingsForm>,
) -> Result<Response> {
    let result = match form.to_settings() {
        Ok(settings) => state.settings().save(settings).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            tracing::info!(admin = %admin.email, "Site settings saved");
            Ok(Redirect::to("/admin/settings?saved=true").into_response())
        }
        Err(SettingsError::Invalid(reason)) => {
            let page = SettingsTemplate {
                page: AdminPage::build(&state, &admin, "/admin/settings").await,
                form,
                saved: false,
                error: Some(reason),
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_form_round_trip_keeps_settings() {
        let settings = SiteSettings {
            social: SocialLinks {
                telegram: Some("https://t.me/autosalon".into()),
                ..SocialLinks::default()
            },
            ..SiteSettings::default()
        };
        let restored = SettingsForm::from_settings(&settings).to_settings().unwrap();
        assert_eq!(restored, settings);
    }

    #[test]
    fn test_cars_per_page_must_be_numeric() {
        let form = SettingsForm {
            cars_per_page: "many".into(),
            ..SettingsForm::from_settings(&SiteSettings::default())
        };
        assert!(matches!(form.to_settings(), Err(SettingsError::Invalid(_))));
    }
}
