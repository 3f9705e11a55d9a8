//! Site settings persisted as a JSON file.
//!
//! The settings value is loaded once at startup and handed to whoever needs
//! it; nothing reads it from a global. The stored file is merged over the
//! defaults field by field, so a file written by an older version that lacks
//! newer fields still loads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Settings persistence errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Links shown in the site footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SocialLinks {
    pub telegram: Option<String>,
    pub vk: Option<String>,
    pub whatsapp: Option<String>,
    pub youtube: Option<String>,
}

/// Editable site-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub site_name: String,
    pub tagline: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub address: String,
    pub working_hours: String,
    pub social: SocialLinks,
    pub currency_symbol: String,
    pub cars_per_page: usize,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "Autosalon".to_string(),
            tagline: "New and used cars with a warranty".to_string(),
            contact_phone: "+7 (800) 555-35-35".to_string(),
            contact_email: "sales@autosalon.example".to_string(),
            address: "Moscow, Leningradsky prospekt, 1".to_string(),
            working_hours: "Daily 9:00-21:00".to_string(),
            social: SocialLinks::default(),
            currency_symbol: "₽".to_string(),
            cars_per_page: 12,
        }
    }
}

impl SiteSettings {
    pub const MAX_CARS_PER_PAGE: usize = 100;

    /// Check values an admin may have typed in.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] describing the first bad field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.site_name.trim().is_empty() {
            return Err(SettingsError::Invalid("site name is required".into()));
        }
        if self.currency_symbol.trim().is_empty() {
            return Err(SettingsError::Invalid("currency symbol is required".into()));
        }
        if !(1..=Self::MAX_CARS_PER_PAGE).contains(&self.cars_per_page) {
            return Err(SettingsError::Invalid(format!(
                "cars per page must be between 1 and {}",
                Self::MAX_CARS_PER_PAGE
            )));
        }
        Ok(())
    }
}

/// Holds the current settings and the file they persist to.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<SiteSettings>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults.
    ///
    /// A missing file is normal on first start. A corrupt or invalid file is
    /// logged and ignored; it is overwritten on the next save.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<SiteSettings>(&raw) {
                Ok(settings) if settings.validate().is_ok() => {
                    info!(path = %path.display(), "Loaded site settings");
                    settings
                }
                Ok(_) => {
                    warn!(path = %path.display(), "Stored site settings are invalid, using defaults");
                    SiteSettings::default()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt site settings file, using defaults");
                    SiteSettings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SiteSettings::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read site settings, using defaults");
                SiteSettings::default()
            }
        };

        Self {
            path,
            current: RwLock::new(settings),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings.
    pub async fn current(&self) -> SiteSettings {
        self.current.read().await.clone()
    }

    /// Validate, persist and apply new settings.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a crash mid-write never leaves a truncated file.
    ///
    /// # Errors
    ///
    /// Returns an error if validation or the write fails; the current
    /// settings are left unchanged in that case.
    pub async fn save(&self, settings: SiteSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        let json = serde_json::to_string_pretty(&settings)?;

        let mut current = self.current.write().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        *current = settings;

        info!(path = %self.path.display(), "Saved site settings");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("site-settings.json"));
        assert_eq!(store.current().await, SiteSettings::default());
    }

    #[tokio::test]
    async fn test_partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-settings.json");
        std::fs::write(&path, r#"{"site_name": "Auto Plus", "social": {"telegram": "https://t.me/autoplus"}}"#)
            .unwrap();

        let settings = SettingsStore::load(&path).current().await;
        assert_eq!(settings.site_name, "Auto Plus");
        assert_eq!(settings.social.telegram.as_deref(), Some("https://t.me/autoplus"));
        assert_eq!(settings.cars_per_page, SiteSettings::default().cars_per_page);
        assert_eq!(settings.currency_symbol, "₽");
    }

    #[tokio::test]
    async fn test_corrupt_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(SettingsStore::load(&path).current().await, SiteSettings::default());
    }

    #[tokio::test]
    async fn test_save_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("site-settings.json");
        let store = SettingsStore::load(&path);

        let mut settings = store.current().await;
        settings.contact_phone = "+7 (495) 000-00-00".into();
        store.save(settings.clone()).await.unwrap();

        assert_eq!(store.current().await, settings);
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(SettingsStore::load(&path).current().await, settings);
    }

    #[tokio::test]
    async fn test_invalid_settings_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-settings.json");
        let store = SettingsStore::load(&path);

        let mut settings = store.current().await;
        settings.cars_per_page = 0;
        assert!(matches!(store.save(settings).await, Err(SettingsError::Invalid(_))));
        assert!(!path.exists());
        assert_eq!(store.current().await.cars_per_page, 12);
    }
}
