//! Process settings
//!
//! Loaded once at startup from a JSON file, with sensible defaults for
//! everything except the API key.

use std::path::PathBuf;
use std::{env, fs};

use serde::{Deserialize, Serialize};

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "GRIDDECK_CONFIG";

/// Default settings file name under the user's home directory
const SETTINGS_FILE: &str = ".griddeck.json";

/// User-facing process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Developer API key for the remote service (required)
    pub api_key: String,
    /// Root URL of the remote game-data service
    pub service_root: String,
    /// Root URL of the auth broker handling the browser token flow
    pub auth_broker: String,
    /// Seconds between inventory poll cycles
    pub poll_interval_secs: u64,
    /// Override for the cache root directory
    pub cache_dir: Option<PathBuf>,
    /// TTF font used for tile text overlays
    pub font_path: Option<PathBuf>,
    /// Use the virtual deck backend instead of real hardware
    pub virtual_deck: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            service_root: "https://api.gridhost.net".to_string(),
            auth_broker: "https://auth.gridhost.net/broker".to_string(),
            poll_interval_secs: 5,
            cache_dir: None,
            font_path: None,
            virtual_deck: false,
        }
    }
}

impl Settings {
    /// Resolve the settings file path, honoring the env override
    pub fn path() -> PathBuf {
        if let Ok(path) = env::var(SETTINGS_ENV) {
            return PathBuf::from(path);
        }
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(SETTINGS_FILE))
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
    }

    /// Load settings from the resolved path, falling back to defaults
    /// when the file is missing or unreadable
    pub fn load() -> Self {
        let path = Self::path();
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No settings file at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Startup validation. A missing API key is fatal: nothing can be
    /// fetched from the remote service without one.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err(format!(
                "No API key configured. Set `api_key` in {}",
                Self::path().display()
            ));
        }
        Ok(())
    }

    /// Build a full service URL from a route
    pub fn service_url(&self, route: &str) -> String {
        format!("{}{}", self.service_root.trim_end_matches('/'), route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_have_no_api_key() {
        let settings = Settings::default();
        assert!(settings.api_key.is_empty());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_with_key() {
        let settings = Settings {
            api_key: "abc123".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_service_url_joins_cleanly() {
        let settings = Settings {
            service_root: "https://api.gridhost.net/".to_string(),
            ..Settings::default()
        };
        assert_eq!(
            settings.service_url("/platform/manifest/"),
            "https://api.gridhost.net/platform/manifest/"
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"api_key": "k"}"#).unwrap();
        assert_eq!(settings.api_key, "k");
        assert_eq!(settings.poll_interval_secs, 5);
        assert!(!settings.virtual_deck);
    }
}
