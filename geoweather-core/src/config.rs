use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::location::AuthorizationStatus;

pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://ipapi.co/json/";

/// OpenWeather access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_WEATHER_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl WeatherSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Location acquisition and reverse geocoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSettings {
    /// Last decision the user made about sharing their location.
    pub permission: AuthorizationStatus,
    pub acquisition_timeout_secs: u64,
    pub geocode_timeout_secs: u64,
    pub geocoder_url: String,
    pub ip_lookup_url: String,
    /// Nominatim's usage policy requires an identifying User-Agent.
    pub user_agent: String,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            permission: AuthorizationStatus::NotDetermined,
            acquisition_timeout_secs: 15,
            geocode_timeout_secs: 10,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            ip_lookup_url: DEFAULT_IP_LOOKUP_URL.to_string(),
            user_agent: concat!("geoweather/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl LocationSettings {
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_timeout_secs)
    }

    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_secs(self.geocode_timeout_secs)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [weather]
/// api_key = "..."
///
/// [location]
/// permission = "authorized"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub weather: WeatherSettings,
    pub location: LocationSettings,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "geoweather", "geoweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Returns the OpenWeather API key, or an error with a configuration hint.
    pub fn api_key(&self) -> Result<&str> {
        self.weather
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No OpenWeather API key configured.\n\
                     Hint: run `geoweather configure` or set OPENWEATHER_API_KEY."
                )
            })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.weather.api_key = Some(api_key);
    }

    pub fn set_permission(&mut self, status: AuthorizationStatus) {
        self.location.permission = status;
    }
}
