//! Application configuration resolved from the environment.
//!
//! # Responsibility
//! - Resolve database path, weather endpoint, credentials, language and
//!   timing in one place.
//!
//! # Invariants
//! - Precedence is environment variable, then build-time value, then default.
//! - The API key never appears in `Debug` output or error messages.

use crate::logging::default_log_level;
use crate::service::weather_manager::{WeatherSettings, DEFAULT_QUIET_PERIOD};
use crate::weather::DEFAULT_WEATHER_BASE_URL;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "SKYNOTE_DB_PATH";
pub const ENV_WEATHER_BASE_URL: &str = "SKYNOTE_WEATHER_BASE_URL";
pub const ENV_API_KEY: &str = "OPENWEATHER_API_KEY";
pub const ENV_LANGUAGE: &str = "SKYNOTE_LANGUAGE";
pub const ENV_DEBOUNCE_MS: &str = "SKYNOTE_DEBOUNCE_MS";
pub const ENV_LOG_LEVEL: &str = "SKYNOTE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "SKYNOTE_LOG_DIR";

const DEFAULT_DATA_DIR_NAME: &str = "skynote";
const DEFAULT_DB_FILE_NAME: &str = "skynote.sqlite3";
const DEFAULT_LANGUAGE: &str = "en";

/// API key injected at build time, if the build environment provided one.
const BUILD_API_KEY: Option<&str> = option_env!("OPENWEATHER_API_KEY");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { variable: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { variable, message } => {
                write!(f, "invalid `{variable}`: {message}")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub weather_base_url: String,
    pub api_key: String,
    pub language_code: String,
    pub quiet_period: Duration,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Debug for AppConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("db_path", &self.db_path)
            .field("weather_base_url", &self.weather_base_url)
            .field("api_key", &"<redacted>")
            .field("language_code", &self.language_code)
            .field("quiet_period", &self.quiet_period)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl AppConfig {
    /// Resolves configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves configuration through `lookup` (variable name -> value).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_path = get(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);
        let weather_base_url =
            get(ENV_WEATHER_BASE_URL).unwrap_or_else(|| DEFAULT_WEATHER_BASE_URL.to_string());
        let api_key = get(ENV_API_KEY)
            .or_else(|| BUILD_API_KEY.map(str::to_string))
            .unwrap_or_default();
        let language_code = match get(ENV_LANGUAGE) {
            Some(value) => normalize_language(&value)?,
            None => DEFAULT_LANGUAGE.to_string(),
        };
        let quiet_period = match get(ENV_DEBOUNCE_MS) {
            Some(value) => parse_millis(&value)?,
            None => DEFAULT_QUIET_PERIOD,
        };
        let log_level = get(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string());

        Ok(Self {
            db_path,
            weather_base_url,
            api_key,
            language_code,
            quiet_period,
            log_level,
            log_dir: get(ENV_LOG_DIR),
        })
    }

    pub fn weather_settings(&self) -> WeatherSettings {
        WeatherSettings {
            api_key: self.api_key.clone(),
            language_code: self.language_code.clone(),
            quiet_period: self.quiet_period,
        }
    }
}

/// Per-user data location for the note database.
///
/// - Linux: `~/.local/share/skynote/skynote.sqlite3`
/// - macOS: `~/Library/Application Support/skynote/skynote.sqlite3`
/// - Windows: `%LOCALAPPDATA%\skynote\skynote.sqlite3`
///
/// Falls back to the temp directory when the platform reports no data dir.
pub fn default_db_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join(DEFAULT_DATA_DIR_NAME).join(DEFAULT_DB_FILE_NAME),
        None => std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
    }
}

/// Accepts 2-3 letter ASCII language tags and lowercases them.
pub fn normalize_language(value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    let valid = (2..=3).contains(&trimmed.len())
        && trimmed.chars().all(|ch| ch.is_ascii_alphabetic());
    if !valid {
        return Err(ConfigError::InvalidValue {
            variable: ENV_LANGUAGE,
            message: format!("expected a 2-3 letter language code, got `{trimmed}`"),
        });
    }
    Ok(trimmed.to_ascii_lowercase())
}

fn parse_millis(value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|err| ConfigError::InvalidValue {
            variable: ENV_DEBOUNCE_MS,
            message: format!("expected milliseconds, got `{value}`: {err}"),
        })
}
