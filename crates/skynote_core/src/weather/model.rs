//! Weather wire payload and the report derived from it.
//!
//! # Invariants
//! - Provider numbers are kept as-is; Celsius is derived on read only.
//! - A payload without at least one `weather` entry is rejected.

use crate::model::note::Note;
use crate::weather::error::{WeatherError, WeatherResult};
use serde::{Deserialize, Serialize};

/// Offset between Kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Subset of the provider's `/weather` response that we read.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherResponse {
    pub main: MainReading,
    pub weather: Vec<Condition>,
    pub wind: Wind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainReading {
    /// Kelvin.
    pub temp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wind {
    /// Metres per second.
    pub speed: f64,
}

/// Successful lookup, tagged with the city it was requested for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city: String,
    pub temperature_kelvin: f64,
    pub description: String,
    pub wind_speed: f64,
}

impl WeatherReport {
    /// Builds a report from a decoded response.
    pub fn from_response(city: impl Into<String>, response: WeatherResponse) -> WeatherResult<Self> {
        let description = response
            .weather
            .into_iter()
            .next()
            .map(|condition| condition.description)
            .ok_or_else(|| WeatherError::InvalidResponse {
                message: "weather response has an empty `weather` array".to_string(),
            })?;

        Ok(Self {
            city: city.into(),
            temperature_kelvin: response.main.temp,
            description,
            wind_speed: response.wind.speed,
        })
    }

    pub fn temperature_celsius(&self) -> f64 {
        self.temperature_kelvin - KELVIN_OFFSET
    }

    /// Celsius with two decimals, e.g. `7.00°C`.
    pub fn display_temperature(&self) -> String {
        format!("{:.2}°C", self.temperature_celsius())
    }

    pub fn display_wind(&self) -> String {
        format!("{:.2} m/s", self.wind_speed)
    }

    /// Renders the report as an unsaved note.
    pub fn to_note(&self) -> Note {
        Note::new(
            format!("Weather in {}", self.city),
            format!(
                "Temperature: {}\nStatus: {}\nWind: {}",
                self.display_temperature(),
                self.description,
                self.display_wind()
            ),
        )
    }
}

/// Published weather state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum WeatherState {
    #[default]
    Loading,
    Error(String),
    Success(WeatherReport),
}
