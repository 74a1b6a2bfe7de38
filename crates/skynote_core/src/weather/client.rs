//! HTTP weather client.
//!
//! # Responsibility
//! - Issue `GET {base}/weather?q=&appid=&lang=` and decode the payload.
//!
//! # Invariants
//! - Non-2xx responses and undecodable bodies are errors, never partial data.
//! - The API key is sent as a query parameter and never logged.

use crate::weather::error::{WeatherError, WeatherResult};
use crate::weather::model::{WeatherReport, WeatherResponse};
use crate::weather::{BoxFuture, WeatherProvider};
use reqwest::{Client, Url};
use std::time::Duration;

/// Public OpenWeatherMap current-weather endpoint.
pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `reqwest`-backed weather provider.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    endpoint: Url,
}

impl OpenWeatherClient {
    /// Builds a client for `base_url` (with or without trailing slash).
    pub fn new(base_url: &str) -> WeatherResult<Self> {
        let endpoint = weather_endpoint(base_url)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetches current weather for `city`.
    pub async fn get_weather(
        &self,
        city: &str,
        api_key: &str,
        language_code: &str,
    ) -> WeatherResult<WeatherReport> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("q", city), ("appid", api_key), ("lang", language_code)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let decoded: WeatherResponse = serde_json::from_slice(&body)?;
        WeatherReport::from_response(city, decoded)
    }
}

impl WeatherProvider for OpenWeatherClient {
    fn fetch<'a>(
        &'a self,
        city: &'a str,
        api_key: &'a str,
        language_code: &'a str,
    ) -> BoxFuture<'a, WeatherResult<WeatherReport>> {
        Box::pin(self.get_weather(city, api_key, language_code))
    }
}

fn weather_endpoint(base_url: &str) -> WeatherResult<Url> {
    let trimmed = base_url.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let base = Url::parse(&normalized).map_err(|err| WeatherError::InvalidConfig {
        message: format!("invalid weather base url `{trimmed}`: {err}"),
    })?;
    base.join("weather").map_err(|err| WeatherError::InvalidConfig {
        message: format!("invalid weather base url `{trimmed}`: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::weather_endpoint;

    #[test]
    fn endpoint_joins_with_or_without_trailing_slash() {
        let with_slash = weather_endpoint("https://api.openweathermap.org/data/2.5/").unwrap();
        let without = weather_endpoint("https://api.openweathermap.org/data/2.5").unwrap();
        assert_eq!(with_slash.as_str(), "https://api.openweathermap.org/data/2.5/weather");
        assert_eq!(with_slash, without);
    }

    #[test]
    fn endpoint_rejects_garbage() {
        assert!(weather_endpoint("not a url").is_err());
    }
}
