//! Weather lookup capability.
//!
//! # Responsibility
//! - Define the provider seam used by the weather state manager.
//! - Ship the HTTP implementation and the report model.

pub mod client;
pub mod error;
pub mod model;

use std::future::Future;
use std::pin::Pin;

pub use client::{OpenWeatherClient, DEFAULT_WEATHER_BASE_URL};
pub use error::{WeatherError, WeatherResult};
pub use model::{WeatherReport, WeatherState, KELVIN_OFFSET};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of current-weather reports.
pub trait WeatherProvider
where
    Self: Send + Sync,
{
    fn fetch<'a>(
        &'a self,
        city: &'a str,
        api_key: &'a str,
        language_code: &'a str,
    ) -> BoxFuture<'a, WeatherResult<WeatherReport>>;
}
