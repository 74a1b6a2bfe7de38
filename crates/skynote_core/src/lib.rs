//! Core of skynote: notes plus a weather lookup, exposed as live state.
//! The presentation layer subscribes to the managers and sends intents back.

pub mod app;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod weather;

pub use app::{App, AppError};
pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::note::{now_epoch_ms, LastCity, Note, NoteId, UNSAVED_NOTE_ID};
pub use repo::{RepoError, RepoResult};
pub use service::debounce::{Debouncer, Ticket};
pub use service::note_manager::{NoteIntentError, NoteStateManager};
pub use service::weather_manager::{WeatherSettings, WeatherStateManager, DEFAULT_QUIET_PERIOD};
pub use store::{CancelToken, Store, Subscription};
pub use weather::{
    OpenWeatherClient, WeatherError, WeatherProvider, WeatherReport, WeatherResult, WeatherState,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
