//! Dependency-injection root.
//!
//! # Responsibility
//! - Build the store, the weather client and both state managers exactly
//!   once and hand out shared references.
//!
//! # Invariants
//! - There is no global store or client; everything hangs off `App`.
//! - `App` must be built inside a Tokio runtime.

use crate::config::AppConfig;
use crate::db::DbError;
use crate::service::note_manager::NoteStateManager;
use crate::service::weather_manager::{WeatherSettings, WeatherStateManager};
use crate::store::Store;
use crate::weather::{OpenWeatherClient, WeatherError, WeatherProvider};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub enum AppError {
    /// The database directory could not be created.
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Db(DbError),
    Weather(WeatherError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataDir { path, source } => write!(
                f,
                "failed to create data directory `{}`: {source}",
                path.display()
            ),
            Self::Db(err) => write!(f, "database setup failed: {err}"),
            Self::Weather(err) => write!(f, "weather client setup failed: {err}"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DataDir { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            Self::Weather(err) => Some(err),
        }
    }
}

impl From<DbError> for AppError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<WeatherError> for AppError {
    fn from(value: WeatherError) -> Self {
        Self::Weather(value)
    }
}

pub struct App {
    store: Arc<Store>,
    notes: Arc<NoteStateManager>,
    weather: WeatherStateManager,
}

impl App {
    /// Opens the configured database and wires the real HTTP client.
    pub fn start(config: &AppConfig) -> Result<Self, AppError> {
        if let Some(parent) = config.db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| AppError::DataDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let store = Store::open(&config.db_path)?;
        let client = OpenWeatherClient::new(&config.weather_base_url)?;
        info!(
            "event=app_wire module=app status=ok db_path={} weather_endpoint={}",
            config.db_path.display(),
            client.endpoint()
        );
        Ok(Self::with_parts(
            Arc::new(store),
            Arc::new(client),
            config.weather_settings(),
        ))
    }

    /// Wires already-built collaborators.
    pub fn with_parts(
        store: Arc<Store>,
        provider: Arc<dyn WeatherProvider>,
        settings: WeatherSettings,
    ) -> Self {
        let notes = Arc::new(NoteStateManager::new(Arc::clone(&store)));
        let weather = WeatherStateManager::new(Arc::clone(&store), provider, settings);
        Self {
            store,
            notes,
            weather,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn notes(&self) -> &Arc<NoteStateManager> {
        &self.notes
    }

    pub fn weather(&self) -> &WeatherStateManager {
        &self.weather
    }
}
