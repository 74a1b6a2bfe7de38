pub type WeatherResult<T, E = WeatherError> = std::result::Result<T, E>;

/// Failure of one weather lookup. Every variant collapses to
/// `WeatherState::Error` at the manager boundary.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("weather provider returned status {status}")]
    Status { status: u16 },
    #[error("weather payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{message}")]
    InvalidResponse { message: String },
    #[error("{message}")]
    InvalidConfig { message: String },
}
