use thiserror::Error;

/// Failures of a single `LocationResolver::resolve` call.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Reverse geocoding failed: {0}")]
    GeocodingFailed(String),

    #[error("A location request is already in progress")]
    Busy,

    #[error("Location request cancelled")]
    Cancelled,

    #[error("Resolver cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

/// Failures of a single weather fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid weather request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Weather API returned HTTP {0}")]
    Http(u16),

    #[error("Weather API returned an empty body")]
    EmptyResponse,

    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),

    #[error("Weather request cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Another request is already in flight")]
    Busy,
}

impl PipelineError {
    /// True when the UI must show the blocking "location services disabled" explanation.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, PipelineError::Location(LocationError::PermissionDenied))
    }
}
