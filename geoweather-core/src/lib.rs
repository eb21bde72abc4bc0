//! Core library for the `geoweather` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - Location acquisition and reverse geocoding (`LocationResolver`)
//! - Current weather lookup (`WeatherFetcher`)
//! - The pipeline composing the two
//!
//! It is used by `geoweather-cli`, but can also be embedded by any UI that
//! needs "weather where I am".

pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod pipeline;
pub mod provider;

pub use config::{Config, LocationSettings, WeatherSettings};
pub use error::{FetchError, LocationError, PipelineError};
pub use location::{
    AuthorizationStatus, LocationProvider, LocationResolver, PermissionPrompt, ReverseGeocoder,
};
pub use model::{Coordinate, PlaceName, Report, WeatherSummary};
pub use pipeline::Pipeline;
pub use provider::{OpenWeatherFetcher, WeatherFetcher};

pub use tokio_util::sync::CancellationToken;
