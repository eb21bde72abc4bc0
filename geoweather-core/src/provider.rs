use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::FetchError,
    model::{PlaceName, WeatherSummary},
};

pub mod openweather;

pub use openweather::OpenWeatherFetcher;

/// Current weather for a named place. One round trip, never retried.
#[async_trait]
pub trait WeatherFetcher: Send + Sync + Debug {
    async fn fetch(&self, city: &PlaceName) -> Result<WeatherSummary, FetchError>;
}
