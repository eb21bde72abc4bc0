//! Location -> place name -> weather, strictly in that order.
//!
//! One action is in flight per pipeline. The UI is expected to disable its
//! trigger while [`Pipeline::is_busy`] is true; an overlapping call fails
//! with [`PipelineError::Busy`] regardless.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{FetchError, PipelineError},
    location::LocationResolver,
    model::{PlaceName, Report},
    provider::WeatherFetcher,
};

#[derive(Debug)]
pub struct Pipeline {
    resolver: LocationResolver,
    fetcher: Arc<dyn WeatherFetcher>,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl Pipeline {
    pub fn new(resolver: LocationResolver, fetcher: Arc<dyn WeatherFetcher>) -> Self {
        Self {
            resolver,
            fetcher,
            in_flight: Mutex::new(None),
        }
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Abort the action in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.in_flight.lock().as_ref() {
            token.cancel();
            tracing::info!("In-flight request cancelled");
        }
    }

    /// Detect the current place, then fetch its weather.
    pub async fn run(&self) -> Result<Report, PipelineError> {
        let flight = self.begin()?;

        let place = self.resolver.resolve(&flight.token).await?;
        self.weather(place, &flight.token).await
    }

    /// Fetch weather again for a place that is already known.
    pub async fn refresh(&self, place: PlaceName) -> Result<Report, PipelineError> {
        let flight = self.begin()?;

        self.weather(place, &flight.token).await
    }

    fn begin(&self) -> Result<Flight<'_>, PipelineError> {
        let mut slot = self.in_flight.lock();
        if slot.is_some() {
            return Err(PipelineError::Busy);
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());

        Ok(Flight {
            slot: &self.in_flight,
            token,
        })
    }

    async fn weather(
        &self,
        place: PlaceName,
        cancel: &CancellationToken,
    ) -> Result<Report, PipelineError> {
        let weather = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled.into()),
            weather = self.fetcher.fetch(&place) => weather?,
        };

        Ok(Report {
            place,
            weather,
            fetched_at: Utc::now(),
        })
    }
}

/// Clears the in-flight slot when the action ends.
struct Flight<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
    token: CancellationToken,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}
