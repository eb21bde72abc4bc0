//! Permission check, one-shot location fix, then a single reverse geocode.
//!
//! Only one resolve runs at a time; the state lives behind a mutex and is
//! reset to `Idle` by a guard on every exit path.

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    AuthorizationStatus, LocationEvent, LocationProvider, ProviderFailure, ReverseGeocoder,
};
use crate::{
    config::LocationSettings,
    error::LocationError,
    model::{Coordinate, PlaceName},
};

/// Phase of the resolve currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverState {
    #[default]
    Idle,
    Authorizing,
    Acquiring,
    Geocoding,
}

impl ResolverState {
    /// True if a new resolve can be started.
    pub fn can_start(self) -> bool {
        matches!(self, ResolverState::Idle)
    }

    /// Forward transitions only. Returning to `Idle` is done by the guard.
    pub fn can_advance_to(self, next: ResolverState) -> bool {
        matches!(
            (self, next),
            (ResolverState::Idle, ResolverState::Authorizing)
                | (ResolverState::Authorizing, ResolverState::Acquiring)
                | (ResolverState::Acquiring, ResolverState::Geocoding)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    pub acquisition_timeout: Duration,
    pub geocode_timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        LocationSettings::default().into()
    }
}

impl From<&LocationSettings> for ResolverSettings {
    fn from(settings: &LocationSettings) -> Self {
        Self {
            acquisition_timeout: settings.acquisition_timeout(),
            geocode_timeout: settings.geocode_timeout(),
        }
    }
}

impl From<LocationSettings> for ResolverSettings {
    fn from(settings: LocationSettings) -> Self {
        (&settings).into()
    }
}

#[derive(Debug)]
pub struct LocationResolver {
    provider: Arc<dyn LocationProvider>,
    geocoder: Arc<dyn ReverseGeocoder>,
    settings: ResolverSettings,
    state: Mutex<ResolverState>,
}

impl LocationResolver {
    pub fn new(provider: Arc<dyn LocationProvider>, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self {
            provider,
            geocoder,
            settings: ResolverSettings::default(),
            state: Mutex::new(ResolverState::Idle),
        }
    }

    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn state(&self) -> ResolverState {
        *self.state.lock()
    }

    pub fn provider(&self) -> &Arc<dyn LocationProvider> {
        &self.provider
    }

    /// Resolve the current location to a place name.
    ///
    /// Fails with [`LocationError::Busy`] without touching the device if another
    /// resolve is still in flight.
    pub async fn resolve(&self, cancel: &CancellationToken) -> Result<PlaceName, LocationError> {
        let active = self.begin()?;

        let result = self.run(&active, cancel).await;
        match &result {
            Ok(place) => info!(%place, "Location resolved"),
            Err(err) => warn!(error = %err, "Location resolve failed"),
        }

        result
    }

    fn begin(&self) -> Result<ActiveResolve<'_>, LocationError> {
        let mut state = self.state.lock();
        if !state.can_start() {
            debug!(state = ?*state, "Rejecting overlapping resolve");
            return Err(LocationError::Busy);
        }
        *state = ResolverState::Authorizing;

        Ok(ActiveResolve { state: &self.state })
    }

    async fn run(
        &self,
        active: &ActiveResolve<'_>,
        cancel: &CancellationToken,
    ) -> Result<PlaceName, LocationError> {
        self.ensure_authorized(cancel).await?;

        active.advance(ResolverState::Acquiring)?;
        let coordinate = self.acquire(cancel).await?;

        active.advance(ResolverState::Geocoding)?;
        self.geocode(coordinate, cancel).await
    }

    async fn ensure_authorized(&self, cancel: &CancellationToken) -> Result<(), LocationError> {
        match self.provider.authorization_status() {
            AuthorizationStatus::Authorized => Ok(()),
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                Err(LocationError::PermissionDenied)
            }
            AuthorizationStatus::NotDetermined => {
                debug!("Requesting location permission");

                let decision = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(LocationError::Cancelled),
                    decision = self.provider.request_authorization() => decision,
                };

                debug!(%decision, "Location permission decided");
                match decision {
                    AuthorizationStatus::Authorized => Ok(()),
                    _ => Err(LocationError::PermissionDenied),
                }
            }
        }
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Result<Coordinate, LocationError> {
        let mut updates = UpdateSubscription::start(self.provider.as_ref());

        let deadline = tokio::time::sleep(self.settings.acquisition_timeout);
        tokio::pin!(deadline);

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LocationError::Cancelled),
                _ = &mut deadline => {
                    return Err(LocationError::LocationUnavailable(format!(
                        "no location fix within {}s",
                        self.settings.acquisition_timeout.as_secs()
                    )));
                }
                event = updates.next() => event,
            };

            match event {
                Some(LocationEvent::Updated(batch)) => {
                    if let Some(coordinate) = batch.last() {
                        debug!(%coordinate, "Location fix acquired");
                        return Ok(*coordinate);
                    }
                }
                Some(LocationEvent::Failed(ProviderFailure::LocationUnknown)) => {
                    debug!("Location unknown, waiting for the next update");
                }
                Some(LocationEvent::Failed(ProviderFailure::Other(reason))) => {
                    return Err(LocationError::LocationUnavailable(reason));
                }
                None => {
                    return Err(LocationError::LocationUnavailable(
                        "location updates ended without a fix".to_string(),
                    ));
                }
            }
        }
    }

    async fn geocode(
        &self,
        coordinate: Coordinate,
        cancel: &CancellationToken,
    ) -> Result<PlaceName, LocationError> {
        debug!(%coordinate, "Reverse geocoding");

        let lookup = tokio::time::timeout(
            self.settings.geocode_timeout,
            self.geocoder.reverse_geocode(coordinate),
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LocationError::Cancelled),
            outcome = lookup => outcome,
        };

        let placemarks = outcome
            .map_err(|_| {
                LocationError::GeocodingFailed(format!(
                    "no answer within {}s",
                    self.settings.geocode_timeout.as_secs()
                ))
            })?
            .map_err(|err| LocationError::GeocodingFailed(format!("{err:#}")))?;

        let last = placemarks
            .last()
            .ok_or_else(|| LocationError::GeocodingFailed("no results".to_string()))?;

        last.locality
            .as_deref()
            .and_then(PlaceName::new)
            .ok_or_else(|| LocationError::GeocodingFailed("result has no locality".to_string()))
    }
}

/// Holds the resolver busy until dropped.
struct ActiveResolve<'a> {
    state: &'a Mutex<ResolverState>,
}

impl ActiveResolve<'_> {
    fn advance(&self, next: ResolverState) -> Result<(), LocationError> {
        let mut state = self.state.lock();
        if !state.can_advance_to(next) {
            return Err(LocationError::InvalidTransition {
                from: format!("{:?}", *state),
                to: format!("{next:?}"),
            });
        }

        debug!(from = ?*state, to = ?next, "Resolver state change");
        *state = next;
        Ok(())
    }
}

impl Drop for ActiveResolve<'_> {
    fn drop(&mut self) {
        *self.state.lock() = ResolverState::Idle;
    }
}

/// Live location updates; stops the provider when dropped.
struct UpdateSubscription<'a> {
    provider: &'a dyn LocationProvider,
    events: UnboundedReceiver<LocationEvent>,
}

impl<'a> UpdateSubscription<'a> {
    fn start(provider: &'a dyn LocationProvider) -> Self {
        debug!("Starting location updates");
        let events = provider.start_updates();
        Self { provider, events }
    }

    async fn next(&mut self) -> Option<LocationEvent> {
        self.events.recv().await
    }
}

impl Drop for UpdateSubscription<'_> {
    fn drop(&mut self) {
        self.provider.stop_updates();
        debug!("Location updates stopped");
    }
}
