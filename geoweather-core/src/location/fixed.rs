use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use super::{AuthorizationStatus, LocationEvent, LocationProvider};
use crate::model::Coordinate;

/// A provider that always reports the same coordinate.
///
/// Supplying coordinates explicitly counts as consent, so it is always authorized.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationProvider {
    coordinate: Coordinate,
}

impl FixedLocationProvider {
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    fn authorization_status(&self) -> AuthorizationStatus {
        AuthorizationStatus::Authorized
    }

    async fn request_authorization(&self) -> AuthorizationStatus {
        AuthorizationStatus::Authorized
    }

    fn start_updates(&self) -> UnboundedReceiver<LocationEvent> {
        let (tx, rx) = unbounded_channel();
        let _ = tx.send(LocationEvent::Updated(vec![self.coordinate]));
        rx
    }

    fn stop_updates(&self) {}
}
