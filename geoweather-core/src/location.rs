//! Device location and reverse geocoding.
//!
//! The device and the geocoding service are external collaborators, modelled
//! as traits. `LocationResolver` drives them through a single resolve call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::model::Coordinate;

pub mod fixed;
pub mod ip;
pub mod nominatim;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use fixed::FixedLocationProvider;
pub use ip::IpLocationProvider;
pub use nominatim::NominatimGeocoder;
pub use resolver::{LocationResolver, ResolverSettings, ResolverState};

/// Whether the user allowed this app to read their location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::NotDetermined => "not_determined",
            AuthorizationStatus::Restricted => "restricted",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Authorized => "authorized",
        }
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal and fatal failures reported on the update stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderFailure {
    /// No fix yet; the provider keeps trying.
    #[error("location is currently unknown")]
    LocationUnknown,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// A batch of fixes, oldest first.
    Updated(Vec<Coordinate>),
    Failed(ProviderFailure),
}

/// The device location subsystem.
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask the user for permission. Resolves once a decision was made.
    async fn request_authorization(&self) -> AuthorizationStatus;

    /// Begin delivering updates on the returned channel.
    fn start_updates(&self) -> UnboundedReceiver<LocationEvent>;

    fn stop_updates(&self);
}

/// Asks the user whether location may be shared.
#[async_trait]
pub trait PermissionPrompt: Send + Sync + Debug {
    async fn ask(&self) -> bool;
}

/// One reverse geocoding match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placemark {
    pub name: Option<String>,
    pub locality: Option<String>,
    pub country: Option<String>,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync + Debug {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> anyhow::Result<Vec<Placemark>>;
}
