//! Approximate location from the public IP address (ipapi.co style endpoint).
//!
//! Stands in for a device GPS on machines that have none. The permission
//! state is held in memory; asking is delegated to a [`PermissionPrompt`].

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
};

use super::{AuthorizationStatus, LocationEvent, LocationProvider, PermissionPrompt, ProviderFailure};
use crate::{config::LocationSettings, model::Coordinate};

#[derive(Debug)]
pub struct IpLocationProvider {
    lookup_url: String,
    http: Client,
    status: Mutex<AuthorizationStatus>,
    prompt: Arc<dyn PermissionPrompt>,
    lookup: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl IpLocationProvider {
    pub fn new(
        lookup_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
        status: AuthorizationStatus,
        prompt: Arc<dyn PermissionPrompt>,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            lookup_url: lookup_url.into(),
            http,
            status: Mutex::new(status),
            prompt,
            lookup: Mutex::new(None),
        })
    }

    pub fn from_settings(
        settings: &LocationSettings,
        prompt: Arc<dyn PermissionPrompt>,
    ) -> anyhow::Result<Self> {
        Self::new(
            settings.ip_lookup_url.clone(),
            &settings.user_agent,
            settings.acquisition_timeout(),
            settings.permission,
            prompt,
        )
    }

    async fn locate(http: Client, url: String, tx: UnboundedSender<LocationEvent>) {
        let event = match Self::lookup(&http, &url).await {
            Ok(coordinate) => {
                tracing::debug!(%coordinate, "IP geolocation answered");
                LocationEvent::Updated(vec![coordinate])
            }
            Err(failure) => {
                tracing::debug!("IP geolocation failed: {}", failure);
                LocationEvent::Failed(failure)
            }
        };

        let _ = tx.send(event);
    }

    async fn lookup(http: &Client, url: &str) -> Result<Coordinate, ProviderFailure> {
        let res = http
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderFailure::Other(format!("IP lookup request failed: {e}")))?;

        if !res.status().is_success() {
            return Err(ProviderFailure::Other(format!(
                "IP lookup returned status {}",
                res.status()
            )));
        }

        let body: IpApiResponse = res
            .json()
            .await
            .map_err(|e| ProviderFailure::Other(format!("IP lookup parse error: {e}")))?;

        let (Some(lat), Some(lon)) = (body.latitude, body.longitude) else {
            return Err(ProviderFailure::Other("IP lookup returned no coordinates".into()));
        };

        Coordinate::new(lat, lon).map_err(|e| ProviderFailure::Other(e.to_string()))
    }
}

#[async_trait]
impl LocationProvider for IpLocationProvider {
    fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }

    async fn request_authorization(&self) -> AuthorizationStatus {
        let decision = if self.prompt.ask().await {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };

        *self.status.lock() = decision;
        decision
    }

    fn start_updates(&self) -> UnboundedReceiver<LocationEvent> {
        let (tx, rx) = unbounded_channel();
        let task = tokio::spawn(Self::locate(
            self.http.clone(),
            self.lookup_url.clone(),
            tx,
        ));

        if let Some(previous) = self.lookup.lock().replace(task) {
            previous.abort();
        }

        rx
    }

    fn stop_updates(&self) {
        if let Some(task) = self.lookup.lock().take() {
            task.abort();
        }
    }
}
