//! Reverse geocoding against OpenStreetMap Nominatim. Free, no API key required.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

use super::{Placemark, ReverseGeocoder};
use crate::{
    config::{DEFAULT_GEOCODER_URL, LocationSettings},
    model::Coordinate,
};

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    http: Client,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create geocoding client")?;

        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn from_settings(settings: &LocationSettings) -> Result<Self> {
        Self::new(
            settings.geocoder_url.clone(),
            &settings.user_agent,
            settings.geocode_timeout(),
        )
    }

    fn request_url(&self, coordinate: Coordinate) -> Result<Url> {
        Url::parse_with_params(
            &self.base_url,
            &[
                ("lat", coordinate.latitude().to_string()),
                ("lon", coordinate.longitude().to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("zoom", "10".to_string()),
            ],
        )
        .with_context(|| format!("Invalid geocoder URL: {}", self.base_url))
    }
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODER_URL.to_string(),
            http: Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    error: Option<String>,
    address: Option<NominatimAddress>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    country: Option<String>,
}

impl NominatimResponse {
    fn into_placemarks(self) -> Vec<Placemark> {
        if let Some(reason) = self.error {
            tracing::debug!("Nominatim found nothing: {}", reason);
            return Vec::new();
        }

        let Some(addr) = self.address else {
            return Vec::new();
        };

        // Prefer city > town > village > municipality
        let locality = addr
            .city
            .or(addr.town)
            .or(addr.village)
            .or(addr.municipality);

        vec![Placemark {
            name: self.display_name,
            locality,
            country: addr.country,
        }]
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Vec<Placemark>> {
        let url = self.request_url(coordinate)?;

        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("Failed to send reverse geocode request")?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("Reverse geocode returned status {}", status));
        }

        let body: NominatimResponse = res
            .json()
            .await
            .context("Failed to parse reverse geocode JSON")?;

        let placemarks = body.into_placemarks();
        tracing::debug!(count = placemarks.len(), "Reverse geocode answered");
        Ok(placemarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<Placemark> {
        serde_json::from_str::<NominatimResponse>(json)
            .unwrap()
            .into_placemarks()
    }

    #[test]
    fn city_is_preferred_over_smaller_places() {
        let placemarks = parse(
            r#"{"display_name":"Minsk, Belarus",
                "address":{"city":"Minsk","village":"Sosny","country":"Belarus"}}"#,
        );

        assert_eq!(placemarks.len(), 1);
        assert_eq!(placemarks[0].locality.as_deref(), Some("Minsk"));
        assert_eq!(placemarks[0].country.as_deref(), Some("Belarus"));
        assert_eq!(placemarks[0].name.as_deref(), Some("Minsk, Belarus"));
    }

    #[test]
    fn town_is_used_when_there_is_no_city() {
        let placemarks = parse(r#"{"address":{"town":"Zaslawye"}}"#);
        assert_eq!(placemarks[0].locality.as_deref(), Some("Zaslawye"));
    }

    #[test]
    fn error_body_means_no_results() {
        assert!(parse(r#"{"error":"Unable to geocode"}"#).is_empty());
        assert!(parse(r#"{}"#).is_empty());
    }

    #[test]
    fn request_url_carries_coordinates() {
        let geocoder = NominatimGeocoder::default();
        let coordinate = Coordinate::new(53.9, 27.5).unwrap();

        let url = geocoder.request_url(coordinate).unwrap();
        let query = url.query().unwrap_or_default();

        assert!(url.as_str().starts_with(DEFAULT_GEOCODER_URL));
        assert!(query.contains("lat=53.9"));
        assert!(query.contains("lon=27.5"));
        assert!(query.contains("format=json"));
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let geocoder =
            NominatimGeocoder::new("not a url", "test", Duration::from_secs(1)).unwrap();
        let err = geocoder
            .request_url(Coordinate::new(0.0, 0.0).unwrap())
            .unwrap_err();

        assert!(err.to_string().contains("Invalid geocoder URL"));
    }
}
