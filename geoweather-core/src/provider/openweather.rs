use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::{ops::RangeInclusive, time::Duration};

use crate::{
    config::{DEFAULT_WEATHER_URL, WeatherSettings},
    error::FetchError,
    model::{PlaceName, WeatherSummary, kelvin_to_celsius},
};

use super::WeatherFetcher;

/// Statuses OpenWeather answers with on success.
const SUCCESS_STATUSES: RangeInclusive<u16> = 200..=226;

/// Temperatures outside this Kelvin range are not physical readings.
const PLAUSIBLE_KELVIN: RangeInclusive<f64> = 0.0..=1_000.0;

#[derive(Debug, Clone)]
pub struct OpenWeatherFetcher {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherFetcher {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_WEATHER_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, FetchError> {
        self.http = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn from_settings(api_key: String, settings: &WeatherSettings) -> Result<Self, FetchError> {
        Self::new(api_key)
            .with_base_url(settings.base_url.clone())
            .with_timeout(settings.timeout())
    }

    /// Build `<base>?q=<city>&appid=<key>`; the city is percent-encoded.
    pub fn request_url(&self, city: &PlaceName) -> Result<Url, FetchError> {
        if self.api_key.trim().is_empty() {
            return Err(FetchError::InvalidRequest("API key is empty".to_string()));
        }

        let url = Url::parse_with_params(
            &self.base_url,
            &[("q", city.as_str()), ("appid", self.api_key.as_str())],
        )
        .map_err(|e| FetchError::InvalidRequest(format!("{}: {e}", self.base_url)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(FetchError::InvalidRequest(format!("unsupported scheme '{other}'"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    weather: Vec<OwWeather>,
    main: OwMain,
}

/// Parse a current-weather body. All or nothing: a body without a condition is rejected.
pub fn parse_current(body: &[u8]) -> Result<WeatherSummary, FetchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::EmptyResponse);
    }

    let parsed: OwCurrentResponse = serde_json::from_slice(body)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| w.main)
        .ok_or_else(|| FetchError::MalformedResponse("weather array is empty".to_string()))?;

    let kelvin = parsed.main.temp;
    if !PLAUSIBLE_KELVIN.contains(&kelvin) {
        return Err(FetchError::MalformedResponse(format!(
            "temperature {kelvin} K is out of range"
        )));
    }

    Ok(WeatherSummary {
        condition,
        temperature_celsius: kelvin_to_celsius(kelvin),
    })
}

#[async_trait]
impl WeatherFetcher for OpenWeatherFetcher {
    async fn fetch(&self, city: &PlaceName) -> Result<WeatherSummary, FetchError> {
        let url = self.request_url(city)?;
        tracing::debug!(%city, "Requesting current weather");

        let res = self.http.get(url).send().await?;

        let status = res.status().as_u16();
        if !SUCCESS_STATUSES.contains(&status) {
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(
                status,
                body = %truncate_body(&body),
                "OpenWeather request failed"
            );
            return Err(FetchError::Http(status));
        }

        let body = res.bytes().await?;
        let summary = parse_current(&body)?;

        tracing::info!(
            %city,
            condition = %summary.condition,
            celsius = summary.temperature_celsius,
            "Weather fetched"
        );
        Ok(summary)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(name: &str) -> PlaceName {
        PlaceName::new(name).unwrap()
    }

    #[test]
    fn parses_condition_and_converts_temperature() {
        let summary =
            parse_current(br#"{"weather":[{"main":"Clear"}],"main":{"temp":295}}"#).unwrap();

        assert_eq!(summary.condition, "Clear");
        assert_eq!(summary.temperature_celsius, 22);
    }

    #[test]
    fn only_the_first_condition_is_used() {
        let summary = parse_current(
            br#"{"coord":{"lon":27.56,"lat":53.9},
                 "weather":[{"id":500,"main":"Rain","description":"light rain"},{"main":"Mist"}],
                 "main":{"temp":300.0,"humidity":81},"name":"Minsk"}"#,
        )
        .unwrap();

        assert_eq!(summary.condition, "Rain");
        assert_eq!(summary.temperature_celsius, 27);
    }

    #[test]
    fn missing_weather_array_is_malformed() {
        let err = parse_current(br#"{"main":{"temp":273.0}}"#).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn out_of_range_temperature_is_malformed() {
        for body in [
            &br#"{"weather":[{"main":"Clear"}],"main":{"temp":-1e300}}"#[..],
            br#"{"weather":[{"main":"Clear"}],"main":{"temp":-0.5}}"#,
            br#"{"weather":[{"main":"Clear"}],"main":{"temp":1e300}}"#,
        ] {
            let err = parse_current(body).unwrap_err();
            assert!(matches!(err, FetchError::MalformedResponse(_)), "{err}");
        }

        let summary =
            parse_current(br#"{"weather":[{"main":"Clear"}],"main":{"temp":0}}"#).unwrap();
        assert_eq!(summary.temperature_celsius, -273);
    }

    #[test]
    fn empty_weather_array_is_malformed() {
        let err = parse_current(br#"{"weather":[],"main":{"temp":273.0}}"#).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn blank_body_is_empty_response() {
        assert!(matches!(parse_current(b""), Err(FetchError::EmptyResponse)));
        assert!(matches!(parse_current(b" \n"), Err(FetchError::EmptyResponse)));
    }

    #[test]
    fn request_url_encodes_city() {
        let fetcher = OpenWeatherFetcher::new("KEY".into());
        let url = fetcher.request_url(&city("São Paulo & Co")).unwrap();

        assert!(url.as_str().starts_with(DEFAULT_WEATHER_URL));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "São Paulo & Co".to_string()),
                ("appid".to_string(), "KEY".to_string()),
            ]
        );
        assert!(!url.query().unwrap_or_default().contains(' '));
    }

    #[test]
    fn invalid_base_url_fails_before_any_request() {
        let fetcher = OpenWeatherFetcher::new("KEY".into()).with_base_url("::not a url::");
        assert!(matches!(
            fetcher.request_url(&city("Minsk")),
            Err(FetchError::InvalidRequest(_))
        ));

        let fetcher = OpenWeatherFetcher::new("KEY".into()).with_base_url("ftp://example.com/w");
        assert!(matches!(
            fetcher.request_url(&city("Minsk")),
            Err(FetchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn empty_api_key_is_invalid() {
        let fetcher = OpenWeatherFetcher::new("  ".into());
        assert!(matches!(
            fetcher.request_url(&city("Minsk")),
            Err(FetchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn success_range_is_inclusive() {
        assert!(SUCCESS_STATUSES.contains(&200));
        assert!(SUCCESS_STATUSES.contains(&226));
        assert!(!SUCCESS_STATUSES.contains(&199));
        assert!(!SUCCESS_STATUSES.contains(&227));
        assert!(!SUCCESS_STATUSES.contains(&404));
    }

    #[test]
    fn truncate_body_limits_length() {
        let long = "x".repeat(300);
        assert_eq!(truncate_body(&long).len(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
