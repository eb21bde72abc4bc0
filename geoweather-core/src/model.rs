use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset between Kelvin and Celsius, as an integer.
const KELVIN_OFFSET: i64 = 273;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside -90..=90")]
    Latitude(f64),
    #[error("longitude {0} is outside -180..=180")]
    Longitude(f64),
}

/// A point on the globe, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }

        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// A city name produced by reverse geocoding. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaceName(String);

impl PlaceName {
    /// Returns `None` when the trimmed input is empty.
    pub fn new(name: impl AsRef<str>) -> Option<Self> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PlaceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSummary {
    /// Short condition group as reported by the API, e.g. "Rain" or "Clear".
    pub condition: String,
    pub temperature_celsius: i64,
}

/// Everything the renderer needs after a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub place: PlaceName,
    pub weather: WeatherSummary,
    pub fetched_at: DateTime<Utc>,
}

/// Rounds to the nearest Kelvin first, then shifts: 300.0 -> 27, 273.0 -> 0.
///
/// Out-of-range input saturates instead of overflowing.
pub fn kelvin_to_celsius(kelvin: f64) -> i64 {
    (kelvin.round() as i64).saturating_sub(KELVIN_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kelvin_conversion_matches_reference_points() {
        assert_eq!(kelvin_to_celsius(300.0), 27);
        assert_eq!(kelvin_to_celsius(273.0), 0);
        assert_eq!(kelvin_to_celsius(295.0), 22);
    }

    #[test]
    fn kelvin_conversion_rounds_before_shifting() {
        assert_eq!(kelvin_to_celsius(299.6), 27);
        assert_eq!(kelvin_to_celsius(299.4), 26);
        assert_eq!(kelvin_to_celsius(260.15), -13);
    }

    #[test]
    fn kelvin_conversion_saturates_on_extreme_input() {
        assert_eq!(kelvin_to_celsius(-1e300), i64::MIN);
        assert_eq!(kelvin_to_celsius(f64::NEG_INFINITY), i64::MIN);
        assert_eq!(kelvin_to_celsius(1e300), i64::MAX - KELVIN_OFFSET);
    }

    #[test]
    fn coordinate_rejects_out_of_range_values() {
        assert!(Coordinate::new(53.9, 27.56).is_ok());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert_eq!(
            Coordinate::new(91.0, 0.0).unwrap_err(),
            CoordinateError::Latitude(91.0)
        );
        assert!(matches!(
            Coordinate::new(0.0, 180.5),
            Err(CoordinateError::Longitude(_))
        ));
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn place_name_is_trimmed_and_never_empty() {
        assert_eq!(PlaceName::new("  Minsk ").unwrap().as_str(), "Minsk");
        assert!(PlaceName::new("").is_none());
        assert!(PlaceName::new("   ").is_none());
    }
}
