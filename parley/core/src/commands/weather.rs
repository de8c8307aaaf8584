//! Weather commands
//!
//! `weather` reports current conditions and `forecast` the next three days,
//! both from Open-Meteo (no API key). The location comes from configuration:
//! a place name (geocoded), `"lat,lon"`, or `"auto"` for IP geolocation.
//!
//! Every HTTP request carries the configured timeout. Failures surface as
//! [`CommandError`]s, which the session turns into an error reply.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::{TemperatureUnit, WeatherSettings};
use crate::registry::{Command, CommandError};

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const IP_LOOKUP_URL: &str = "https://ipapi.co/json/";

/// Days covered by the `forecast` command
pub const FORECAST_DAYS: usize = 3;

/// Where to report weather for
#[derive(Clone, Debug, PartialEq)]
pub enum Location {
    /// Geolocate from the public IP address
    Auto,
    /// Explicit coordinates
    Coordinates {
        /// Latitude in degrees
        latitude: f64,
        /// Longitude in degrees
        longitude: f64,
    },
    /// A place name to geocode
    Named(String),
}

impl Location {
    /// Interpret a configured location string
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
            return Self::Auto;
        }
        if let Some((lat, lon)) = raw.split_once(',') {
            if let (Ok(latitude), Ok(longitude)) = (lat.trim().parse(), lon.trim().parse()) {
                return Self::Coordinates {
                    latitude,
                    longitude,
                };
            }
        }
        Self::Named(raw.to_string())
    }
}

/// A resolved place
#[derive(Clone, Debug, PartialEq)]
pub struct Place {
    /// Display name
    pub name: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

// Response shapes, trimmed to the fields we read

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Current conditions as returned by Open-Meteo
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CurrentConditions {
    /// Air temperature at 2 m
    pub temperature_2m: f64,
    /// Relative humidity in percent
    pub relative_humidity_2m: f64,
    /// WMO weather code
    pub weather_code: u16,
    /// Wind speed at 10 m
    pub wind_speed_10m: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: Option<CurrentConditions>,
}

/// Daily forecast series as returned by Open-Meteo
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DailyForecast {
    /// ISO dates
    #[serde(default)]
    pub time: Vec<String>,
    /// WMO weather code per day
    #[serde(default)]
    pub weather_code: Vec<u16>,
    /// Daily maximum temperature
    #[serde(default)]
    pub temperature_2m_max: Vec<f64>,
    /// Daily minimum temperature
    #[serde(default)]
    pub temperature_2m_min: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: Option<DailyForecast>,
}

/// Description of a WMO weather interpretation code
#[must_use]
pub fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Foggy",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}

fn temperature_symbol(unit: TemperatureUnit) -> &'static str {
    match unit {
        TemperatureUnit::Metric => "°C",
        TemperatureUnit::Imperial => "°F",
    }
}

fn wind_symbol(unit: TemperatureUnit) -> &'static str {
    match unit {
        TemperatureUnit::Metric => "km/h",
        TemperatureUnit::Imperial => "mph",
    }
}

/// Render current conditions as one spoken-friendly sentence
#[must_use]
pub fn format_current(place: &Place, current: &CurrentConditions, unit: TemperatureUnit) -> String {
    format!(
        "Weather in {}: {}{}, {}, humidity {}%, wind {} {}",
        place.name,
        current.temperature_2m,
        temperature_symbol(unit),
        describe_weather_code(current.weather_code),
        current.relative_humidity_2m,
        current.wind_speed_10m,
        wind_symbol(unit),
    )
}

/// Render up to `days` entries of a daily forecast
#[must_use]
pub fn format_forecast(
    place: &Place,
    daily: &DailyForecast,
    unit: TemperatureUnit,
    days: usize,
) -> String {
    let symbol = temperature_symbol(unit);
    let entries: Vec<String> = daily
        .time
        .iter()
        .zip(&daily.weather_code)
        .zip(daily.temperature_2m_max.iter().zip(&daily.temperature_2m_min))
        .take(days)
        .map(|((date, code), (high, low))| {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(|d| d.format("%A, %b %d").to_string())
                .unwrap_or_else(|_| date.clone());
            format!(
                "{day}: {}, high {high}{symbol}, low {low}{symbol}",
                describe_weather_code(*code)
            )
        })
        .collect();

    format!(
        "Forecast for {} ({} days): {}",
        place.name,
        entries.len(),
        entries.join("; ")
    )
}

/// Thin Open-Meteo client
#[derive(Clone, Debug)]
pub struct WeatherClient {
    client: reqwest::Client,
    location: Location,
    unit: TemperatureUnit,
    timeout: Duration,
}

impl WeatherClient {
    /// Build a client from settings
    #[must_use]
    pub fn new(settings: &WeatherSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            location: Location::parse(&settings.location),
            unit: settings.unit,
            timeout: settings.timeout(),
        }
    }

    fn request_error(&self, e: reqwest::Error) -> CommandError {
        if e.is_timeout() {
            CommandError::TimedOut(self.timeout)
        } else {
            CommandError::failed(format!("weather service request failed: {e}"))
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, CommandError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(e))?
            .error_for_status()
            .map_err(|e| self.request_error(e))?;

        response.json().await.map_err(|e| self.request_error(e))
    }

    /// Resolve the configured location to coordinates
    ///
    /// # Errors
    ///
    /// Fails if the lookup request fails or the place is unknown.
    pub async fn locate(&self) -> Result<Place, CommandError> {
        match &self.location {
            Location::Coordinates {
                latitude,
                longitude,
            } => Ok(Place {
                name: format!("{latitude:.2}, {longitude:.2}"),
                latitude: *latitude,
                longitude: *longitude,
            }),
            Location::Named(name) => {
                let response: GeocodingResponse = self
                    .get_json(
                        GEOCODING_URL,
                        &[
                            ("name", name.clone()),
                            ("count", "1".to_string()),
                            ("language", "en".to_string()),
                            ("format", "json".to_string()),
                        ],
                    )
                    .await?;
                response
                    .results
                    .into_iter()
                    .next()
                    .map(|r| Place {
                        name: r.name,
                        latitude: r.latitude,
                        longitude: r.longitude,
                    })
                    .ok_or_else(|| CommandError::failed(format!("Location '{name}' not found")))
            }
            Location::Auto => {
                let response: IpLookupResponse = self.get_json(IP_LOOKUP_URL, &[]).await?;
                match (response.latitude, response.longitude) {
                    (Some(latitude), Some(longitude)) => Ok(Place {
                        name: response.city.unwrap_or_else(|| "your location".to_string()),
                        latitude,
                        longitude,
                    }),
                    _ => Err(CommandError::failed(
                        "could not determine your location; set weather.location",
                    )),
                }
            }
        }
    }

    fn unit_query(&self) -> Vec<(&'static str, String)> {
        match self.unit {
            TemperatureUnit::Metric => vec![],
            TemperatureUnit::Imperial => vec![
                ("temperature_unit", "fahrenheit".to_string()),
                ("wind_speed_unit", "mph".to_string()),
            ],
        }
    }

    /// Current conditions at the configured location
    ///
    /// # Errors
    ///
    /// Fails on any request error or an empty response.
    pub async fn current(&self) -> Result<String, CommandError> {
        let place = self.locate().await?;
        let mut query = vec![
            ("latitude", place.latitude.to_string()),
            ("longitude", place.longitude.to_string()),
            (
                "current",
                "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m".to_string(),
            ),
        ];
        query.extend(self.unit_query());

        let response: CurrentResponse = self.get_json(FORECAST_URL, &query).await?;
        let current = response
            .current
            .ok_or_else(|| CommandError::failed("weather service returned no data"))?;

        Ok(format_current(&place, &current, self.unit))
    }

    /// Daily forecast at the configured location
    ///
    /// # Errors
    ///
    /// Fails on any request error or an empty response.
    pub async fn forecast(&self, days: usize) -> Result<String, CommandError> {
        let days = days.clamp(1, 10);
        let place = self.locate().await?;
        let mut query = vec![
            ("latitude", place.latitude.to_string()),
            ("longitude", place.longitude.to_string()),
            (
                "daily",
                "weather_code,temperature_2m_max,temperature_2m_min".to_string(),
            ),
            ("timezone", "auto".to_string()),
            ("forecast_days", days.to_string()),
        ];
        query.extend(self.unit_query());

        let response: DailyResponse = self.get_json(FORECAST_URL, &query).await?;
        let daily = response
            .daily
            .filter(|d| !d.time.is_empty())
            .ok_or_else(|| CommandError::failed("weather service returned no forecast"))?;

        Ok(format_forecast(&place, &daily, self.unit, days))
    }
}

/// The `weather` command
#[derive(Clone, Debug)]
pub struct CurrentWeather(pub WeatherClient);

#[async_trait]
impl Command for CurrentWeather {
    async fn execute(&self) -> Result<String, CommandError> {
        self.0.current().await
    }
}

/// The `forecast` command
#[derive(Clone, Debug)]
pub struct WeatherForecast(pub WeatherClient);

#[async_trait]
impl Command for WeatherForecast {
    async fn execute(&self) -> Result<String, CommandError> {
        self.0.forecast(FORECAST_DAYS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lisbon() -> Place {
        Place {
            name: "Lisbon".to_string(),
            latitude: 38.72,
            longitude: -9.14,
        }
    }

    #[test]
    fn test_location_parse() {
        assert_eq!(Location::parse("auto"), Location::Auto);
        assert_eq!(Location::parse(" AUTO "), Location::Auto);
        assert_eq!(Location::parse(""), Location::Auto);
        assert_eq!(
            Location::parse("38.72, -9.14"),
            Location::Coordinates {
                latitude: 38.72,
                longitude: -9.14
            }
        );
        assert_eq!(
            Location::parse("Washington, DC"),
            Location::Named("Washington, DC".to_string())
        );
    }

    #[test]
    fn test_weather_codes() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(48), "Foggy");
        assert_eq!(describe_weather_code(99), "Thunderstorm with hail");
        assert_eq!(describe_weather_code(42), "Unknown");
    }

    #[test]
    fn test_current_from_json() {
        let json = r#"{
            "latitude": 38.72,
            "current": {
                "time": "2026-01-02T15:00",
                "temperature_2m": 14.5,
                "relative_humidity_2m": 72,
                "weather_code": 3,
                "wind_speed_10m": 11.2
            }
        }"#;
        let response: CurrentResponse = serde_json::from_str(json).unwrap();
        let reply = format_current(&lisbon(), &response.current.unwrap(), TemperatureUnit::Metric);
        assert_eq!(
            reply,
            "Weather in Lisbon: 14.5°C, Overcast, humidity 72%, wind 11.2 km/h"
        );
    }

    #[test]
    fn test_forecast_from_json() {
        let json = r#"{
            "daily": {
                "time": ["2026-01-02", "2026-01-03", "2026-01-04", "2026-01-05"],
                "weather_code": [61, 0, 3, 95],
                "temperature_2m_max": [15.1, 17.0, 16.2, 14.0],
                "temperature_2m_min": [9.4, 8.8, 10.0, 11.5]
            }
        }"#;
        let response: DailyResponse = serde_json::from_str(json).unwrap();
        let reply = format_forecast(
            &lisbon(),
            &response.daily.unwrap(),
            TemperatureUnit::Imperial,
            3,
        );
        assert_eq!(
            reply,
            "Forecast for Lisbon (3 days): \
             Friday, Jan 02: Slight rain, high 15.1°F, low 9.4°F; \
             Saturday, Jan 03: Clear sky, high 17°F, low 8.8°F; \
             Sunday, Jan 04: Overcast, high 16.2°F, low 10°F"
        );
    }

    #[test]
    fn test_geocoding_without_results() {
        let response: GeocodingResponse = serde_json::from_str(r#"{"generationtime_ms":0.5}"#).unwrap();
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_coordinates_skip_lookup() {
        let settings = WeatherSettings {
            enabled: true,
            location: "38.72,-9.14".to_string(),
            ..WeatherSettings::default()
        };
        let place = WeatherClient::new(&settings).locate().await.unwrap();
        assert_eq!(place.name, "38.72, -9.14");
        assert_eq!(place.latitude, 38.72);
    }
}
