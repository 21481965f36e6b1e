//! Open-Meteo temperature lookup with a small TTL cache
//!
//! Temperature is optional: callers treat any error here as "no temperature".
//! A failed fetch falls back to an expired cache entry when one exists.

use crate::error::{PvBridgeError, Result};
use crate::logging::{StructuredLogger, get_logger};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Current conditions at the configured location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherObservation {
    pub temperature_c: f64,
    pub weather_code: i64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: Option<f64>,
    weather_code: Option<i64>,
}

/// Parse an Open-Meteo forecast body
pub fn parse_forecast(body: &str, at: DateTime<Utc>) -> Result<WeatherObservation> {
    let resp: ForecastResponse = serde_json::from_str(body)?;
    let current = resp.current.ok_or_else(|| {
        PvBridgeError::validation("current", "Open-Meteo response has no current block")
    })?;
    let temperature_c = current.temperature_2m.ok_or_else(|| {
        PvBridgeError::validation(
            "current.temperature_2m",
            "Open-Meteo response has no temperature",
        )
    })?;
    Ok(WeatherObservation {
        temperature_c,
        weather_code: current.weather_code.unwrap_or(0),
        fetched_at: at,
    })
}

type CacheKey = (i64, i64);

fn cache_key(latitude: f64, longitude: f64) -> CacheKey {
    // 4 decimals is roughly 10 m
    (
        (latitude * 10_000.0).round() as i64,
        (longitude * 10_000.0).round() as i64,
    )
}

/// Observations keyed by rounded coordinates, each with an expiry
#[derive(Debug, Clone)]
pub struct WeatherCache {
    ttl: Duration,
    entries: HashMap<CacheKey, (WeatherObservation, DateTime<Utc>)>,
}

impl WeatherCache {
    pub fn new(ttl_minutes: u32) -> Self {
        Self {
            ttl: Duration::minutes(i64::from(ttl_minutes)),
            entries: HashMap::new(),
        }
    }

    /// Fresh entry only
    pub fn get_at(&self, latitude: f64, longitude: f64, now: DateTime<Utc>) -> Option<WeatherObservation> {
        self.entries
            .get(&cache_key(latitude, longitude))
            .filter(|(_, expiry)| now < *expiry)
            .map(|(obs, _)| obs.clone())
    }

    /// Entry regardless of age
    pub fn get_even_if_expired(&self, latitude: f64, longitude: f64) -> Option<WeatherObservation> {
        self.entries
            .get(&cache_key(latitude, longitude))
            .map(|(obs, _)| obs.clone())
    }

    pub fn set_at(&mut self, latitude: f64, longitude: f64, obs: WeatherObservation, now: DateTime<Utc>) {
        self.entries
            .insert(cache_key(latitude, longitude), (obs, now + self.ttl));
    }
}

/// Open-Meteo client for one location
pub struct OpenMeteoClient {
    latitude: f64,
    longitude: f64,
    base_url: String,
    http: reqwest::Client,
    cache: Mutex<WeatherCache>,
    logger: StructuredLogger,
}

impl OpenMeteoClient {
    pub fn new(latitude: f64, longitude: f64, cache_minutes: u32, base_url: &str) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(PvBridgeError::validation(
                "latitude",
                format!("Must be between -90 and 90, got {}", latitude),
            ));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(PvBridgeError::validation(
                "longitude",
                format!("Must be between -180 and 180, got {}", longitude),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            latitude,
            longitude,
            base_url: base_url.to_string(),
            http,
            cache: Mutex::new(WeatherCache::new(cache_minutes)),
            logger: get_logger("weather"),
        })
    }

    /// Current conditions, from cache when fresh
    pub async fn current(&self) -> Result<WeatherObservation> {
        let now = Utc::now();
        if let Some(obs) = self
            .cache
            .lock()
            .await
            .get_at(self.latitude, self.longitude, now)
        {
            self.logger.trace("Using cached weather");
            return Ok(obs);
        }

        match self.fetch(now).await {
            Ok(obs) => {
                self.cache
                    .lock()
                    .await
                    .set_at(self.latitude, self.longitude, obs.clone(), now);
                self.logger
                    .debug(&format!("Fetched temperature {:.1}°C", obs.temperature_c));
                Ok(obs)
            }
            Err(e) => {
                let stale = self
                    .cache
                    .lock()
                    .await
                    .get_even_if_expired(self.latitude, self.longitude);
                match stale {
                    Some(obs) => {
                        self.logger
                            .warn(&format!("Weather fetch failed ({}), using expired cache", e));
                        Ok(obs)
                    }
                    None => Err(e),
                }
            }
        }
    }

    async fn fetch(&self, now: DateTime<Utc>) -> Result<WeatherObservation> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                ("current", "temperature_2m,weather_code".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;
        parse_forecast(&body, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forecast() {
        let now = Utc::now();
        let obs = parse_forecast(
            r#"{"current": {"temperature_2m": 14.3, "weather_code": 3}}"#,
            now,
        )
        .unwrap();
        assert_eq!(obs.temperature_c, 14.3);
        assert_eq!(obs.weather_code, 3);

        let err = parse_forecast(r#"{"latitude": 52.0}"#, now).unwrap_err();
        assert!(err.is_validation());
        let err = parse_forecast(r#"{"current": {"weather_code": 1}}"#, now).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_rejects_out_of_range_coordinates() {
        assert!(OpenMeteoClient::new(91.0, 0.0, 15, "http://localhost").is_err());
        assert!(OpenMeteoClient::new(0.0, -180.5, 15, "http://localhost").is_err());
        assert!(OpenMeteoClient::new(52.37, 4.89, 15, "http://localhost").is_ok());
    }
}
