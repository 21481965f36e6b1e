//! Configuration management for pvbridge
//!
//! This module handles loading, validation, runtime updates and saving of the
//! application configuration from YAML files, including migration of older
//! single-meter configuration files.

use crate::error::{PvBridgeError, Result};
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod defaults;

fn default_true() -> bool {
    true
}

/// Upper bound for in-memory history retention (one week)
pub const MAX_RETENTION_HOURS: u32 = 168;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// HomeWizard P1 (grid interface) meter
    pub homewizard_p1: MeterConfig,

    /// HomeWizard kWh meters measuring generation (solar inverters)
    pub homewizard_kwh_meters: Vec<KwhMeterConfig>,

    /// Legacy single kWh meter section; migrated into `homewizard_kwh_meters`
    #[serde(skip_serializing)]
    #[schemars(skip)]
    pub homewizard_kwh: Option<MeterConfig>,

    /// PVOutput credentials and endpoint
    pub pvoutput: PvOutputConfig,

    /// Optional Open-Meteo temperature lookup
    pub weather: WeatherConfig,

    /// Delay between poll cycles in seconds
    pub update_interval: u64,

    /// In-memory history retention
    pub history: HistoryConfig,

    /// IANA timezone that defines the calendar day for daily totals
    pub timezone: String,

    /// Web server binding configuration
    pub webserver: WebConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// A single meter reachable on the local network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MeterConfig {
    /// Hostname or IP address (optionally with port)
    pub host: String,

    /// Whether the meter is polled
    pub enabled: bool,
}

/// A named generation meter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KwhMeterConfig {
    /// Display name; the host is used when empty
    #[serde(default)]
    pub name: String,

    /// Hostname or IP address (optionally with port)
    pub host: String,

    /// Whether the meter is polled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// PVOutput API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PvOutputConfig {
    /// PVOutput API key
    pub api_key: String,

    /// PVOutput system id
    pub system_id: String,

    /// Service base URL (overridable for testing)
    pub base_url: String,
}

/// Weather lookup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WeatherConfig {
    /// Whether temperature is looked up and forwarded
    pub enabled: bool,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Cache lifetime in minutes
    pub cache_minutes: u32,

    /// Open-Meteo forecast endpoint (overridable for testing)
    pub base_url: String,
}

/// History retention configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HistoryConfig {
    /// Hours of readings kept per meter kind (one slot per minute)
    pub retention_hours: u32,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl KwhMeterConfig {
    /// Name used in logs and audit data
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.host
        } else {
            &self.name
        }
    }
}

impl PvOutputConfig {
    /// Both credentials are present
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.system_id.trim().is_empty()
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.migrate_legacy();
        Ok(config)
    }

    /// Path of the configuration file to use: `$PVBRIDGE_CONFIG`, else the first
    /// existing default location, else `config/config.yaml`
    pub fn locate() -> PathBuf {
        if let Some(p) = std::env::var_os("PVBRIDGE_CONFIG") {
            return PathBuf::from(p);
        }
        let default_paths = [
            "config/config.yaml",
            "pvbridge.yaml",
            "/etc/pvbridge/config.yaml",
        ];
        default_paths
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .unwrap_or_else(|| PathBuf::from(default_paths[0]))
    }

    /// Load from `path` when it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Fold a legacy `homewizard_kwh` section into the meter list
    pub fn migrate_legacy(&mut self) {
        if let Some(legacy) = self.homewizard_kwh.take()
            && self.homewizard_kwh_meters.is_empty()
            && !legacy.host.trim().is_empty()
        {
            self.homewizard_kwh_meters.push(KwhMeterConfig {
                name: String::new(),
                host: legacy.host,
                enabled: legacy.enabled,
            });
        }
    }

    /// Host of the P1 meter when it is enabled and configured
    pub fn p1_host(&self) -> Option<&str> {
        let host = self.homewizard_p1.host.trim();
        (self.homewizard_p1.enabled && !host.is_empty()).then_some(host)
    }

    /// Generation meters that are enabled and have a host
    pub fn enabled_kwh_meters(&self) -> Vec<&KwhMeterConfig> {
        self.homewizard_kwh_meters
            .iter()
            .filter(|m| m.enabled && !m.host.trim().is_empty())
            .collect()
    }

    /// Parsed timezone; UTC if the configured name is unknown
    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or(Tz::UTC)
    }

    /// Ring buffer capacity per meter kind
    pub fn history_capacity(&self) -> usize {
        self.history.retention_hours as usize * 60
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.update_interval == 0 {
            return Err(PvBridgeError::validation(
                "update_interval",
                "Must be greater than 0",
            ));
        }

        if self.history.retention_hours == 0 || self.history.retention_hours > MAX_RETENTION_HOURS
        {
            return Err(PvBridgeError::validation(
                "history.retention_hours",
                format!("Must be between 1 and {}", MAX_RETENTION_HOURS),
            ));
        }

        if self.timezone.parse::<Tz>().is_err() {
            return Err(PvBridgeError::validation(
                "timezone",
                format!("Unknown timezone '{}'", self.timezone),
            ));
        }

        if self.webserver.port == 0 {
            return Err(PvBridgeError::validation(
                "webserver.port",
                "Port must be greater than 0",
            ));
        }

        if self.homewizard_p1.enabled && self.homewizard_p1.host.trim().is_empty() {
            return Err(PvBridgeError::validation(
                "homewizard_p1.host",
                "Host is required when the meter is enabled",
            ));
        }

        if let Some(idx) = self
            .homewizard_kwh_meters
            .iter()
            .position(|m| m.enabled && m.host.trim().is_empty())
        {
            return Err(PvBridgeError::validation(
                format!("homewizard_kwh_meters[{}].host", idx),
                "Host is required when the meter is enabled".to_string(),
            ));
        }

        if self.weather.enabled {
            if !(-90.0..=90.0).contains(&self.weather.latitude) {
                return Err(PvBridgeError::validation(
                    "weather.latitude",
                    "Must be between -90 and 90",
                ));
            }
            if !(-180.0..=180.0).contains(&self.weather.longitude) {
                return Err(PvBridgeError::validation(
                    "weather.longitude",
                    "Must be between -180 and 180",
                ));
            }
        }

        Ok(())
    }
}

/// Partial runtime update as posted by the dashboard
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct ConfigUpdate {
    #[schema(value_type = Option<Object>)]
    pub homewizard_p1: Option<MeterConfig>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub homewizard_kwh_meters: Option<Vec<KwhMeterConfig>>,
    /// Legacy single-meter form; replaces the meter list with one entry
    #[schema(value_type = Option<Object>)]
    pub homewizard_kwh: Option<MeterConfig>,
    pub pvoutput: Option<PvOutputUpdate>,
    #[schema(value_type = Option<Object>)]
    pub weather: Option<WeatherConfig>,
    pub update_interval: Option<u64>,
}

/// PVOutput section of a runtime update; an empty or missing key keeps the stored one
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct PvOutputUpdate {
    pub api_key: Option<String>,
    pub system_id: Option<String>,
    pub base_url: Option<String>,
}

/// Which client caches must be dropped after an update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigChanges {
    pub p1: bool,
    pub kwh_meters: bool,
    pub pvoutput: bool,
    pub weather: bool,
}

impl ConfigUpdate {
    /// Apply onto a copy of `current`; the caller validates and swaps it in
    pub fn apply_to(&self, current: &Config) -> (Config, ConfigChanges) {
        let mut next = current.clone();
        let mut changes = ConfigChanges::default();

        if let Some(p1) = &self.homewizard_p1 {
            changes.p1 = *p1 != next.homewizard_p1;
            next.homewizard_p1 = p1.clone();
        }

        if let Some(meters) = &self.homewizard_kwh_meters {
            changes.kwh_meters = *meters != next.homewizard_kwh_meters;
            next.homewizard_kwh_meters = meters.clone();
        } else if let Some(legacy) = &self.homewizard_kwh {
            let meters = if legacy.host.trim().is_empty() {
                Vec::new()
            } else {
                vec![KwhMeterConfig {
                    name: String::new(),
                    host: legacy.host.clone(),
                    enabled: legacy.enabled,
                }]
            };
            changes.kwh_meters = meters != next.homewizard_kwh_meters;
            next.homewizard_kwh_meters = meters;
        }

        if let Some(pv) = &self.pvoutput {
            let before = next.pvoutput.clone();
            if let Some(key) = pv.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
                next.pvoutput.api_key = key.trim().to_string();
            }
            if let Some(id) = &pv.system_id {
                next.pvoutput.system_id = id.trim().to_string();
            }
            if let Some(url) = pv.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
                next.pvoutput.base_url = url.trim().to_string();
            }
            changes.pvoutput = before != next.pvoutput;
        }

        if let Some(weather) = &self.weather {
            changes.weather = *weather != next.weather;
            next.weather = weather.clone();
        }

        if let Some(interval) = self.update_interval {
            next.update_interval = interval;
        }

        (next, changes)
    }
}
