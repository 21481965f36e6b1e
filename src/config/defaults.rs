use super::*;

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            enabled: false,
        }
    }
}

impl Default for PvOutputConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            system_id: String::new(),
            base_url: "https://pvoutput.org/service/r2".to_string(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            latitude: 52.37,
            longitude: 4.89,
            cache_minutes: 15,
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_hours: 24,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/pvbridge.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            homewizard_p1: MeterConfig::default(),
            homewizard_kwh_meters: Vec::new(),
            homewizard_kwh: None,
            pvoutput: PvOutputConfig::default(),
            weather: WeatherConfig::default(),
            update_interval: 300,
            history: HistoryConfig::default(),
            timezone: "Europe/Amsterdam".to_string(),
            webserver: WebConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
