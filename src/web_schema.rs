//! UI-oriented configuration schema for the dashboard
//!
//! Describes the runtime-editable sections that `webui/index.html` renders as a
//! form and posts back to `POST /api/config`.

use crate::config::MAX_RETENTION_HOURS;
use serde_json::{Value, json};

/// Build the UI configuration schema consumed by the dashboard
pub fn build_ui_schema() -> Value {
    json!({
        "sections": {
            "homewizard_p1": {"title": "HomeWizard P1 meter", "type": "object", "fields": {
                "host": {"type": "string", "title": "Host or IP"},
                "enabled": {"type": "boolean", "title": "Enabled"}
            }},
            "homewizard_kwh_meters": {"title": "HomeWizard kWh meters", "type": "list", "item": {"type": "object", "fields": {
                "name": {"type": "string", "title": "Name (optional)"},
                "host": {"type": "string", "title": "Host or IP"},
                "enabled": {"type": "boolean", "title": "Enabled"}
            }}},
            "pvoutput": {"title": "PVOutput", "type": "object", "fields": {
                "system_id": {"type": "string", "title": "System ID"},
                "api_key": {"type": "secret", "title": "API key (leave empty to keep)"}
            }},
            "weather": {"title": "Weather (Open-Meteo)", "type": "object", "fields": {
                "enabled": {"type": "boolean", "title": "Send temperature"},
                "latitude": {"type": "number", "min": -90.0, "max": 90.0, "step": 0.0001, "title": "Latitude"},
                "longitude": {"type": "number", "min": -180.0, "max": 180.0, "step": 0.0001, "title": "Longitude"},
                "cache_minutes": {"type": "integer", "min": 1, "max": 1440, "title": "Cache (min)"}
            }},
            "update_interval": {"title": "Update interval (s)", "type": "integer", "min": 1, "max": 3600}
        },
        "read_only": {
            "history.retention_hours": {"type": "integer", "min": 1, "max": MAX_RETENTION_HOURS},
            "timezone": {"type": "string"}
        }
    })
}
