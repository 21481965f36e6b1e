use super::{MeterKind, PhasePower, PhaseVoltage, Reading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `GET /api/v1/data` as far as pvbridge uses it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicePayload {
    pub total_power_import_kwh: Option<f64>,
    pub total_power_export_kwh: Option<f64>,
    pub active_power_w: Option<f64>,
    pub active_power_l1_w: Option<f64>,
    pub active_power_l2_w: Option<f64>,
    pub active_power_l3_w: Option<f64>,
    pub active_voltage_l1_v: Option<f64>,
    pub active_voltage_l2_v: Option<f64>,
    pub active_voltage_l3_v: Option<f64>,

    /// Everything else the device reports (wifi strength, tariffs, ...)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl DevicePayload {
    /// The device answered with no fields at all
    pub fn is_empty(&self) -> bool {
        self.total_power_import_kwh.is_none()
            && self.total_power_export_kwh.is_none()
            && self.active_power_w.is_none()
            && self.active_power_l1_w.is_none()
            && self.active_power_l2_w.is_none()
            && self.active_power_l3_w.is_none()
            && self.active_voltage_l1_v.is_none()
            && self.active_voltage_l2_v.is_none()
            && self.active_voltage_l3_v.is_none()
            && self.extra.is_empty()
    }

    fn voltage(&self) -> Option<PhaseVoltage> {
        let positive = |v: Option<f64>| v.filter(|x| *x > 0.0);
        let l1_v = positive(self.active_voltage_l1_v);
        let l2_v = positive(self.active_voltage_l2_v);
        let l3_v = positive(self.active_voltage_l3_v);

        let present: Vec<f64> = [l1_v, l2_v, l3_v].into_iter().flatten().collect();
        if present.is_empty() {
            return None;
        }
        let avg_v = present.iter().sum::<f64>() / present.len() as f64;
        Some(PhaseVoltage {
            l1_v,
            l2_v,
            l3_v,
            avg_v,
        })
    }
}

/// Normalize a P1 payload; `None` for an absent or empty payload
pub fn normalize_grid(payload: Option<&DevicePayload>, at: DateTime<Utc>) -> Option<Reading> {
    let p = payload.filter(|p| !p.is_empty())?;
    Some(Reading {
        kind: MeterKind::Grid,
        total_import_kwh: Some(p.total_power_import_kwh.unwrap_or(0.0)),
        total_export_kwh: p.total_power_export_kwh.unwrap_or(0.0),
        active_power_w: p.active_power_w.unwrap_or(0.0),
        phase_power: Some(PhasePower {
            l1_w: p.active_power_l1_w.unwrap_or(0.0),
            l2_w: p.active_power_l2_w.unwrap_or(0.0),
            l3_w: p.active_power_l3_w.unwrap_or(0.0),
        }),
        voltage: p.voltage(),
        timestamp: at,
        meters: Vec::new(),
        meter_count: 0,
    })
}

/// Normalize a single kWh meter payload; `None` for an absent or empty payload
pub fn normalize_generation(
    payload: Option<&DevicePayload>,
    at: DateTime<Utc>,
) -> Option<Reading> {
    let p = payload.filter(|p| !p.is_empty())?;
    Some(Reading {
        kind: MeterKind::Generation,
        total_import_kwh: None,
        total_export_kwh: p.total_power_export_kwh.unwrap_or(0.0),
        active_power_w: p.active_power_w.unwrap_or(0.0),
        phase_power: None,
        voltage: None,
        timestamp: at,
        meters: Vec::new(),
        meter_count: 1,
    })
}
