//! PVOutput status payload
//!
//! Maps derived figures onto the six `addstatus` values. Fields whose input is
//! absent are omitted, never zero-filled.

use crate::derived::DailyTotals;
use crate::reading::Reading;
use serde::Serialize;
use utoipa::ToSchema;

/// Values for one PVOutput status (v1..v6)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct StatusPayload {
    /// v1: energy generated today (Wh)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_generation: Option<i64>,
    /// v2: generation power now (W)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_generation: Option<i64>,
    /// v3: energy consumed today (Wh)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_consumption: Option<i64>,
    /// v4: consumption power now (W)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_consumption: Option<i64>,
    /// v5: temperature (°C)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// v6: grid voltage (V)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
}

impl StatusPayload {
    pub fn is_empty(&self) -> bool {
        *self == StatusPayload::default()
    }

    /// `(vN, value)` pairs for the fields that are present
    pub fn form_values(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::with_capacity(6);
        if let Some(v) = self.energy_generation {
            out.push(("v1", v.to_string()));
        }
        if let Some(v) = self.power_generation {
            out.push(("v2", v.to_string()));
        }
        if let Some(v) = self.energy_consumption {
            out.push(("v3", v.to_string()));
        }
        if let Some(v) = self.power_consumption {
            out.push(("v4", v.to_string()));
        }
        if let Some(v) = self.temperature {
            out.push(("v5", format!("{:.1}", v)));
        }
        if let Some(v) = self.voltage {
            out.push(("v6", format!("{:.1}", v)));
        }
        out
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Build the status payload from today's totals and this cycle's readings.
///
/// Powers come from the readings passed in, not from the store: a meter that
/// failed this cycle contributes 0 W to consumption. Generation power is taken
/// as a magnitude since kWh meters report production as negative watts.
pub fn build_status_payload(
    daily: &DailyTotals,
    grid: Option<&Reading>,
    generation: Option<&Reading>,
    temperature_c: Option<f64>,
) -> StatusPayload {
    let mut payload = StatusPayload::default();
    let generation_w = generation.map_or(0.0, |r| r.active_power_w.abs());

    if generation.is_some() {
        payload.energy_generation = Some(daily.energy_generation_wh);
        payload.power_generation = Some(generation_w as i64);
    }

    if let Some(grid) = grid {
        payload.energy_consumption = Some(daily.energy_consumption_wh);
        payload.power_consumption = Some((generation_w + grid.active_power_w).abs() as i64);
    }

    payload.temperature = temperature_c.map(round1);
    payload.voltage = grid.and_then(Reading::voltage_avg_v).map(round1);

    payload
}
