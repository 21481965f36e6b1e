//! Normalized meter readings
//!
//! A [`Reading`] is the immutable, fixed-shape snapshot produced from a raw
//! HomeWizard payload. The absent reading is `Option::<Reading>::None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod aggregate;
pub mod normalize;

pub use aggregate::{TaggedReading, combine_generation};
pub use normalize::{DevicePayload, normalize_generation, normalize_grid};

/// Which side of the installation a reading describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MeterKind {
    /// P1 grid interface meter
    Grid,
    /// kWh meter(s) on the generation side
    Generation,
}

impl MeterKind {
    pub fn label(self) -> &'static str {
        match self {
            MeterKind::Grid => "p1",
            MeterKind::Generation => "kwh",
        }
    }
}

/// Per-phase active power
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PhasePower {
    pub l1_w: f64,
    pub l2_w: f64,
    pub l3_w: f64,
}

/// Per-phase voltages; only phases that reported a positive value are set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PhaseVoltage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l1_v: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2_v: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3_v: Option<f64>,
    /// Mean of the phases that are present
    pub avg_v: f64,
}

/// One generation meter's contribution to a combined reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MeterSample {
    pub name: String,
    pub host: String,
    pub total_export_kwh: f64,
    pub active_power_w: f64,
    pub timestamp: DateTime<Utc>,
}

/// Normalized snapshot from one meter kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    pub kind: MeterKind,

    /// Cumulative imported energy (kWh); grid readings only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_import_kwh: Option<f64>,

    /// Cumulative exported energy (kWh)
    pub total_export_kwh: f64,

    /// Signed active power (W): positive consumes from the grid, negative feeds in
    pub active_power_w: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_power: Option<PhasePower>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<PhaseVoltage>,

    pub timestamp: DateTime<Utc>,

    /// Contributing generation meters (empty for grid readings)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meters: Vec<MeterSample>,

    #[serde(default)]
    pub meter_count: usize,
}

impl Reading {
    /// Average grid voltage, when the meter reported any phase voltage
    pub fn voltage_avg_v(&self) -> Option<f64> {
        self.voltage.map(|v| v.avg_v)
    }
}
