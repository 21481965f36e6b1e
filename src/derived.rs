//! Daily and instantaneous figures derived from the store
//!
//! All functions are pure reads over a [`DataStore`]: calling them repeatedly
//! without an intervening write gives identical results.

use crate::reading::{MeterKind, MeterSample};
use crate::store::{BaselineKey, BaselineView, DataStore};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Energy accumulated since the start of the local day (Wh)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub energy_generation_wh: i64,
    pub energy_import_wh: i64,
    pub energy_export_wh: i64,
    pub energy_consumption_wh: i64,
}

/// Power figures from the latest readings (W)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct InstantTotals {
    pub generation_w: f64,
    pub consumption_w: f64,
    pub grid_power_w: f64,
    pub self_consumption_w: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GridSummary {
    pub current_power_w: f64,
    pub total_import_kwh: f64,
    pub total_export_kwh: f64,
    pub is_importing: bool,
    pub is_exporting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GenerationSummary {
    pub current_power_w: f64,
    pub total_generated_kwh: f64,
    pub meter_count: usize,
}

/// Dashboard statistics over the latest readings
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Statistics {
    pub grid: Option<GridSummary>,
    pub generation: Option<GenerationSummary>,
    pub totals: InstantTotals,
    pub meters: Vec<MeterSample>,
}

/// Counter delta since the baseline in Wh; zero without a baseline, never negative
fn delta_wh(current: Option<f64>, view: &BaselineView, key: BaselineKey) -> i64 {
    match (current, view.get(key)) {
        (Some(current), Some(baseline)) => ((current - baseline).max(0.0) * 1000.0) as i64,
        _ => 0,
    }
}

pub fn daily_totals(store: &DataStore) -> DailyTotals {
    daily_totals_at(store, Utc::now())
}

pub fn daily_totals_at(store: &DataStore, now: DateTime<Utc>) -> DailyTotals {
    let view = store.baselines_at(now);
    let grid = store.latest_reading(MeterKind::Grid);
    let generation = store.latest_reading(MeterKind::Generation);

    let energy_generation_wh = delta_wh(
        generation.map(|r| r.total_export_kwh),
        &view,
        BaselineKey::GenerationExport,
    );
    let energy_import_wh = delta_wh(
        grid.and_then(|r| r.total_import_kwh),
        &view,
        BaselineKey::GridImport,
    );
    let energy_export_wh = delta_wh(
        grid.map(|r| r.total_export_kwh),
        &view,
        BaselineKey::GridExport,
    );

    DailyTotals {
        date: view.date,
        energy_generation_wh,
        energy_import_wh,
        energy_export_wh,
        energy_consumption_wh: energy_generation_wh + energy_import_wh - energy_export_wh,
    }
}

pub fn instant_totals(store: &DataStore) -> InstantTotals {
    let generation_w = store
        .latest_reading(MeterKind::Generation)
        .map_or(0.0, |r| r.active_power_w);
    let grid_power_w = store
        .latest_reading(MeterKind::Grid)
        .map_or(0.0, |r| r.active_power_w);
    let consumption_w = generation_w + grid_power_w;
    let self_consumption_w = if grid_power_w >= 0.0 {
        generation_w.min(consumption_w)
    } else {
        generation_w
    };

    InstantTotals {
        generation_w,
        consumption_w,
        grid_power_w,
        self_consumption_w,
    }
}

pub fn statistics(store: &DataStore) -> Statistics {
    let grid = store.latest_reading(MeterKind::Grid).map(|r| GridSummary {
        current_power_w: r.active_power_w,
        total_import_kwh: r.total_import_kwh.unwrap_or(0.0),
        total_export_kwh: r.total_export_kwh,
        is_importing: r.active_power_w > 0.0,
        is_exporting: r.active_power_w < 0.0,
    });
    let generation_reading = store.latest_reading(MeterKind::Generation);
    let generation = generation_reading.map(|r| GenerationSummary {
        current_power_w: r.active_power_w,
        total_generated_kwh: r.total_export_kwh,
        meter_count: r.meter_count,
    });

    Statistics {
        grid,
        generation,
        totals: instant_totals(store),
        meters: generation_reading
            .map(|r| r.meters.clone())
            .unwrap_or_default(),
    }
}
