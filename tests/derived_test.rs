use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use pvbridge::derived::{daily_totals_at, instant_totals, statistics};
use pvbridge::reading::{DevicePayload, TaggedReading, combine_generation, normalize_generation, normalize_grid};
use pvbridge::{DataStore, MeterKind};

fn grid_payload(import: f64, export: f64, power: f64) -> DevicePayload {
    DevicePayload {
        total_power_import_kwh: Some(import),
        total_power_export_kwh: Some(export),
        active_power_w: Some(power),
        ..Default::default()
    }
}

fn record_grid(store: &mut DataStore, payload: DevicePayload, at: DateTime<Utc>) {
    store.record_at(MeterKind::Grid, normalize_grid(Some(&payload), at), at);
}

fn record_generation(store: &mut DataStore, export: f64, power: f64, at: DateTime<Utc>) {
    let payload = DevicePayload {
        total_power_export_kwh: Some(export),
        active_power_w: Some(power),
        ..Default::default()
    };
    store.record_at(
        MeterKind::Generation,
        normalize_generation(Some(&payload), at),
        at,
    );
}

#[test]
fn grid_only_day_scenario() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap();
    let t1 = t0 + Duration::hours(3);
    let mut store = DataStore::new(600, Tz::UTC);
    record_grid(&mut store, grid_payload(1000.0, 0.0, 200.0), t0);
    record_grid(&mut store, grid_payload(1000.5, 0.0, 150.0), t1);

    let totals = daily_totals_at(&store, t1);
    assert_eq!(totals.energy_import_wh, 500);
    assert_eq!(totals.energy_export_wh, 0);
    assert_eq!(totals.energy_generation_wh, 0);
    assert_eq!(totals.energy_consumption_wh, 500);
}

#[test]
fn grid_scenario_without_generation_baseline() {
    let yesterday = Utc.with_ymd_and_hms(2024, 3, 9, 18, 0, 0).unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
    let t1 = t0 + Duration::minutes(30);
    let mut store = DataStore::new(600, Tz::UTC);
    // Latest generation reading exists, but nothing recorded for it today
    record_generation(&mut store, 5.0, 200.0, yesterday);

    record_grid(&mut store, grid_payload(100.0, 10.0, 500.0), t0);
    record_grid(&mut store, grid_payload(100.5, 10.0, 300.0), t1);

    assert!(store.latest_reading(MeterKind::Generation).is_some());
    let totals = daily_totals_at(&store, t1);
    assert_eq!(totals.energy_import_wh, 500);
    assert_eq!(totals.energy_export_wh, 0);
    assert_eq!(totals.energy_generation_wh, 0);
    assert_eq!(totals.energy_consumption_wh, 500);
}

#[test]
fn consumption_combines_generation_import_and_export() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap();
    let t1 = t0 + Duration::hours(6);
    let mut store = DataStore::new(600, Tz::UTC);
    record_grid(&mut store, grid_payload(100.0, 50.0, 0.0), t0);
    record_generation(&mut store, 2000.0, 0.0, t0);
    record_grid(&mut store, grid_payload(101.0, 53.0, -500.0), t1);
    record_generation(&mut store, 2006.0, 2500.0, t1);

    let totals = daily_totals_at(&store, t1);
    assert_eq!(totals.energy_generation_wh, 6000);
    assert_eq!(totals.energy_import_wh, 1000);
    assert_eq!(totals.energy_export_wh, 3000);
    assert_eq!(totals.energy_consumption_wh, 4000);
}

#[test]
fn daily_totals_are_idempotent() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap();
    let mut store = DataStore::new(600, Tz::UTC);
    record_grid(&mut store, grid_payload(10.0, 1.0, 0.0), t0);
    record_grid(&mut store, grid_payload(12.25, 1.5, 0.0), t0 + Duration::minutes(30));

    let now = t0 + Duration::hours(1);
    let first = daily_totals_at(&store, now);
    let second = daily_totals_at(&store, now);
    assert_eq!(first, second);
    assert_eq!(instant_totals(&store), instant_totals(&store));
}

#[test]
fn stale_baselines_after_midnight_give_zero_totals() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let mut store = DataStore::new(600, Tz::UTC);
    record_grid(&mut store, grid_payload(10.0, 1.0, 0.0), t0);
    record_grid(&mut store, grid_payload(11.0, 1.0, 0.0), t0 + Duration::hours(1));

    let next_day = t0 + Duration::days(1);
    let totals = daily_totals_at(&store, next_day);
    assert_eq!(totals.energy_import_wh, 0);
    assert_eq!(totals.date, next_day.date_naive());
}

#[test]
fn self_consumption_while_exporting() {
    let at = Utc::now();
    let mut store = DataStore::new(60, Tz::UTC);
    record_grid(&mut store, grid_payload(0.0, 0.0, -150.0), at);
    record_generation(&mut store, 0.0, 400.0, at);

    let totals = instant_totals(&store);
    assert_eq!(totals.generation_w, 400.0);
    assert_eq!(totals.grid_power_w, -150.0);
    assert_eq!(totals.consumption_w, 250.0);
    assert_eq!(totals.self_consumption_w, 400.0);
}

#[test]
fn self_consumption_while_importing() {
    let at = Utc::now();
    let mut store = DataStore::new(60, Tz::UTC);
    record_grid(&mut store, grid_payload(0.0, 0.0, 100.0), at);
    record_generation(&mut store, 0.0, 300.0, at);

    let totals = instant_totals(&store);
    assert_eq!(totals.consumption_w, 400.0);
    assert_eq!(totals.self_consumption_w, 300.0);
}

#[test]
fn missing_readings_contribute_zero() {
    let store = DataStore::new(60, Tz::UTC);
    let totals = instant_totals(&store);
    assert_eq!(totals.generation_w, 0.0);
    assert_eq!(totals.consumption_w, 0.0);
    assert_eq!(totals.self_consumption_w, 0.0);

    let daily = daily_totals_at(&store, Utc::now());
    assert_eq!(daily.energy_consumption_wh, 0);
}

#[test]
fn statistics_include_individual_meters() {
    let at = Utc::now();
    let mut store = DataStore::new(60, Tz::UTC);
    let meter = |name: &str, power: f64| {
        let payload = DevicePayload {
            total_power_export_kwh: Some(100.0),
            active_power_w: Some(power),
            ..Default::default()
        };
        TaggedReading {
            name: name.to_string(),
            host: format!("{}.lan", name),
            reading: normalize_generation(Some(&payload), at),
        }
    };
    let combined = combine_generation(&[meter("east", 700.0), meter("west", 300.0)]);
    store.record_at(MeterKind::Generation, combined, at);

    let stats = statistics(&store);
    let generation = stats.generation.unwrap();
    assert_eq!(generation.current_power_w, 1000.0);
    assert_eq!(generation.total_generated_kwh, 200.0);
    assert_eq!(generation.meter_count, 2);
    assert_eq!(stats.meters.len(), 2);
    assert!(stats.grid.is_none());
}
