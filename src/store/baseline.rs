//! Start-of-day counter baselines
//!
//! The tracker remembers, per tracked counter, the first cumulative value seen
//! on the current calendar day. The day is evaluated in the configured
//! timezone and rollover is detected lazily on every call; there is no timer.

use crate::reading::{MeterKind, Reading};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

/// Cumulative counters that get a daily baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineKey {
    GridImport,
    GridExport,
    GenerationExport,
}

/// First-seen counter values for one calendar day
#[derive(Debug, Clone)]
pub struct DailyBaselineTracker {
    tz: Tz,
    day: Option<NaiveDate>,
    values: BTreeMap<BaselineKey, f64>,
}

impl DailyBaselineTracker {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            day: None,
            values: BTreeMap::new(),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Calendar date of `now` in the tracker's timezone
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// Clear the set when `now` falls on a different day. Returns true on rollover.
    pub fn roll_over_if_needed(&mut self, now: DateTime<Utc>) -> bool {
        let today = self.local_date(now);
        if self.day == Some(today) {
            return false;
        }
        self.day = Some(today);
        self.values.clear();
        true
    }

    /// Record baselines for the counters present in `reading` (first value wins)
    pub fn update_at(&mut self, kind: MeterKind, reading: &Reading, now: DateTime<Utc>) {
        self.roll_over_if_needed(now);
        for (key, value) in tracked_values(kind, reading) {
            self.values.entry(key).or_insert(value);
        }
    }

    /// Baselines valid for `now`; a stale set reads as empty
    pub fn view_at(&self, now: DateTime<Utc>) -> BaselineView {
        let today = self.local_date(now);
        let values = if self.day == Some(today) {
            self.values.clone()
        } else {
            BTreeMap::new()
        };
        BaselineView { date: today, values }
    }
}

fn tracked_values(kind: MeterKind, reading: &Reading) -> Vec<(BaselineKey, f64)> {
    match kind {
        MeterKind::Grid => {
            let mut out = Vec::with_capacity(2);
            if let Some(import) = reading.total_import_kwh {
                out.push((BaselineKey::GridImport, import));
            }
            out.push((BaselineKey::GridExport, reading.total_export_kwh));
            out
        }
        MeterKind::Generation => vec![(BaselineKey::GenerationExport, reading.total_export_kwh)],
    }
}

/// Day-checked, owned snapshot of the baseline set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineView {
    pub date: NaiveDate,
    pub values: BTreeMap<BaselineKey, f64>,
}

impl BaselineView {
    pub fn get(&self, key: BaselineKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{DevicePayload, normalize_grid};
    use chrono::TimeZone;

    fn grid(import: f64, export: f64, at: DateTime<Utc>) -> Reading {
        let payload = DevicePayload {
            total_power_import_kwh: Some(import),
            total_power_export_kwh: Some(export),
            ..Default::default()
        };
        normalize_grid(Some(&payload), at).unwrap()
    }

    #[test]
    fn test_first_value_of_day_wins() {
        let mut tracker = DailyBaselineTracker::new(Tz::UTC);
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        tracker.update_at(MeterKind::Grid, &grid(1000.0, 50.0, t0), t0);
        tracker.update_at(MeterKind::Grid, &grid(1003.0, 52.0, t1), t1);

        let view = tracker.view_at(t1);
        assert_eq!(view.get(BaselineKey::GridImport), Some(1000.0));
        assert_eq!(view.get(BaselineKey::GridExport), Some(50.0));
        assert_eq!(view.get(BaselineKey::GenerationExport), None);
    }

    #[test]
    fn test_rollover_clears_before_repopulating() {
        let mut tracker = DailyBaselineTracker::new(Tz::UTC);
        let day1 = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 5, 2, 0, 1, 0).unwrap();
        tracker.update_at(MeterKind::Grid, &grid(1000.0, 50.0, day1), day1);
        tracker.update_at(MeterKind::Grid, &grid(1010.0, 51.0, day2), day2);

        let view = tracker.view_at(day2);
        assert_eq!(view.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(view.get(BaselineKey::GridImport), Some(1010.0));
        assert_eq!(view.get(BaselineKey::GridExport), Some(51.0));
    }

    #[test]
    fn test_stale_set_reads_empty() {
        let mut tracker = DailyBaselineTracker::new(Tz::UTC);
        let day1 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        tracker.update_at(MeterKind::Grid, &grid(1000.0, 50.0, day1), day1);

        let next_day = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        assert!(tracker.view_at(next_day).is_empty());
        // Reading does not mutate; the old day is still visible for its own date
        assert!(!tracker.view_at(day1).is_empty());
    }

    #[test]
    fn test_day_follows_configured_timezone() {
        let tz: Tz = "Europe/Amsterdam".parse().unwrap();
        let mut tracker = DailyBaselineTracker::new(tz);
        // 22:30 UTC on May 1st is already May 2nd in Amsterdam (UTC+2)
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 22, 30, 0).unwrap();
        tracker.update_at(MeterKind::Grid, &grid(1.0, 0.0, late), late);
        assert_eq!(
            tracker.view_at(late).date,
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
        );
    }
}
