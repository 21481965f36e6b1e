//! In-memory history store
//!
//! Holds one bounded history buffer and one latest slot per meter kind, the
//! last-update stamp, and the daily baseline tracker. Every write updates all
//! of them with the same reading in the same call, so the history and the
//! baselines always observe the same sequence.

use crate::reading::{MeterKind, Reading};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

pub mod baseline;
pub mod history;

pub use baseline::{BaselineKey, BaselineView, DailyBaselineTracker};
pub use history::HistoryBuffer;

/// Latest reading per kind
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct LatestSnapshot {
    pub grid: Option<Reading>,
    pub generation: Option<Reading>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Windowed history per kind, oldest first
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct HistorySnapshot {
    pub grid: Vec<Reading>,
    pub generation: Vec<Reading>,
}

#[derive(Debug, Clone)]
pub struct DataStore {
    grid: HistoryBuffer,
    generation: HistoryBuffer,
    latest_grid: Option<Reading>,
    latest_generation: Option<Reading>,
    last_update: Option<DateTime<Utc>>,
    baselines: DailyBaselineTracker,
}

impl DataStore {
    /// Create a store keeping `capacity` readings per kind, with days in `tz`
    pub fn new(capacity: usize, tz: Tz) -> Self {
        Self {
            grid: HistoryBuffer::new(capacity),
            generation: HistoryBuffer::new(capacity),
            latest_grid: None,
            latest_generation: None,
            last_update: None,
            baselines: DailyBaselineTracker::new(tz),
        }
    }

    pub fn record(&mut self, kind: MeterKind, reading: Option<Reading>) -> bool {
        self.record_at(kind, reading, Utc::now())
    }

    /// Append a reading and update latest slot, stamp and baselines.
    /// Returns false (and changes nothing) for an absent reading.
    pub fn record_at(
        &mut self,
        kind: MeterKind,
        reading: Option<Reading>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(reading) = reading else {
            return false;
        };

        self.baselines.update_at(kind, &reading, now);
        match kind {
            MeterKind::Grid => {
                self.grid.push(reading.clone());
                self.latest_grid = Some(reading);
            }
            MeterKind::Generation => {
                self.generation.push(reading.clone());
                self.latest_generation = Some(reading);
            }
        }
        self.last_update = Some(now);
        true
    }

    pub fn latest(&self) -> LatestSnapshot {
        LatestSnapshot {
            grid: self.latest_grid.clone(),
            generation: self.latest_generation.clone(),
            last_update: self.last_update,
        }
    }

    pub fn latest_reading(&self, kind: MeterKind) -> Option<&Reading> {
        match kind {
            MeterKind::Grid => self.latest_grid.as_ref(),
            MeterKind::Generation => self.latest_generation.as_ref(),
        }
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn history(&self, window: Duration) -> HistorySnapshot {
        self.history_at(window, Utc::now())
    }

    /// Readings strictly newer than `now - window`
    pub fn history_at(&self, window: Duration, now: DateTime<Utc>) -> HistorySnapshot {
        let cutoff = now - window;
        HistorySnapshot {
            grid: self.grid.since(cutoff),
            generation: self.generation.since(cutoff),
        }
    }

    /// Baselines valid for `now` (empty when the stored day is stale)
    pub fn baselines_at(&self, now: DateTime<Utc>) -> BaselineView {
        self.baselines.view_at(now)
    }

    pub fn timezone(&self) -> Tz {
        self.baselines.timezone()
    }

    pub fn capacity(&self) -> usize {
        self.grid.capacity()
    }

    pub fn len(&self, kind: MeterKind) -> usize {
        match kind {
            MeterKind::Grid => self.grid.len(),
            MeterKind::Generation => self.generation.len(),
        }
    }
}
