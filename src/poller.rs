//! Periodic poll cycle
//!
//! A cycle reads the P1 meter and all enabled kWh meters, records the
//! normalized readings, derives the daily totals and
//! forwards them to PVOutput. Cycles never overlap: the scheduled loop and the
//! on-demand trigger both go through [`run_cycle`], which holds the context's
//! cycle lock.

use crate::context::AppContext;
use crate::derived::{DailyTotals, daily_totals_at};
use crate::homewizard::MeterSource;
use crate::logging::{StructuredLogger, get_logger};
use crate::payload::{StatusPayload, build_status_payload};
use crate::reading::{
    DevicePayload, MeterKind, Reading, TaggedReading, combine_generation, normalize_generation,
    normalize_grid,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use utoipa::ToSchema;

/// Outcome of one cycle, returned by update-now and broadcast on `/api/events`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub grid_recorded: bool,
    pub generation_recorded: bool,
    /// Generation meters that contributed to the combined reading
    pub meters_ok: usize,
    /// Display names of generation meters that failed this cycle
    pub meters_failed: Vec<String>,
    pub daily: DailyTotals,
    pub payload: StatusPayload,
    /// `None` when nothing was sent (no credentials or empty payload)
    pub pvoutput_sent: Option<bool>,
}

struct MeterJob {
    name: String,
    host: String,
    source: Arc<dyn MeterSource>,
}

async fn fetch_payload(source: &dyn MeterSource, logger: &StructuredLogger) -> Option<DevicePayload> {
    match source.fetch().await {
        Ok(p) => Some(p),
        Err(e) => {
            logger.warn(&format!("Meter read failed: {}", e));
            None
        }
    }
}

async fn poll_grid(ctx: &AppContext, host: Option<&str>, logger: &StructuredLogger) -> Option<Reading> {
    let host = host?;
    let meter_logger = logger.for_meter(host);
    let source = match ctx.clients.lock().await.p1(host) {
        Ok(s) => s,
        Err(e) => {
            meter_logger.error(&format!("Cannot create client: {}", e));
            return None;
        }
    };
    let payload = fetch_payload(source.as_ref(), &meter_logger).await;
    let reading = normalize_grid(payload.as_ref(), Utc::now());
    if let Some(r) = &reading {
        meter_logger.debug(&format!("P1 power {:.0} W", r.active_power_w));
    }
    reading
}

/// Poll all generation meters concurrently; results come back in config order
async fn poll_generation(
    ctx: &AppContext,
    meters: Vec<(String, String)>,
    logger: &StructuredLogger,
) -> (Vec<TaggedReading>, Vec<String>) {
    let mut jobs = Vec::with_capacity(meters.len());
    let mut failed = Vec::new();
    {
        let mut clients = ctx.clients.lock().await;
        for (name, host) in meters {
            match clients.kwh(&host) {
                Ok(source) => jobs.push(MeterJob {
                    name,
                    host,
                    source,
                }),
                Err(e) => {
                    logger
                        .for_meter(&name)
                        .error(&format!("Cannot create client for {}: {}", host, e));
                    failed.push(name);
                }
            }
        }
    }

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let meter_logger = logger.for_meter(&job.name);
            tokio::spawn(async move {
                let payload = fetch_payload(job.source.as_ref(), &meter_logger).await;
                let reading = normalize_generation(payload.as_ref(), Utc::now());
                if let Some(r) = &reading {
                    meter_logger.debug(&format!("kWh power {:.0} W", r.active_power_w));
                }
                TaggedReading {
                    name: job.name,
                    host: job.host,
                    reading,
                }
            })
        })
        .collect();

    // Awaited in spawn order so results keep config order
    let mut tagged = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(t) => tagged.push(t),
            Err(e) => logger.error(&format!("Meter task failed: {}", e)),
        }
    }
    failed.extend(
        tagged
            .iter()
            .filter(|t| t.reading.is_none())
            .map(|t| t.name.clone()),
    );
    (tagged, failed)
}

/// Run one complete cycle. Serialized with every other caller.
pub async fn run_cycle(ctx: &AppContext) -> CycleSummary {
    let _guard = ctx.lock_cycle().await;
    let logger = get_logger("poller");
    let started_at = Utc::now();
    let config = ctx.config.read().await.clone();

    let grid = poll_grid(ctx, config.p1_host(), &logger).await;

    let meters: Vec<(String, String)> = config
        .enabled_kwh_meters()
        .into_iter()
        .map(|m| (m.display_name().to_string(), m.host.trim().to_string()))
        .collect();
    let (tagged, meters_failed) = poll_generation(ctx, meters, &logger).await;
    let generation = combine_generation(&tagged);
    let meters_ok = generation.as_ref().map_or(0, |r| r.meter_count);

    let now = Utc::now();
    let (daily, grid_recorded, generation_recorded) = {
        let mut store = ctx.store.write().await;
        let grid_recorded = store.record_at(MeterKind::Grid, grid.clone(), now);
        let generation_recorded = store.record_at(MeterKind::Generation, generation.clone(), now);
        (daily_totals_at(&store, now), grid_recorded, generation_recorded)
    };

    let weather_client = match ctx.clients.lock().await.weather(&config.weather) {
        Ok(c) => c,
        Err(e) => {
            logger.warn(&format!("Weather client unavailable: {}", e));
            None
        }
    };
    let temperature_c = match weather_client {
        Some(client) => match client.current().await {
            Ok(obs) => Some(obs.temperature_c),
            Err(e) => {
                logger.warn(&format!("No temperature this cycle: {}", e));
                None
            }
        },
        None => None,
    };

    let payload = build_status_payload(
        &daily,
        grid.as_ref(),
        generation.as_ref(),
        temperature_c,
    );

    let pvoutput_sent = send_status(ctx, &config.pvoutput, &payload, now, config.tz(), &logger).await;

    let summary = CycleSummary {
        started_at,
        finished_at: Utc::now(),
        grid_recorded,
        generation_recorded,
        meters_ok,
        meters_failed,
        daily,
        payload,
        pvoutput_sent,
    };

    logger.info(&format!(
        "Cycle done: grid={} generation={} ({} meter(s)), today gen={} Wh cons={} Wh",
        summary.grid_recorded,
        summary.generation_recorded,
        summary.meters_ok,
        summary.daily.energy_generation_wh,
        summary.daily.energy_consumption_wh
    ));

    match serde_json::to_string(&summary) {
        Ok(line) => ctx.publish(line),
        Err(e) => logger.warn(&format!("Cannot serialize cycle summary: {}", e)),
    }

    summary
}

async fn send_status(
    ctx: &AppContext,
    pv_config: &crate::config::PvOutputConfig,
    payload: &StatusPayload,
    now: DateTime<Utc>,
    tz: chrono_tz::Tz,
    logger: &StructuredLogger,
) -> Option<bool> {
    if payload.is_empty() {
        logger.debug("Nothing to send to PVOutput");
        return None;
    }
    let client = match ctx.clients.lock().await.pvoutput(pv_config) {
        Ok(Some(c)) => c,
        Ok(None) => {
            logger.debug("PVOutput not configured; skipping upload");
            return None;
        }
        Err(e) => {
            logger.error(&format!("PVOutput client unavailable: {}", e));
            return Some(false);
        }
    };
    match client.add_status(payload, now, tz).await {
        Ok(()) => {
            logger.info(&format!("Sent status to PVOutput system {}", client.system_id()));
            Some(true)
        }
        Err(e) => {
            logger.error(&format!("PVOutput upload failed: {}", e));
            Some(false)
        }
    }
}

/// Scheduled loop: cycle, sleep `update_interval`, repeat until shutdown
pub async fn run(ctx: Arc<AppContext>, mut shutdown: watch::Receiver<bool>) {
    let logger = get_logger("poller");
    logger.info("Poller started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = run_cycle(&ctx) => {}
            _ = shutdown.changed() => break,
        }

        let interval = ctx.config.read().await.update_interval.max(1);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = shutdown.changed() => break,
        }
    }

    logger.info("Poller stopped");
}
