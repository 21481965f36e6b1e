use axum::{Form, Router, extract::State, routing::post};
use pvbridge::config::{Config, KwhMeterConfig};
use pvbridge::context::{ClientCache, SourceFactory};
use pvbridge::homewizard::MeterSource;
use pvbridge::poller::run_cycle;
use pvbridge::reading::DevicePayload;
use pvbridge::{AppContext, MeterKind, PvBridgeError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Canned meter: a payload per host, an error for hosts starting with "down"
struct FakeMeter {
    host: String,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl MeterSource for FakeMeter {
    fn host(&self) -> &str {
        &self.host
    }

    async fn fetch(&self) -> Result<DevicePayload> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.host.starts_with("down") {
            return Err(PvBridgeError::network(format!("{} unreachable", self.host)));
        }
        let payload = match self.host.as_str() {
            "p1" => DevicePayload {
                total_power_import_kwh: Some(500.0),
                total_power_export_kwh: Some(20.0),
                active_power_w: Some(-250.0),
                active_voltage_l1_v: Some(230.0),
                ..Default::default()
            },
            "east" => DevicePayload {
                total_power_export_kwh: Some(1000.0),
                active_power_w: Some(600.0),
                ..Default::default()
            },
            "west" => DevicePayload {
                total_power_export_kwh: Some(2000.0),
                active_power_w: Some(400.0),
                ..Default::default()
            },
            _ => DevicePayload::default(),
        };
        Ok(payload)
    }
}

struct Harness {
    ctx: Arc<AppContext>,
    p1_max_in_flight: Arc<AtomicUsize>,
}

fn harness(config: Config) -> Harness {
    let p1_in_flight = Arc::new(AtomicUsize::new(0));
    let p1_max_in_flight = Arc::new(AtomicUsize::new(0));
    let (pi, pm) = (p1_in_flight.clone(), p1_max_in_flight.clone());
    let factory: SourceFactory = Arc::new(move |host: &str| -> Result<Arc<dyn MeterSource>> {
        let (in_flight, max_in_flight) = if host == "p1" {
            (pi.clone(), pm.clone())
        } else {
            (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)))
        };
        let meter: Arc<dyn MeterSource> = Arc::new(FakeMeter {
            host: host.to_string(),
            in_flight,
            max_in_flight,
        });
        Ok(meter)
    });
    Harness {
        ctx: Arc::new(AppContext::with_clients(config, None, ClientCache::new(factory))),
        p1_max_in_flight,
    }
}

fn meter(name: &str, host: &str) -> KwhMeterConfig {
    KwhMeterConfig {
        name: name.to_string(),
        host: host.to_string(),
        enabled: true,
    }
}

fn base_config() -> Config {
    let mut cfg = Config::default();
    cfg.timezone = "UTC".to_string();
    cfg.homewizard_p1.host = "p1".to_string();
    cfg.homewizard_p1.enabled = true;
    cfg.homewizard_kwh_meters = vec![
        meter("east roof", "east"),
        meter("shed", "down-shed"),
        meter("west roof", "west"),
    ];
    cfg
}

#[tokio::test]
async fn failing_meter_degrades_only_itself() {
    let h = harness(base_config());
    let summary = run_cycle(&h.ctx).await;

    assert!(summary.grid_recorded);
    assert!(summary.generation_recorded);
    assert_eq!(summary.meters_ok, 2);
    assert_eq!(summary.meters_failed, vec!["shed".to_string()]);
    // No credentials configured
    assert_eq!(summary.pvoutput_sent, None);

    let store = h.ctx.store.read().await;
    let generation = store.latest_reading(MeterKind::Generation).unwrap();
    assert_eq!(generation.active_power_w, 1000.0);
    assert_eq!(generation.total_export_kwh, 3000.0);
    let names: Vec<&str> = generation.meters.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["east roof", "west roof"]);

    assert_eq!(summary.payload.power_generation, Some(1000));
    assert_eq!(summary.payload.power_consumption, Some(750));
    assert_eq!(summary.payload.voltage, Some(230.0));
}

#[tokio::test]
async fn failed_generation_is_not_taken_from_previous_cycle() {
    let h = harness(base_config());
    let first = run_cycle(&h.ctx).await;
    assert_eq!(first.payload.power_consumption, Some(750));

    h.ctx.config.write().await.homewizard_kwh_meters = vec![meter("shed", "down-shed")];
    let second = run_cycle(&h.ctx).await;

    assert!(!second.generation_recorded);
    assert_eq!(second.payload.power_generation, None);
    assert_eq!(second.payload.energy_generation, None);
    // Only the grid feed-in this cycle; the 1000 W in the store is stale
    assert_eq!(second.payload.power_consumption, Some(250));
    let store = h.ctx.store.read().await;
    assert_eq!(
        store.latest_reading(MeterKind::Generation).unwrap().active_power_w,
        1000.0
    );
}

#[tokio::test]
async fn all_meters_down_records_nothing() {
    let mut cfg = Config::default();
    cfg.homewizard_p1.host = "down-p1".to_string();
    cfg.homewizard_p1.enabled = true;
    cfg.homewizard_kwh_meters = vec![meter("a", "down-a")];
    let h = harness(cfg);

    let summary = run_cycle(&h.ctx).await;
    assert!(!summary.grid_recorded);
    assert!(!summary.generation_recorded);
    assert!(summary.payload.is_empty());
    assert!(h.ctx.store.read().await.latest().last_update.is_none());
}

#[tokio::test]
async fn disabled_meters_are_not_polled() {
    let mut cfg = base_config();
    cfg.homewizard_p1.enabled = false;
    for m in &mut cfg.homewizard_kwh_meters {
        m.enabled = false;
    }
    let h = harness(cfg);

    let summary = run_cycle(&h.ctx).await;
    assert!(!summary.grid_recorded);
    assert!(summary.meters_failed.is_empty());
    assert!(h.ctx.clients.lock().await.cached_kwh_hosts().is_empty());
}

#[tokio::test]
async fn concurrent_cycles_are_serialized() {
    let h = harness(base_config());
    let (a, b) = tokio::join!(run_cycle(&h.ctx), run_cycle(&h.ctx));

    assert_eq!(h.p1_max_in_flight.load(Ordering::SeqCst), 1);
    assert!(a.finished_at <= b.started_at || b.finished_at <= a.started_at);
    assert_eq!(h.ctx.store.read().await.len(MeterKind::Grid), 2);
}

#[tokio::test]
async fn cycle_summary_is_broadcast() {
    let h = harness(base_config());
    let mut rx = h.ctx.subscribe();
    run_cycle(&h.ctx).await;
    let line = rx.recv().await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(json["meters_ok"], 2);
}

type Forms = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn record_form(
    State(forms): State<Forms>,
    Form(form): Form<HashMap<String, String>>,
) -> &'static str {
    forms.lock().await.push(form);
    "OK 200: Added Status"
}

#[tokio::test]
async fn cycle_uploads_to_pvoutput_when_configured() {
    let forms: Forms = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/r2/addstatus.jsp", post(record_form))
        .with_state(forms.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let mut cfg = base_config();
    cfg.pvoutput.api_key = "k".to_string();
    cfg.pvoutput.system_id = "1".to_string();
    cfg.pvoutput.base_url = format!("http://{}/r2", addr);
    let h = harness(cfg);

    let summary = run_cycle(&h.ctx).await;
    assert_eq!(summary.pvoutput_sent, Some(true));

    let forms = forms.lock().await;
    assert_eq!(forms.len(), 1);
    // First cycle of the day: nothing accumulated yet
    assert_eq!(forms[0].get("v1").map(String::as_str), Some("0"));
    assert_eq!(forms[0].get("v2").map(String::as_str), Some("1000"));
    assert_eq!(forms[0].get("v4").map(String::as_str), Some("750"));
}
