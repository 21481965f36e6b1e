//! Axum-based HTTP API and dashboard with an OpenAPI (utoipa) document

use crate::config::ConfigUpdate;
use crate::context::AppContext;
use crate::derived::{DailyTotals, Statistics, daily_totals, statistics};
use crate::error::{PvBridgeError, Result};
use crate::poller::{CycleSummary, run_cycle};
use crate::store::{HistorySnapshot, LatestSnapshot};
use axum::response::Redirect;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, get_service, post},
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tower_http::services::ServeDir;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{IntoParams, OpenApi, ToSchema};

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub last_update: Option<chrono::DateTime<chrono::Utc>>,
    pub p1_enabled: bool,
    pub kwh_enabled: bool,
    pub kwh_meter_count: usize,
    pub pvoutput_configured: bool,
    pub weather_enabled: bool,
    pub update_interval: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Window in hours (1 up to the retention period); defaults to 1
    pub hours: Option<u32>,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({"error": message.into()})))
}

#[utoipa::path(get, path = "/api/health", responses(
    (status = 200, description = "Service is healthy")
))]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[utoipa::path(get, path = "/api/status", responses(
    (status = 200, description = "Service status", body = StatusResponse)
))]
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let cfg = state.ctx.config.read().await;
    let kwh_meter_count = cfg.enabled_kwh_meters().len();
    let last_update = state.ctx.store.read().await.last_update();
    Json(StatusResponse {
        status: "running",
        version: env!("APP_VERSION"),
        started_at: state.ctx.started_at(),
        last_update,
        p1_enabled: cfg.p1_host().is_some(),
        kwh_enabled: kwh_meter_count > 0,
        kwh_meter_count,
        pvoutput_configured: cfg.pvoutput.is_configured(),
        weather_enabled: cfg.weather.enabled,
        update_interval: cfg.update_interval,
    })
}

#[utoipa::path(get, path = "/api/data/latest", responses(
    (status = 200, description = "Latest reading per meter kind", body = LatestSnapshot)
))]
async fn data_latest(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ctx.store.read().await.latest())
}

#[utoipa::path(get, path = "/api/data/daily", responses(
    (status = 200, description = "Energy totals for today", body = DailyTotals)
))]
async fn data_daily(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.ctx.store.read().await;
    Json(daily_totals(&store))
}

#[utoipa::path(get, path = "/api/data/history", params(HistoryParams), responses(
    (status = 200, description = "Readings inside the window", body = HistorySnapshot),
    (status = 400, description = "Window outside the retention period")
))]
async fn data_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> axum::response::Response {
    let hours = params.hours.unwrap_or(1);
    let retention = state.ctx.config.read().await.history.retention_hours;
    if hours < 1 || hours > retention {
        return error_body(
            StatusCode::BAD_REQUEST,
            format!("hours must be between 1 and {}", retention),
        )
        .into_response();
    }
    let store = state.ctx.store.read().await;
    Json(store.history(chrono::Duration::hours(i64::from(hours)))).into_response()
}

#[utoipa::path(get, path = "/api/data/statistics", responses(
    (status = 200, description = "Current power statistics", body = Statistics)
))]
async fn data_statistics(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.ctx.store.read().await;
    Json(statistics(&store))
}

/// Configuration as JSON with the PVOutput key replaced by a flag
fn public_config(cfg: &crate::config::Config) -> serde_json::Value {
    let mut json = serde_json::to_value(cfg).unwrap_or(serde_json::json!({}));
    if let Some(pv) = json.get_mut("pvoutput").and_then(|v| v.as_object_mut()) {
        pv.remove("api_key");
        pv.insert(
            "api_key_configured".to_string(),
            serde_json::Value::Bool(!cfg.pvoutput.api_key.trim().is_empty()),
        );
    }
    json
}

#[utoipa::path(get, path = "/api/config", responses((status = 200)))]
async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let cfg = state.ctx.config.read().await;
    Json(public_config(&cfg))
}

#[utoipa::path(post, path = "/api/config", request_body = ConfigUpdate, responses(
    (status = 200, description = "Configuration updated and saved"),
    (status = 400, description = "Invalid configuration")
))]
async fn post_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> impl IntoResponse {
    match state.ctx.apply_update(&update).await {
        Ok(cfg) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "config": public_config(&cfg),
            })),
        ),
        Err(e) if e.is_validation() => error_body(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[utoipa::path(get, path = "/api/config/schema", responses((status = 200)))]
async fn get_config_schema() -> impl IntoResponse {
    let schema = schemars::schema_for!(crate::config::Config);
    Json(serde_json::to_value(&schema).unwrap_or(serde_json::json!({"error":"schema"})))
}

#[utoipa::path(get, path = "/api/config/ui", responses((status = 200)))]
async fn get_config_ui() -> impl IntoResponse {
    Json(crate::web_schema::build_ui_schema())
}

#[utoipa::path(post, path = "/api/update-now", responses(
    (status = 200, description = "Cycle completed", body = CycleSummary)
))]
async fn update_now(State(state): State<AppState>) -> impl IntoResponse {
    Json(run_cycle(&state.ctx).await)
}

#[utoipa::path(get, path = "/api/events", responses((status = 200)))]
async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.ctx.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok::<Event, std::convert::Infallible>(
            Event::default().event("cycle").data(payload),
        )),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health, status, data_latest, data_daily, data_history, data_statistics,
        get_config, post_config, get_config_schema, get_config_ui,
        update_now, events,
    ),
    components(schemas(StatusResponse, ConfigUpdate, crate::config::PvOutputUpdate)),
    tags((name = "pvbridge", description = "HomeWizard to PVOutput bridge API"))
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/ui/index.html") }))
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/data/latest", get(data_latest))
        .route("/api/data/daily", get(data_daily))
        .route("/api/data/history", get(data_history))
        .route("/api/data/statistics", get(data_statistics))
        .route("/api/config", get(get_config).post(post_config))
        .route("/api/config/schema", get(get_config_schema))
        .route("/api/config/ui", get(get_config_ui))
        .route("/api/update-now", post(update_now))
        .route("/api/events", get(events))
        .route("/openapi.json", get(openapi_json))
        .nest_service(
            "/ui",
            get_service(ServeDir::new("./webui").append_index_html_on_directories(true))
                .handle_error(|_| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` flips to true
pub async fn serve(
    ctx: Arc<AppContext>,
    host: &str,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let router = build_router(AppState { ctx });
    let logger = crate::logging::get_logger("web");

    let addr: SocketAddr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 0.0.0.0", host));
            ([0, 0, 0, 0], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PvBridgeError::web(format!("Cannot bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (UI /ui, API /api, OpenAPI /openapi.json)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| PvBridgeError::web(e.to_string()))?;
    Ok(())
}
