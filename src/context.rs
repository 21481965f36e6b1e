//! Shared application state
//!
//! One [`AppContext`] is created at startup and handed (behind an `Arc`) to the
//! poller and to the web handlers. Configuration and the store sit behind
//! tokio locks; network clients are cached and rebuilt when their settings
//! change.

use crate::config::{Config, ConfigChanges, ConfigUpdate, PvOutputConfig, WeatherConfig};
use crate::error::Result;
use crate::homewizard::{HomeWizardClient, MeterSource};
use crate::logging::{StructuredLogger, get_logger};
use crate::pvoutput::PvOutputClient;
use crate::store::DataStore;
use crate::weather::OpenMeteoClient;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock, broadcast};

/// Builds a meter source for a host
pub type SourceFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn MeterSource>> + Send + Sync>;

/// Lazily created network clients, keyed by the settings they were built from
pub struct ClientCache {
    factory: SourceFactory,
    p1: Option<Arc<dyn MeterSource>>,
    kwh: HashMap<String, Arc<dyn MeterSource>>,
    pvoutput: Option<(PvOutputConfig, Arc<PvOutputClient>)>,
    weather: Option<(WeatherConfig, Arc<OpenMeteoClient>)>,
}

impl ClientCache {
    pub fn new(factory: SourceFactory) -> Self {
        Self {
            factory,
            p1: None,
            kwh: HashMap::new(),
            pvoutput: None,
            weather: None,
        }
    }

    /// Cache that talks to real HomeWizard devices
    pub fn homewizard() -> Self {
        Self::new(Arc::new(|host: &str| -> Result<Arc<dyn MeterSource>> {
            Ok(Arc::new(HomeWizardClient::new(host)?))
        }))
    }

    pub fn p1(&mut self, host: &str) -> Result<Arc<dyn MeterSource>> {
        if let Some(existing) = &self.p1
            && existing.host() == host
        {
            return Ok(existing.clone());
        }
        let source = (self.factory)(host)?;
        self.p1 = Some(source.clone());
        Ok(source)
    }

    pub fn kwh(&mut self, host: &str) -> Result<Arc<dyn MeterSource>> {
        if let Some(existing) = self.kwh.get(host) {
            return Ok(existing.clone());
        }
        let source = (self.factory)(host)?;
        self.kwh.insert(host.to_string(), source.clone());
        Ok(source)
    }

    /// PVOutput client, or `None` while credentials are missing
    pub fn pvoutput(&mut self, config: &PvOutputConfig) -> Result<Option<Arc<PvOutputClient>>> {
        if !config.is_configured() {
            self.pvoutput = None;
            return Ok(None);
        }
        if let Some((built_from, client)) = &self.pvoutput
            && built_from == config
        {
            return Ok(Some(client.clone()));
        }
        let client = Arc::new(PvOutputClient::new(config)?);
        self.pvoutput = Some((config.clone(), client.clone()));
        Ok(Some(client))
    }

    /// Weather client, or `None` while the lookup is disabled
    pub fn weather(&mut self, config: &WeatherConfig) -> Result<Option<Arc<OpenMeteoClient>>> {
        if !config.enabled {
            self.weather = None;
            return Ok(None);
        }
        if let Some((built_from, client)) = &self.weather
            && built_from == config
        {
            return Ok(Some(client.clone()));
        }
        let client = Arc::new(OpenMeteoClient::new(
            config.latitude,
            config.longitude,
            config.cache_minutes,
            &config.base_url,
        )?);
        self.weather = Some((config.clone(), client.clone()));
        Ok(Some(client))
    }

    /// Drop the clients whose settings changed
    pub fn reset(&mut self, changes: ConfigChanges) {
        if changes.p1 {
            self.p1 = None;
        }
        if changes.kwh_meters {
            self.kwh.clear();
        }
        if changes.pvoutput {
            self.pvoutput = None;
        }
        if changes.weather {
            self.weather = None;
        }
    }

    pub fn cached_kwh_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.kwh.keys().cloned().collect();
        hosts.sort();
        hosts
    }
}

pub struct AppContext {
    pub config: RwLock<Config>,
    pub store: RwLock<DataStore>,
    pub clients: Mutex<ClientCache>,
    config_path: Option<PathBuf>,
    cycle_lock: Mutex<()>,
    events: broadcast::Sender<String>,
    started_at: DateTime<Utc>,
    logger: StructuredLogger,
}

impl AppContext {
    /// Context with real HomeWizard clients. `config_path` receives runtime updates.
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        Self::with_clients(config, config_path, ClientCache::homewizard())
    }

    pub fn with_clients(config: Config, config_path: Option<PathBuf>, clients: ClientCache) -> Self {
        let store = DataStore::new(config.history_capacity(), config.tz());
        let (events, _rx) = broadcast::channel::<String>(64);
        Self {
            config: RwLock::new(config),
            store: RwLock::new(store),
            clients: Mutex::new(clients),
            config_path,
            cycle_lock: Mutex::new(()),
            events,
            started_at: Utc::now(),
            logger: get_logger("context"),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Held for the duration of one poll cycle
    pub async fn lock_cycle(&self) -> MutexGuard<'_, ()> {
        self.cycle_lock.lock().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    /// Broadcast an event line to SSE subscribers (dropped when nobody listens)
    pub fn publish(&self, line: String) {
        let _ = self.events.send(line);
    }

    /// Validate and apply a runtime update, persist it, and reset affected clients
    pub async fn apply_update(&self, update: &ConfigUpdate) -> Result<Config> {
        let mut config = self.config.write().await;
        let (next, changes) = update.apply_to(&config);
        next.validate()?;

        if let Some(path) = &self.config_path {
            next.save_to_file(path)?;
            self.logger
                .info(&format!("Configuration saved to {}", path.display()));
        }

        *config = next.clone();
        drop(config);

        self.clients.lock().await.reset(changes);
        Ok(next)
    }
}
