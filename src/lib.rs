//! # pvbridge - HomeWizard to PVOutput bridge
//!
//! Polls HomeWizard energy meters on the local network, keeps a short rolling
//! history and per-day energy accounting in memory, and uploads derived
//! generation and consumption figures to PVOutput.
//!
//! ## Features
//!
//! - **Multiple generation meters**: kWh meters are polled concurrently and summed
//! - **Daily totals**: start-of-day baselines per counter, local-day rollover
//! - **PVOutput upload**: energy, power, temperature and voltage (v1..v6)
//! - **Weather**: optional Open-Meteo temperature with a TTL cache
//! - **Web Interface**: REST API, SSE cycle events and a small dashboard
//! - **Configuration**: YAML-based configuration with validation and runtime updates
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `reading`: Payload normalization and generation meter aggregation
//! - `store`: Bounded history buffers and daily baselines
//! - `derived`: Daily totals, instantaneous totals and statistics
//! - `payload`: PVOutput status payload
//! - `homewizard`, `pvoutput`, `weather`: HTTP clients
//! - `context`: Shared application state
//! - `poller`: Periodic poll cycle
//! - `web`: HTTP server and REST API

pub mod config;
pub mod context;
pub mod derived;
pub mod error;
pub mod homewizard;
pub mod logging;
pub mod payload;
pub mod poller;
pub mod pvoutput;
pub mod reading;
pub mod store;
pub mod weather;
#[cfg(feature = "web")]
pub mod web;
#[cfg(feature = "web")]
pub mod web_schema;

// Re-export commonly used types
pub use config::Config;
pub use context::AppContext;
pub use error::{PvBridgeError, Result};
pub use reading::{MeterKind, Reading};
pub use store::DataStore;
