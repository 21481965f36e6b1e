//! PVOutput `addstatus` client

use crate::config::PvOutputConfig;
use crate::error::{PvBridgeError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::payload::StatusPayload;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PvOutputClient {
    api_key: String,
    system_id: String,
    base_url: String,
    http: reqwest::Client,
    logger: StructuredLogger,
}

impl PvOutputClient {
    pub fn new(config: &PvOutputConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(PvBridgeError::config(
                "PVOutput api_key and system_id are required",
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let logger = get_logger_with_context(
            LogContext::new("pvoutput").with_field("system_id", config.system_id.clone()),
        );
        Ok(Self {
            api_key: config.api_key.clone(),
            system_id: config.system_id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            logger,
        })
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    /// Send one status. Date and time are stamped in `tz`.
    pub async fn add_status(
        &self,
        payload: &StatusPayload,
        at: DateTime<Utc>,
        tz: Tz,
    ) -> Result<()> {
        if payload.is_empty() {
            return Err(PvBridgeError::validation(
                "payload",
                "No values to send",
            ));
        }
        let params = form_params(payload, at, tz);
        let url = format!("{}/addstatus.jsp", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("X-Pvoutput-Apikey", &self.api_key)
            .header("X-Pvoutput-SystemId", &self.system_id)
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PvBridgeError::api(format!(
                "PVOutput returned {}: {}",
                status,
                body.trim()
            )));
        }

        self.logger.debug(&format!("Status added: {:?}", params));
        Ok(())
    }
}

/// Form fields for `addstatus.jsp`: `d`, `t` and the present `vN` values
pub fn form_params(
    payload: &StatusPayload,
    at: DateTime<Utc>,
    tz: Tz,
) -> Vec<(&'static str, String)> {
    let local = at.with_timezone(&tz);
    let mut params = vec![
        ("d", local.format("%Y%m%d").to_string()),
        ("t", local.format("%H:%M").to_string()),
    ];
    params.extend(payload.form_values());
    params
}
