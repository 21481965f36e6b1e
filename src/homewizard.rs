//! HomeWizard local API client
//!
//! P1 and kWh meters expose their live values at `GET http://{host}/api/v1/data`.

use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::reading::DevicePayload;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can be asked for a meter's current payload
#[async_trait::async_trait]
pub trait MeterSource: Send + Sync {
    /// Address the source reads from
    fn host(&self) -> &str;

    async fn fetch(&self) -> Result<DevicePayload>;
}

/// HTTP client for one HomeWizard device
pub struct HomeWizardClient {
    host: String,
    base_url: String,
    http: reqwest::Client,
    logger: StructuredLogger,
}

impl HomeWizardClient {
    /// `host` may be a bare host[:port] or a full `http://` URL
    pub fn new(host: &str) -> Result<Self> {
        let host = host.trim().trim_end_matches('/').to_string();
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/api/v1", host)
        } else {
            format!("http://{}/api/v1", host)
        };
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let logger = get_logger("homewizard").for_meter(&host);
        Ok(Self {
            host,
            base_url,
            http,
            logger,
        })
    }

    pub fn data_url(&self) -> String {
        format!("{}/data", self.base_url)
    }
}

#[async_trait::async_trait]
impl MeterSource for HomeWizardClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn fetch(&self) -> Result<DevicePayload> {
        let url = self.data_url();
        self.logger.trace(&format!("GET {}", url));
        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let payload: DevicePayload = resp.json().await?;
        Ok(payload)
    }
}
