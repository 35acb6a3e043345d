//! Device gateway HTTP client

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use super::{DeviceClient, DeviceInfo, DeviceState};
use crate::config::DeviceConfig;
use crate::error::{ExporterError, Result};

pub struct HttpDeviceClient {
    http_client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpDeviceClient {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        let base_url = Url::parse(&base_url)
            .map_err(|e| ExporterError::Config(format!("invalid device URL: {}", e)))?;

        let http_client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.timeout())
            .user_agent(concat!("dyson-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Build `{base}/{segments...}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ExporterError::Config(format!("device URL {} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut request = self.http_client.get(url.clone());
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExporterError::Device(format!("GET {} timed out", url))
            } else if e.is_connect() {
                ExporterError::Device(format!("GET {} connection failed", url))
            } else {
                ExporterError::Device(format!("GET {} failed: {}", url, e))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExporterError::Device(format!(
                "GET {} returned {}",
                url,
                status.as_u16()
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| ExporterError::Device(format!("GET {} parse failed: {}", url, e)))
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let url = self.endpoint(&["v1", "devices"])?;
        let devices: Vec<DeviceInfo> = self.get_json(url).await?;
        tracing::debug!("[DeviceClient] Gateway reported {} devices", devices.len());
        Ok(devices)
    }

    async fn get_state(&self, device: &DeviceInfo) -> Result<DeviceState> {
        let url = self.endpoint(&["v1", "devices", &device.serial, "state"])?;
        self.get_json(url).await
    }

    fn name(&self) -> &'static str {
        "http-gateway"
    }
}
