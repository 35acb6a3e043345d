//! Configuration module

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use config::FileFormat;
use serde::Deserialize;
use url::Url;

use crate::cli::Args;
use crate::error::{ExporterError, Result};

const ENV_PREFIX: &str = "DYSON_EXPORTER";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exporter: ExporterConfig,
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub only_active_devices: bool,
}

impl ExporterConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.trim().parse().map_err(|_| {
            ExporterError::Config(format!(
                "exporter.host must be an IP address, got {:?}",
                self.host
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            only_active_devices: true,
        }
    }
}

/// Connection settings for the device gateway
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Host/IP or full URL of the gateway
    pub host: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl DeviceConfig {
    /// Normalised base URL without a trailing slash.
    /// A bare host or IP is treated as plain http.
    pub fn base_url(&self) -> Result<String> {
        let host = self.host.trim();
        let raw = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };

        let url = Url::parse(&raw)
            .map_err(|e| ExporterError::Config(format!("invalid device host {:?}: {}", host, e)))?;

        match url.scheme() {
            "http" | "https" => Ok(url.as_str().trim_end_matches('/').to_string()),
            other => Err(ExporterError::Config(format!(
                "unsupported device URL scheme {:?}",
                other
            ))),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9034
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    10
}

impl Config {
    /// Load an INI file, then apply `DYSON_EXPORTER__SECTION__KEY` overrides
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("Reading {}", path.display());

        let source = config::File::from(path)
            .format(FileFormat::Ini)
            .required(true);
        Self::build(source, Self::environment())
    }

    /// Command-line flags win over both the file and the environment
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.exporter.port = port;
        }
        if let Some(only_active) = args.only_active_devices {
            self.exporter.only_active_devices = only_active;
        }
    }

    #[cfg(test)]
    pub fn from_ini(contents: &str) -> Result<Self> {
        Self::build(
            config::File::from_str(contents, FileFormat::Ini),
            Self::environment(),
        )
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX).separator("__")
    }

    fn build<S>(source: S, environment: config::Environment) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(source)
            .add_source(environment)
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.device.host.trim().is_empty() {
            return Err(ExporterError::Config("device.host must not be empty".into()));
        }
        if self.device.poll_interval_secs == 0 {
            return Err(ExporterError::Config(
                "device.poll_interval_secs must be greater than zero".into(),
            ));
        }
        if self.device.timeout_secs == 0 {
            return Err(ExporterError::Config(
                "device.timeout_secs must be greater than zero".into(),
            ));
        }
        self.exporter.bind_addr()?;
        self.device.base_url()?;
        Ok(())
    }
}
