//! Device access layer
//!
//! - `DeviceClient`: capability trait the poller consumes (enumerate + read state)
//! - `client`: HTTP/JSON adapter for a device gateway
//!
//! The vendor sends most readings as zero-padded strings ("0042", "AUTO"),
//! so numeric fields are kept as [`VendorValue`] and parsed during translation.

pub mod client;

pub use client::HttpDeviceClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Device enumeration and state access
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// List every device known to the account/gateway
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Read the current state snapshot of one device
    async fn get_state(&self, device: &DeviceInfo) -> Result<DeviceState>;

    /// Adapter name for logging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial: String,
    pub name: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A raw reading as delivered by the vendor API: either a JSON number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VendorValue {
    Number(f64),
    Text(String),
}

impl VendorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VendorValue::Number(n) => Some(*n),
            VendorValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            VendorValue::Number(n) => n.to_string(),
            VendorValue::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<&str> for VendorValue {
    fn from(s: &str) -> Self {
        VendorValue::Text(s.to_string())
    }
}

impl From<f64> for VendorValue {
    fn from(n: f64) -> Self {
        VendorValue::Number(n)
    }
}

/// Full snapshot of one device. Either half may be absent depending on model.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    pub environment: Option<EnvironmentState>,
    #[serde(default)]
    pub fan: Option<FanState>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "version", rename_all = "lowercase")]
pub enum EnvironmentState {
    V1(EnvironmentV1),
    V2(EnvironmentV2),
}

/// Temperature is in kelvin
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnvironmentV1 {
    pub humidity: Option<VendorValue>,
    pub temperature: Option<VendorValue>,
    pub dust: Option<VendorValue>,
    #[serde(alias = "volatil_organic_compounds")]
    pub volatile_organic_compounds: Option<VendorValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnvironmentV2 {
    pub humidity: Option<VendorValue>,
    pub temperature: Option<VendorValue>,
    pub particulate_matter_25: Option<VendorValue>,
    pub particulate_matter_10: Option<VendorValue>,
    pub volatile_organic_compounds: Option<VendorValue>,
    pub nitrogen_dioxide: Option<VendorValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "version", rename_all = "lowercase")]
pub enum FanState {
    V1(FanV1),
    V2(FanV2),
}

/// Pure Cool link (V1). `heat` is present on Hot+Cool models only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FanV1 {
    pub fan_mode: Option<String>,
    pub fan_state: Option<String>,
    pub night_mode: Option<String>,
    pub speed: Option<VendorValue>,
    pub oscillation: Option<String>,
    pub quality_target: Option<VendorValue>,
    /// Hours
    pub filter_life: Option<VendorValue>,
    pub heat: Option<HeatV1>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeatV1 {
    pub heat_mode: Option<String>,
    pub heat_state: Option<String>,
    /// Decikelvin
    pub heat_target: Option<VendorValue>,
    pub focus_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FanV2 {
    pub fan_power: Option<String>,
    pub auto_mode: Option<String>,
    pub fan_state: Option<String>,
    pub night_mode: Option<String>,
    pub speed: Option<VendorValue>,
    pub continuous_monitoring: Option<String>,
    pub front_direction: Option<String>,
    pub carbon_filter_state: Option<VendorValue>,
    pub hepa_filter_state: Option<VendorValue>,
    pub night_mode_speed: Option<VendorValue>,
    /// Configured mode: ON/OFF or OION/OIOF
    pub oscillation: Option<String>,
    /// What the fan is doing right now: ON/OFF/IDLE
    pub oscillation_status: Option<String>,
    pub oscillation_angle_low: Option<VendorValue>,
    pub oscillation_angle_high: Option<VendorValue>,
    pub heat: Option<HeatV2>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeatV2 {
    pub heat_mode: Option<String>,
    pub heat_state: Option<String>,
    pub heat_target: Option<VendorValue>,
}
