//! Metrics module
//!
//! - `registry`: shared store of current values, rendered on every scrape
//! - `exposition`: Prometheus text format helpers
//! - `dyson`: device state → metric updates

pub mod dyson;
pub mod exposition;
pub mod registry;

pub use registry::{DeviceIdentity, MetricDesc, MetricUpdate, MetricsRegistry};
