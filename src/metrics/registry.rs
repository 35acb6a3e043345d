//! Metrics registry: current value per (device, series), last write wins
//!
//! The poller is the only writer; the HTTP exporter only takes snapshots.
//! Every access goes through one `RwLock`, and a snapshot is copied out under
//! a single read guard, so a scrape never observes half of a device update.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::exposition::{
    escape_help, format_line, is_valid_label_name, is_valid_metric_name,
};
use crate::error::{ExporterError, Result};

/// Labels attached to every series of a device
const DEVICE_LABELS: [&str; 3] = ["serial", "name", "model"];

/// Help text for one metric family. Every family is exported as a gauge;
/// enum metrics are 0/1 gauges with one series per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
}

/// Identity of a device as recorded in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
    pub model: String,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: model.into(),
        }
    }
}

/// A single write produced by state translation
#[derive(Debug, Clone, PartialEq)]
pub enum MetricUpdate {
    Gauge {
        name: &'static str,
        unit: &'static str,
        value: f64,
    },
    /// Enum metric: one 0/1 series per allowed state
    State {
        name: &'static str,
        states: &'static [&'static str],
        current: String,
    },
}

impl MetricUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            MetricUpdate::Gauge { name, .. } | MetricUpdate::State { name, .. } => *name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SeriesKey {
    metric: String,
    state: Option<String>,
}

#[derive(Debug, Clone)]
struct Reading {
    value: f64,
    unit: Option<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct DeviceEntry {
    name: String,
    model: String,
    readings: BTreeMap<SeriesKey, Reading>,
}

impl DeviceEntry {
    fn new(name: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            readings: BTreeMap::new(),
        }
    }

    fn write(&mut self, key: SeriesKey, value: f64, unit: Option<&str>, now: DateTime<Utc>) {
        self.readings.insert(
            key,
            Reading {
                value,
                unit: unit.map(str::to_string),
                updated_at: now,
            },
        );
    }

    fn write_gauge(&mut self, metric: &str, unit: Option<&str>, value: f64, now: DateTime<Utc>) {
        let key = SeriesKey {
            metric: metric.to_string(),
            state: None,
        };
        self.write(key, value, unit, now);
    }

    fn write_state(&mut self, metric: &str, states: &[&str], current: &str, now: DateTime<Utc>) {
        for state in states {
            let key = SeriesKey {
                metric: metric.to_string(),
                state: Some((*state).to_string()),
            };
            let value = if *state == current { 1.0 } else { 0.0 };
            self.write(key, value, None, now);
        }
    }
}

fn validate_metric(name: &str) -> Result<()> {
    if !is_valid_metric_name(name) {
        return Err(ExporterError::InvalidMetric(format!(
            "invalid metric name {:?}",
            name
        )));
    }
    Ok(())
}

fn validate_state(name: &str, states: &[&str], current: &str) -> Result<()> {
    validate_metric(name)?;
    if !is_valid_label_name(name) || DEVICE_LABELS.contains(&name) {
        return Err(ExporterError::InvalidMetric(format!(
            "{:?} cannot be used as a state label",
            name
        )));
    }
    if !states.contains(&current) {
        return Err(ExporterError::InvalidMetric(format!(
            "{:?} is not a valid state for {} (expected one of {:?})",
            current, name, states
        )));
    }
    Ok(())
}

/// Shared store of current metric values
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    devices: RwLock<BTreeMap<String, DeviceEntry>>,
    catalogue: &'static [MetricDesc],
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose families get `# HELP` text from `catalogue`
    pub fn with_catalogue(catalogue: &'static [MetricDesc]) -> Self {
        Self {
            devices: RwLock::default(),
            catalogue,
        }
    }

    /// Overwrite one gauge. Unknown devices are created with their id as name.
    pub async fn set(&self, device_id: &str, metric_name: &str, value: f64) -> Result<()> {
        validate_metric(metric_name)?;

        let mut devices = self.devices.write().await;
        devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceEntry::new(device_id, ""))
            .write_gauge(metric_name, None, value, Utc::now());
        Ok(())
    }

    /// Overwrite an enum metric: `current` becomes 1, every other state 0
    pub async fn set_state(
        &self,
        device_id: &str,
        metric_name: &str,
        states: &[&str],
        current: &str,
    ) -> Result<()> {
        validate_state(metric_name, states, current)?;

        let mut devices = self.devices.write().await;
        devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceEntry::new(device_id, ""))
            .write_state(metric_name, states, current, Utc::now());
        Ok(())
    }

    /// Record the device identity and apply a batch of updates under one lock.
    /// The batch is validated first; if any update is invalid nothing is written.
    pub async fn apply(&self, device: &DeviceIdentity, updates: &[MetricUpdate]) -> Result<()> {
        for update in updates {
            match update {
                MetricUpdate::Gauge { name, .. } => validate_metric(name)?,
                MetricUpdate::State {
                    name,
                    states,
                    current,
                } => validate_state(name, states, current)?,
            }
        }

        let now = Utc::now();
        let mut devices = self.devices.write().await;
        let entry = devices
            .entry(device.id.clone())
            .or_insert_with(|| DeviceEntry::new(&device.name, &device.model));
        entry.name = device.name.clone();
        entry.model = device.model.clone();

        for update in updates {
            match update {
                MetricUpdate::Gauge { name, unit, value } => {
                    entry.write_gauge(name, Some(*unit), *value, now)
                }
                MetricUpdate::State {
                    name,
                    states,
                    current,
                } => entry.write_state(name, states, current, now),
            }
        }

        Ok(())
    }

    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Copy every current sample, ordered by device id, metric name, then state
    pub async fn snapshot(&self) -> Snapshot {
        let devices = self.devices.read().await;

        let mut samples = Vec::new();
        for (device_id, entry) in devices.iter() {
            for (key, reading) in &entry.readings {
                samples.push(Sample {
                    device_id: device_id.clone(),
                    device_name: entry.name.clone(),
                    model: entry.model.clone(),
                    metric: key.metric.clone(),
                    state: key.state.clone(),
                    value: reading.value,
                    unit: reading.unit.clone(),
                    updated_at: reading.updated_at,
                });
            }
        }

        Snapshot {
            samples,
            catalogue: self.catalogue,
        }
    }

    /// Render the full exposition body
    pub async fn render(&self) -> String {
        self.snapshot().await.render()
    }
}

/// One rendered series with its bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub device_id: String,
    pub device_name: String,
    pub model: String,
    pub metric: String,
    pub state: Option<String>,
    pub value: f64,
    pub unit: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Sample {
    pub fn to_line(&self) -> String {
        let mut labels: Vec<(&str, &str)> = vec![
            ("serial", self.device_id.as_str()),
            ("name", self.device_name.as_str()),
        ];
        if !self.model.is_empty() {
            labels.push(("model", self.model.as_str()));
        }
        if let Some(ref state) = self.state {
            labels.push((self.metric.as_str(), state.as_str()));
        }
        format_line(&self.metric, &labels, self.value)
    }
}

/// Immutable copy of the registry taken at one instant
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    samples: Vec<Sample>,
    catalogue: &'static [MetricDesc],
}

impl Snapshot {
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `# HELP`/`# TYPE` for every family present, sorted by name.
    /// They all come before the first sample, which keeps samples in device order.
    pub fn header_lines(&self) -> Vec<String> {
        let families: BTreeSet<&str> = self.samples.iter().map(|s| s.metric.as_str()).collect();

        let mut lines = Vec::with_capacity(families.len() * 2);
        for family in families {
            if let Some(desc) = self.catalogue.iter().find(|d| d.name == family) {
                lines.push(format!("# HELP {} {}\n", family, escape_help(desc.help)));
            }
            lines.push(format!("# TYPE {} gauge\n", family));
        }
        lines
    }

    /// Header block, then one line per sample. Call again to start over.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.header_lines()
            .into_iter()
            .chain(self.samples.iter().map(Sample::to_line))
    }

    pub fn render(&self) -> String {
        self.lines().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const ON_OFF: &[&str] = &["ON", "OFF"];

    #[tokio::test]
    async fn test_empty_render() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.render().await, "");
        assert!(registry.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let registry = MetricsRegistry::new();
        registry.set("fan1", "power", 1.0).await.unwrap();
        registry.set("fan1", "power", 0.0).await.unwrap();

        let body = registry.render().await;
        assert_eq!(
            body,
            "# TYPE power gauge\npower{serial=\"fan1\",name=\"fan1\"} 0\n"
        );
    }

    #[tokio::test]
    async fn test_sorted_by_device_then_metric() {
        let registry = MetricsRegistry::new();
        registry.set("zeta", "b_metric", 2.0).await.unwrap();
        registry.set("alpha", "z_metric", 3.0).await.unwrap();
        registry.set("zeta", "a_metric", 1.0).await.unwrap();
        registry.set("alpha", "a_metric", 4.0).await.unwrap();

        let lines: Vec<String> = registry.snapshot().await.lines().collect();
        assert_eq!(
            lines,
            vec![
                "# TYPE a_metric gauge\n",
                "# TYPE b_metric gauge\n",
                "# TYPE z_metric gauge\n",
                "a_metric{serial=\"alpha\",name=\"alpha\"} 4\n",
                "z_metric{serial=\"alpha\",name=\"alpha\"} 3\n",
                "a_metric{serial=\"zeta\",name=\"zeta\"} 1\n",
                "b_metric{serial=\"zeta\",name=\"zeta\"} 2\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_render_is_deterministic() {
        let a = MetricsRegistry::new();
        let b = MetricsRegistry::new();

        for (device, metric, value) in [("d2", "x", 1.0), ("d1", "y", 2.0), ("d1", "x", 3.0)] {
            a.set(device, metric, value).await.unwrap();
        }
        for (device, metric, value) in [("d1", "x", 3.0), ("d2", "x", 1.0), ("d1", "y", 2.0)] {
            b.set(device, metric, value).await.unwrap();
        }

        assert_eq!(a.render().await, b.render().await);
        assert_eq!(a.render().await, a.render().await);
    }

    #[tokio::test]
    async fn test_snapshot_lines_restartable() {
        let registry = MetricsRegistry::new();
        registry.set("fan1", "power", 1.0).await.unwrap();
        registry.set("fan2", "power", 1.0).await.unwrap();

        let snapshot = registry.snapshot().await;
        let first: Vec<String> = snapshot.lines().collect();
        let second: Vec<String> = snapshot.lines().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(snapshot.render(), first.concat());
    }

    #[tokio::test]
    async fn test_snapshot_isolated_from_later_writes() {
        let registry = MetricsRegistry::new();
        registry.set("fan1", "power", 1.0).await.unwrap();
        let snapshot = registry.snapshot().await;

        registry.set("fan1", "power", 0.0).await.unwrap();
        assert_eq!(snapshot.samples()[0].value, 1.0);
    }

    #[tokio::test]
    async fn test_invalid_metric_rejected() {
        let registry = MetricsRegistry::new();
        let err = registry.set("fan1", "fan speed", 1.0).await.unwrap_err();
        assert!(matches!(err, ExporterError::InvalidMetric(_)));
        assert_eq!(registry.device_count().await, 0);
    }

    #[tokio::test]
    async fn test_set_state() {
        let registry = MetricsRegistry::new();
        registry
            .set_state("fan1", "dyson_night_mode", ON_OFF, "ON")
            .await
            .unwrap();
        registry
            .set_state("fan1", "dyson_night_mode", ON_OFF, "OFF")
            .await
            .unwrap();

        assert_eq!(
            registry.render().await,
            "# TYPE dyson_night_mode gauge\n\
             dyson_night_mode{serial=\"fan1\",name=\"fan1\",dyson_night_mode=\"OFF\"} 1\n\
             dyson_night_mode{serial=\"fan1\",name=\"fan1\",dyson_night_mode=\"ON\"} 0\n"
        );

        assert!(registry
            .set_state("fan1", "dyson_night_mode", ON_OFF, "MAYBE")
            .await
            .is_err());
        assert!(registry.set_state("fan1", "name", ON_OFF, "ON").await.is_err());
    }

    #[tokio::test]
    async fn test_apply_records_identity_and_units() {
        let registry = MetricsRegistry::new();
        let device = DeviceIdentity::new("NN2-EU-AAA", "Living \"Room\"", "438");
        let updates = vec![
            MetricUpdate::Gauge {
                name: "dyson_humidity_percent",
                unit: "percent",
                value: 41.0,
            },
            MetricUpdate::State {
                name: "dyson_fan_state",
                states: &["FAN", "OFF"],
                current: "FAN".to_string(),
            },
        ];
        registry.apply(&device, &updates).await.unwrap();

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 3);
        let humidity = snapshot
            .samples()
            .iter()
            .find(|s| s.metric == "dyson_humidity_percent")
            .unwrap();
        assert_eq!(humidity.unit.as_deref(), Some("percent"));

        let body = snapshot.render();
        assert!(body.contains(
            "dyson_humidity_percent{serial=\"NN2-EU-AAA\",name=\"Living \\\"Room\\\"\",model=\"438\"} 41\n"
        ));
        assert!(body.contains(
            "dyson_fan_state{serial=\"NN2-EU-AAA\",name=\"Living \\\"Room\\\"\",model=\"438\",dyson_fan_state=\"FAN\"} 1\n"
        ));
    }

    #[tokio::test]
    async fn test_apply_is_all_or_nothing() {
        let registry = MetricsRegistry::new();
        let device = DeviceIdentity::new("fan1", "Fan", "");
        let updates = vec![
            MetricUpdate::Gauge {
                name: "dyson_humidity_percent",
                unit: "percent",
                value: 41.0,
            },
            MetricUpdate::State {
                name: "dyson_fan_state",
                states: &["FAN", "OFF"],
                current: "SPIN".to_string(),
            },
        ];

        assert!(registry.apply(&device, &updates).await.is_err());
        assert_eq!(registry.device_count().await, 0);
    }

    #[tokio::test]
    async fn test_apply_keeps_other_devices() {
        let registry = MetricsRegistry::new();
        registry.set("fan_b", "dyson_fan_speed_units", 4.0).await.unwrap();

        let device = DeviceIdentity::new("fan_a", "A", "");
        let update = MetricUpdate::Gauge {
            name: "dyson_fan_speed_units",
            unit: "units",
            value: 7.0,
        };
        registry.apply(&device, &[update]).await.unwrap();

        let body = registry.render().await;
        assert!(body.contains("dyson_fan_speed_units{serial=\"fan_a\",name=\"A\"} 7\n"));
        assert!(body.contains("dyson_fan_speed_units{serial=\"fan_b\",name=\"fan_b\"} 4\n"));
    }

    #[tokio::test]
    async fn test_header_block_precedes_samples() {
        const CATALOGUE: &[MetricDesc] = &[
            MetricDesc {
                name: "dyson_fan_speed_units",
                help: "Current speed of fan (-1 = AUTO)",
            },
            MetricDesc {
                name: "dyson_night_mode",
                help: "Night mode",
            },
        ];
        let registry = MetricsRegistry::with_catalogue(CATALOGUE);
        registry
            .set_state("fan_b", "dyson_night_mode", ON_OFF, "ON")
            .await
            .unwrap();
        registry.set("fan_a", "dyson_fan_speed_units", -1.0).await.unwrap();
        registry.set("fan_a", "uncatalogued", 1.0).await.unwrap();

        assert_eq!(
            registry.render().await,
            "# HELP dyson_fan_speed_units Current speed of fan (-1 = AUTO)\n\
             # TYPE dyson_fan_speed_units gauge\n\
             # HELP dyson_night_mode Night mode\n\
             # TYPE dyson_night_mode gauge\n\
             # TYPE uncatalogued gauge\n\
             dyson_fan_speed_units{serial=\"fan_a\",name=\"fan_a\"} -1\n\
             uncatalogued{serial=\"fan_a\",name=\"fan_a\"} 1\n\
             dyson_night_mode{serial=\"fan_b\",name=\"fan_b\",dyson_night_mode=\"OFF\"} 0\n\
             dyson_night_mode{serial=\"fan_b\",name=\"fan_b\",dyson_night_mode=\"ON\"} 1\n"
        );

        assert_eq!(MetricsRegistry::with_catalogue(CATALOGUE).render().await, "");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_and_render() {
        let registry = Arc::new(MetricsRegistry::new());
        let device = DeviceIdentity::new("fan1", "Fan", "");

        let writer = {
            let registry = registry.clone();
            let device = device.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    // Both gauges always carry the same value within one batch
                    let value = i as f64;
                    let updates = [
                        MetricUpdate::Gauge { name: "a", unit: "", value },
                        MetricUpdate::Gauge { name: "b", unit: "", value },
                    ];
                    registry.apply(&device, &updates).await.unwrap();
                    registry.set("fan2", "c", value).await.unwrap();
                }
            })
        };

        let reader = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let snapshot = registry.snapshot().await;
                    let values: Vec<f64> = snapshot
                        .samples()
                        .iter()
                        .filter(|s| s.device_id == "fan1")
                        .map(|s| s.value)
                        .collect();
                    if values.len() == 2 {
                        assert_eq!(values[0], values[1], "torn read");
                    }
                    for line in snapshot.lines() {
                        assert!(line.ends_with('\n'));
                    }
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(registry.snapshot().await.len(), 3);
    }
}
