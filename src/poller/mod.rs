//! StatePoller: periodic device state collection
//!
//! Runs in a background tokio task. Every tick, enumerates devices through the
//! `DeviceClient`, reads each device's state and writes the translated metrics
//! into the registry. A failing device is skipped; its previous values stay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::device::{DeviceClient, DeviceInfo};
use crate::metrics::{dyson, DeviceIdentity, MetricsRegistry};

/// Outcome of one poll cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub seen: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct StatePoller {
    client: Arc<dyn DeviceClient>,
    registry: Arc<MetricsRegistry>,
    interval: Duration,
    only_active: bool,
}

impl StatePoller {
    pub fn new(
        client: Arc<dyn DeviceClient>,
        registry: Arc<MetricsRegistry>,
        interval: Duration,
        only_active: bool,
    ) -> Self {
        Self {
            client,
            registry,
            interval,
            only_active,
        }
    }

    /// Poll until `shutdown` flips to true (or its sender is dropped)
    pub async fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "[Poller] Starting state poller via {} (interval: {}s)",
            self.client.name(),
            self.interval.as_secs()
        );

        // First tick completes immediately so metrics exist before the first interval
        let mut interval_timer = time::interval(self.interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    let summary = self.poll_once().await;
                    tracing::debug!(
                        "[Poller] Cycle done: {} seen, {} updated, {} skipped, {} failed",
                        summary.seen,
                        summary.updated,
                        summary.skipped,
                        summary.failed
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("[Poller] Stopped");
    }

    /// Run a single poll cycle
    pub async fn poll_once(&self) -> PollSummary {
        let mut summary = PollSummary::default();

        let devices = match self.client.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!("[Poller] Device enumeration failed: {}; retrying next tick", e);
                return summary;
            }
        };
        summary.seen = devices.len();

        for device in devices {
            if device.serial.trim().is_empty() {
                tracing::error!(
                    "[Poller] Ignoring device with name={:?}, serial={:?}",
                    device.name,
                    device.serial
                );
                summary.skipped += 1;
                continue;
            }

            if self.only_active && !device.active {
                tracing::info!(
                    "[Poller] Found device \"{}\" (serial={}) but is not active; skipping",
                    device.name,
                    device.serial
                );
                summary.skipped += 1;
                continue;
            }

            match self.poll_device(&device).await {
                Ok(count) => {
                    tracing::debug!(
                        "[Poller] Updated {} metrics for \"{}\" (serial={})",
                        count,
                        device.name,
                        device.serial
                    );
                    summary.updated += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "[Poller] Could not read \"{}\" (serial={}): {}; skipping",
                        device.name,
                        device.serial,
                        e
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    async fn poll_device(&self, device: &DeviceInfo) -> crate::error::Result<usize> {
        let state = self.client.get_state(device).await?;
        let updates = dyson::translate(device, &state);

        let identity = DeviceIdentity::new(&device.serial, &device.name, &device.product_type);
        self.registry.apply(&identity, &updates).await?;
        Ok(updates.len())
    }
}
