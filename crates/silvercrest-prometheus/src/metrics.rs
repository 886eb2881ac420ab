//! Prometheus metrics definitions for Silvercrest plugs.

use std::{sync::atomic::AtomicU64, time::Duration};

use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{family::Family, gauge::Gauge},
    registry::Registry,
};
use silvercrest_core::{DiscoveredDevice, RelayState};

/// Labels identifying a plug by the address it was polled at.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PlugLabels {
    pub ip: String,
}

/// Labels for the info metric, only known for discovered plugs.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PlugInfoLabels {
    pub ip: String,
    pub mac: String,
}

impl PlugLabels {
    pub fn new(ip: impl Into<String>) -> Self {
        Self { ip: ip.into() }
    }
}

impl From<&DiscoveredDevice> for PlugLabels {
    fn from(device: &DiscoveredDevice) -> Self {
        Self::new(device.ip.to_string())
    }
}

impl From<&DiscoveredDevice> for PlugInfoLabels {
    fn from(device: &DiscoveredDevice) -> Self {
        Self {
            ip: device.ip.to_string(),
            mac: device.mac.to_string(),
        }
    }
}

/// Container for all plug metrics.
pub struct DeviceMetrics {
    // Always 1, carries the MAC as a label
    device_info: Family<PlugInfoLabels, Gauge>,

    relay_state: Family<PlugLabels, Gauge>,

    // Exporter metrics
    scrape_success: Family<PlugLabels, Gauge>,
    scrape_duration_seconds: Gauge<f64, AtomicU64>,
    devices_discovered: Gauge,
}

impl DeviceMetrics {
    /// Create new metrics and register them with the provided registry.
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            device_info: Family::default(),
            relay_state: Family::default(),
            scrape_success: Family::default(),
            scrape_duration_seconds: Gauge::default(),
            devices_discovered: Gauge::default(),
        };

        registry.register(
            "silvercrest_device_info",
            "Discovered plug metadata (value is always 1)",
            metrics.device_info.clone(),
        );

        registry.register(
            "silvercrest_relay_state",
            "Relay state (1 = on, 0 = off)",
            metrics.relay_state.clone(),
        );

        registry.register(
            "silvercrest_scrape_success",
            "Whether the last scrape was successful (1 = success, 0 = failure)",
            metrics.scrape_success.clone(),
        );

        registry.register(
            "silvercrest_scrape_duration_seconds",
            "Duration of the last scrape cycle in seconds",
            metrics.scrape_duration_seconds.clone(),
        );

        registry.register(
            "silvercrest_devices_discovered",
            "Number of plugs discovered (or targeted) in the last poll",
            metrics.devices_discovered.clone(),
        );

        metrics
    }

    /// Set device info metric
    pub fn set_device_info(&self, device: &DiscoveredDevice) {
        self.device_info
            .get_or_create(&PlugInfoLabels::from(device))
            .set(1);
    }

    /// Record the outcome of a state query.
    ///
    /// An `Unknown` state marks the scrape as failed and keeps the last
    /// known relay value.
    pub fn record_state(&self, labels: &PlugLabels, state: RelayState) {
        match state.as_bool() {
            Some(on) => {
                self.relay_state
                    .get_or_create(labels)
                    .set(if on { 1 } else { 0 });
                self.set_scrape_success(labels, true);
            }
            None => self.set_scrape_success(labels, false),
        }
    }

    /// Set scrape success for a plug
    pub fn set_scrape_success(&self, labels: &PlugLabels, success: bool) {
        self.scrape_success
            .get_or_create(labels)
            .set(if success { 1 } else { 0 });
    }

    /// Set scrape duration
    pub fn set_scrape_duration(&self, duration: Duration) {
        self.scrape_duration_seconds.set(duration.as_secs_f64());
    }

    /// Set number of discovered devices
    pub fn set_devices_discovered(&self, count: usize) {
        self.devices_discovered.set(count as i64);
    }
}
