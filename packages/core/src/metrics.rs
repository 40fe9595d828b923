//! Prometheus metrics for device monitors.
//!
//! [`FleetMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and hand it to
//! each [`DeviceMonitor`](crate::monitor::DeviceMonitor) via
//! `with_metrics`. Persistence failures inside the polling loop are only
//! visible through these counters and the logs.

use prometheus::{Counter, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

/// All fleet-level Prometheus metrics.
pub struct FleetMetrics {
    /// Total number of sensor samples taken across all monitors.
    pub samples_total: Counter,
    /// Total number of failed or timed-out `set_full_state` writes.
    pub persist_errors_total: Counter,
    /// Number of monitors currently running.
    pub monitors_running: Gauge,
    /// Last observed fullness, labelled by device id.
    pub device_fullness: GaugeVec,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl FleetMetrics {
    /// Create and register all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let samples_total = Counter::with_opts(Opts::new(
            "dumpster_fleet_samples_total",
            "Fullness samples taken by device monitors",
        ))?;

        let persist_errors_total = Counter::with_opts(Opts::new(
            "dumpster_fleet_persist_errors_total",
            "Failed attempts to persist a device's full state",
        ))?;

        let monitors_running = Gauge::with_opts(Opts::new(
            "dumpster_fleet_monitors_running",
            "Device monitors currently running",
        ))?;

        let device_fullness = GaugeVec::new(
            Opts::new(
                "dumpster_fleet_device_fullness_percent",
                "Last observed fullness per device",
            ),
            &["device_id"],
        )?;

        registry.register(Box::new(samples_total.clone()))?;
        registry.register(Box::new(persist_errors_total.clone()))?;
        registry.register(Box::new(monitors_running.clone()))?;
        registry.register(Box::new(device_fullness.clone()))?;

        Ok(Self {
            samples_total,
            persist_errors_total,
            monitors_running,
            device_fullness,
            registry,
        })
    }

    /// Prometheus text exposition of every fleet metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut out = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut out)?;
        String::from_utf8(out).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_register_without_error() {
        let metrics = FleetMetrics::new();
        assert!(metrics.is_ok(), "FleetMetrics::new() failed: {:?}", metrics.err());
    }

    #[test]
    fn render_contains_metric_after_increment() {
        let metrics = FleetMetrics::new().unwrap();
        metrics.samples_total.inc_by(5.0);
        let output = metrics.render().unwrap();
        assert!(output.contains("dumpster_fleet_samples_total 5"));
    }

    #[test]
    fn monitors_running_gauge_goes_up_and_down() {
        let metrics = FleetMetrics::new().unwrap();
        metrics.monitors_running.inc();
        metrics.monitors_running.inc();
        metrics.monitors_running.dec();
        assert!((metrics.monitors_running.get() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn device_fullness_labels_work() {
        let metrics = FleetMetrics::new().unwrap();
        metrics.device_fullness.with_label_values(&["3"]).set(81.5);
        let val = metrics.device_fullness.with_label_values(&["3"]).get();
        assert!((val - 81.5).abs() < f64::EPSILON);
    }

    #[test]
    fn render_lists_each_device_fullness_separately() {
        let metrics = FleetMetrics::new().unwrap();
        metrics.device_fullness.with_label_values(&["1"]).set(12.0);
        metrics.device_fullness.with_label_values(&["2"]).set(91.0);
        let output = metrics.render().unwrap();
        assert!(output.contains("dumpster_fleet_device_fullness_percent{device_id=\"1\"} 12"));
        assert!(output.contains("dumpster_fleet_device_fullness_percent{device_id=\"2\"} 91"));
    }
}
