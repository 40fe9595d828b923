//! Per-device fullness monitor.
//!
//! A [`DeviceMonitor`] owns at most one background Tokio task. Each
//! iteration of that task samples the sensor, publishes the sample for
//! [`DeviceMonitor::fullness`], classifies it against
//! [`FULL_THRESHOLD`] and persists the result through the shared
//! [`DeviceRegistry`]. Persistence failures are logged and the loop goes
//! on; a monitor never stops itself.
//!
//! Cancellation is cooperative. It is observed before an iteration starts
//! and during the wait between iterations, never in the middle of one, so
//! a sample that has been taken is always persisted (or its failure
//! logged) before the task exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::metrics::FleetMetrics;
use crate::registry::{DeviceId, DeviceRegistry};
use crate::sensor::SensorSource;

/// Fullness (percent) at or above which a device counts as full.
pub const FULL_THRESHOLD: f64 = 80.0;

/// Default wait between two polling iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// `true` when `sample` is at or above [`FULL_THRESHOLD`].
pub fn classify(sample: f64) -> bool {
    sample >= FULL_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// Background fullness monitor for one device.
pub struct DeviceMonitor {
    device_id: DeviceId,
    registry: Arc<DeviceRegistry>,
    sensor: Arc<dyn SensorSource>,
    period: Duration,
    persist_timeout: Option<Duration>,
    metrics: Option<Arc<FleetMetrics>>,
    fullness: Arc<AtomicU64>,
    task: Option<PollingTask>,
}

struct PollingTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Everything one polling iteration needs, shared with the spawned task.
struct PollContext {
    device_id: DeviceId,
    registry: Arc<DeviceRegistry>,
    sensor: Arc<dyn SensorSource>,
    persist_timeout: Option<Duration>,
    metrics: Option<Arc<FleetMetrics>>,
    fullness: Arc<AtomicU64>,
}

impl DeviceMonitor {
    /// Create a stopped monitor. Nothing runs until [`start`](Self::start).
    pub fn new(
        device_id: DeviceId,
        registry: Arc<DeviceRegistry>,
        sensor: Arc<dyn SensorSource>,
    ) -> Self {
        Self {
            device_id,
            registry,
            sensor,
            period: DEFAULT_POLL_INTERVAL,
            persist_timeout: None,
            metrics: None,
            fullness: Arc::new(AtomicU64::new(0f64.to_bits())),
            task: None,
        }
    }

    /// Wait between polling iterations.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Give up on a write after `timeout`, roll it back and treat it as a
    /// failed write. Without this a stalled store stalls the loop.
    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = Some(timeout);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<FleetMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// `Running` only while the polling task is alive. A task that died
    /// (for example a panicking sensor) reads as `Stopped`.
    pub fn state(&self) -> MonitorState {
        match &self.task {
            Some(task) if !task.handle.is_finished() => MonitorState::Running,
            _ => MonitorState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Last sample taken by the background task, `0.0` before the first.
    pub fn fullness(&self) -> f64 {
        f64::from_bits(self.fullness.load(Ordering::Acquire))
    }

    /// Spawn the polling task. Does nothing if it is already running.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            tracing::debug!(device_id = self.device_id, "Monitor already running");
            return;
        }
        self.reap_dead_task();

        let ctx = PollContext {
            device_id: self.device_id,
            registry: Arc::clone(&self.registry),
            sensor: Arc::clone(&self.sensor),
            persist_timeout: self.persist_timeout,
            metrics: self.metrics.clone(),
            fullness: Arc::clone(&self.fullness),
        };
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_polling(ctx, self.period, cancel.clone()));

        if let Some(metrics) = &self.metrics {
            metrics.monitors_running.inc();
        }
        self.task = Some(PollingTask { cancel, handle });
    }

    /// Cancel the polling task and wait for it to exit. Does nothing if
    /// the monitor is not running.
    ///
    /// Once this returns no further iteration will start, so the
    /// registry will not see a late write from this monitor.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        task.cancel.cancel();
        if let Err(err) = task.handle.await {
            tracing::error!(
                device_id = self.device_id,
                error = %err,
                "Device monitor task ended abnormally"
            );
        }

        if let Some(metrics) = &self.metrics {
            metrics.monitors_running.dec();
        }
    }

    // The loop only returns on cancellation, so a handle still stored here
    // when `start` runs belongs to a task that panicked.
    fn reap_dead_task(&mut self) {
        if self.task.take().is_some() {
            tracing::warn!(
                device_id = self.device_id,
                "Previous monitor task died, starting a new one"
            );
            if let Some(metrics) = &self.metrics {
                metrics.monitors_running.dec();
            }
        }
    }
}

impl Drop for DeviceMonitor {
    // Can't join from a destructor: signal the task and let it wind down
    // at its next loop boundary.
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel.cancel();
            if let Some(metrics) = &self.metrics {
                metrics.monitors_running.dec();
            }
        }
    }
}

/// Run the polling loop until `cancel` fires.
async fn run_polling(ctx: PollContext, period: Duration, cancel: CancellationToken) {
    tracing::info!(
        device_id = ctx.device_id,
        source = ctx.sensor.source_name(),
        "Device monitor started (interval: {}ms)",
        period.as_millis()
    );

    while !cancel.is_cancelled() {
        poll_once(&ctx).await;

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            _ = time::sleep(period) => {}
        }
    }

    tracing::info!(device_id = ctx.device_id, "Device monitor stopped");
}

/// Execute a single sample-classify-persist cycle. Extracted for testability.
async fn poll_once(ctx: &PollContext) {
    // 1. Sample and publish
    let sample = ctx.sensor.sample().await;
    ctx.fullness.store(sample.to_bits(), Ordering::Release);

    if let Some(metrics) = &ctx.metrics {
        let device_label = ctx.device_id.to_string();
        metrics.samples_total.inc();
        metrics
            .device_fullness
            .with_label_values(&[device_label.as_str()])
            .set(sample);
    }

    // 2. Classify
    let is_full = classify(sample);

    // 3. Persist
    let result = match ctx.persist_timeout {
        Some(limit) => {
            ctx.registry
                .set_full_state_within(ctx.device_id, is_full, limit)
                .await
        }
        None => ctx.registry.set_full_state(ctx.device_id, is_full).await,
    };

    match result {
        Ok(()) => {
            tracing::debug!(
                device_id = ctx.device_id,
                fullness = sample,
                is_full,
                "Device state persisted"
            );
        }
        Err(err) if err.is_timeout() => {
            tracing::warn!(
                device_id = ctx.device_id,
                fullness = sample,
                error = %err,
                "Store stalled, write rolled back; retrying next tick"
            );
            record_persist_error(ctx);
        }
        Err(err) => {
            tracing::error!(
                device_id = ctx.device_id,
                fullness = sample,
                error = %err,
                "Failed to persist device state, retrying next tick"
            );
            record_persist_error(ctx);
        }
    }
}

fn record_persist_error(ctx: &PollContext) {
    if let Some(metrics) = &ctx.metrics {
        metrics.persist_errors_total.inc();
    }
}
