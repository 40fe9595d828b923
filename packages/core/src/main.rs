use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio::signal;

use dumpster_fleet::cli::Cli;
use dumpster_fleet::config::Config;
use dumpster_fleet::error::AppError;
use dumpster_fleet::logging::init_logging;
use dumpster_fleet::metrics::FleetMetrics;
use dumpster_fleet::monitor::DeviceMonitor;
use dumpster_fleet::registry::DeviceRegistry;
use dumpster_fleet::sensor::{SensorSource, SimulatedSensor};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    // Only --help and --version; everything else is rejected.
    Cli::parse();

    let config = Config::from_env().unwrap_or_else(|err| {
        tracing::error!("{}", AppError::Config(err));
        std::process::exit(1);
    });

    tracing::info!("Demo started with config: {:?}", config);

    if let Err(err) = run_demo(config).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

/// Register one device, monitor it for the configured duration, stop.
async fn run_demo(config: Config) -> Result<(), AppError> {
    let registry = Arc::new(DeviceRegistry::connect(&config.database_url).await?);
    let metrics =
        Arc::new(FleetMetrics::new().map_err(|err| AppError::Metrics(err.to_string()))?);

    let device_id = registry.register("A", "B", "C", 0).await?;
    let devices = registry.count().await?;
    tracing::info!(device_id, devices, "Demo device registered");

    let sensor: Arc<dyn SensorSource> = match config.sensor_seed {
        Some(seed) => Arc::new(SimulatedSensor::seeded(seed)),
        None => Arc::new(SimulatedSensor::new()),
    };

    let mut monitor = DeviceMonitor::new(device_id, Arc::clone(&registry), sensor)
        .with_period(config.poll_interval)
        .with_persist_timeout(config.poll_interval)
        .with_metrics(Arc::clone(&metrics));

    monitor.start();

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(config.demo_run_seconds)) => {}
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received. Stopping monitor.");
        }
    }

    monitor.stop().await;

    let device = registry.get_by_id(device_id).await?;
    tracing::info!(
        fullness = monitor.fullness(),
        "Final device record: {}",
        serde_json::to_string(&device).unwrap_or_default()
    );

    match metrics.render() {
        Ok(text) => tracing::debug!("Metrics:\n{}", text),
        Err(err) => tracing::warn!("Could not render metrics: {}", err),
    }

    tracing::info!("Demo finished cleanly");
    Ok(())
}
