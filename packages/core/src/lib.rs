// Library root: the registry, monitor and sensor core, plus the ambient
// modules the demo binary in `src/main.rs` is assembled from.

pub mod db;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod registry;
pub mod sensor;

// These modules are only needed by the binary.
pub mod cli;
pub mod config;
pub mod logging;

pub use monitor::{classify, DeviceMonitor, MonitorState, FULL_THRESHOLD};
pub use registry::{DeviceId, DeviceRecord, DeviceRegistry, FullState, RegistryError};
pub use sensor::{ScriptedSensor, SensorSource, SimulatedSensor};
