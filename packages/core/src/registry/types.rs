//! Core data types for the device registry

use serde::Serialize;

/// Store-assigned identifier of a device record.
pub type DeviceId = i64;

/// A single registered collection container. Serialized for the demo's
/// final JSON log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub city: String,
    pub county: String,
    pub street: String,
    pub street_number: i64,
    pub is_full: bool,
    pub use_number: i64,
}

/// Persisted full/not-full classification of an existing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullState {
    Full,
    NotFull,
}

impl From<bool> for FullState {
    fn from(is_full: bool) -> Self {
        if is_full {
            FullState::Full
        } else {
            FullState::NotFull
        }
    }
}
