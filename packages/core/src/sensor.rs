//! Fill-level sensor sources.
//!
//! Monitors only see the [`SensorSource`] trait, so the simulated source
//! used in production can be swapped for a [`ScriptedSensor`] in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound (exclusive) of a fullness sample, in percent.
pub const MAX_FULLNESS: f64 = 100.0;

/// Trait for fullness sample producers
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Take one fullness sample in `[0.0, 100.0)`.
    async fn sample(&self) -> f64;

    /// Get the name of this source for logging/debugging
    fn source_name(&self) -> &str;
}

/// Pseudo-random sensor standing in for real hardware.
///
/// Every instance owns its own generator, seeded once at construction:
/// from OS entropy with [`SimulatedSensor::new`], or from a fixed value
/// with [`SimulatedSensor::seeded`] for reproducible runs.
pub struct SimulatedSensor {
    rng: Mutex<StdRng>,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn next_sample(&self) -> f64 {
        // A poisoned lock only means another sampler panicked mid-draw;
        // the generator state is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0.0..MAX_FULLNESS)
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorSource for SimulatedSensor {
    async fn sample(&self) -> f64 {
        self.next_sample()
    }

    fn source_name(&self) -> &str {
        "simulated"
    }
}

/// Deterministic sensor for tests.
///
/// Yields the queued values in order; once the queue runs dry the last
/// value repeats forever. [`ScriptedSensor::set`] swaps in a new constant
/// and may be called while a monitor is sampling.
pub struct ScriptedSensor {
    queue: Mutex<VecDeque<f64>>,
    last: AtomicU64,
    taken: AtomicU64,
}

impl ScriptedSensor {
    /// Always return `value`.
    pub fn constant(value: f64) -> Self {
        Self::sequence(vec![value])
    }

    /// Return `values` in order, then keep repeating the last one.
    /// An empty sequence behaves like `constant(0.0)`.
    pub fn sequence(values: Vec<f64>) -> Self {
        let last = values.last().copied().unwrap_or(0.0);
        Self {
            queue: Mutex::new(values.into()),
            last: AtomicU64::new(last.to_bits()),
            taken: AtomicU64::new(0),
        }
    }

    /// Replace whatever is queued with a new constant.
    pub fn set(&self, value: f64) {
        let mut queue = self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        queue.clear();
        self.last.store(value.to_bits(), Ordering::SeqCst);
    }

    /// Number of samples handed out so far.
    pub fn samples_taken(&self) -> u64 {
        self.taken.load(Ordering::SeqCst)
    }

    fn next_sample(&self) -> f64 {
        let mut queue = self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.taken.fetch_add(1, Ordering::SeqCst);
        match queue.pop_front() {
            Some(value) => {
                self.last.store(value.to_bits(), Ordering::SeqCst);
                value
            }
            None => f64::from_bits(self.last.load(Ordering::SeqCst)),
        }
    }
}

#[async_trait]
impl SensorSource for ScriptedSensor {
    async fn sample(&self) -> f64 {
        self.next_sample()
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn constant_sensor_repeats_value() {
        let sensor = ScriptedSensor::constant(85.0);
        assert_eq!(sensor.sample().await, 85.0);
        assert_eq!(sensor.sample().await, 85.0);
        assert_eq!(sensor.samples_taken(), 2);
    }

    #[tokio::test]
    async fn sequence_then_repeats_last() {
        let sensor = ScriptedSensor::sequence(vec![10.0, 50.0, 90.0]);
        assert_eq!(sensor.sample().await, 10.0);
        assert_eq!(sensor.sample().await, 50.0);
        assert_eq!(sensor.sample().await, 90.0);
        assert_eq!(sensor.sample().await, 90.0);
    }

    #[tokio::test]
    async fn empty_sequence_yields_zero() {
        let sensor = ScriptedSensor::sequence(Vec::new());
        assert_eq!(sensor.sample().await, 0.0);
    }

    #[tokio::test]
    async fn set_discards_queue_and_swaps_constant() {
        let sensor = ScriptedSensor::sequence(vec![1.0, 2.0, 3.0]);
        assert_eq!(sensor.sample().await, 1.0);

        sensor.set(10.0);

        assert_eq!(sensor.sample().await, 10.0);
        assert_eq!(sensor.sample().await, 10.0);
    }

    #[tokio::test]
    async fn seeded_simulated_sensors_agree() {
        let a = SimulatedSensor::seeded(7);
        let b = SimulatedSensor::seeded(7);
        for _ in 0..20 {
            assert_eq!(a.sample().await, b.sample().await);
        }
    }

    #[test]
    fn source_names() {
        assert_eq!(SimulatedSensor::seeded(1).source_name(), "simulated");
        assert_eq!(ScriptedSensor::constant(1.0).source_name(), "scripted");
    }

    proptest! {
        #[test]
        fn simulated_samples_stay_in_range(seed in any::<u64>()) {
            let sensor = SimulatedSensor::seeded(seed);
            for _ in 0..50 {
                let value = sensor.next_sample();
                prop_assert!((0.0..MAX_FULLNESS).contains(&value));
            }
        }
    }
}
