use std::env;
use std::time::Duration;

use crate::monitor::DEFAULT_POLL_INTERVAL;

const DEFAULT_DATABASE_URL: &str = "sqlite://dumpster_fleet.db";
const DEFAULT_DEMO_RUN_SECONDS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub poll_interval: Duration,
    pub demo_run_seconds: u64,
    /// Fixed seed for the simulated sensor; entropy when unset.
    pub sensor_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Every key is optional; a value
    /// that is present but malformed is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let poll_interval = match lookup("POLL_INTERVAL_SECONDS") {
            Some(raw) => {
                let secs = parse_u64("POLL_INTERVAL_SECONDS", &raw)?;
                if secs == 0 {
                    return Err("POLL_INTERVAL_SECONDS must be greater than zero".into());
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_POLL_INTERVAL,
        };

        let demo_run_seconds = match lookup("DEMO_RUN_SECONDS") {
            Some(raw) => parse_u64("DEMO_RUN_SECONDS", &raw)?,
            None => DEFAULT_DEMO_RUN_SECONDS,
        };

        let sensor_seed = lookup("SENSOR_SEED")
            .map(|raw| parse_u64("SENSOR_SEED", &raw))
            .transpose()?;

        Ok(Self {
            database_url,
            poll_interval,
            demo_run_seconds,
            sensor_seed,
        })
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, String> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| format!("{} must be a valid number, got {:?}", key, raw))
}
