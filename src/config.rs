use std::time::Duration;

use tracing::warn;

const DEFAULT_ADDR: &str = "0.0.0.0:9001";
const DEFAULT_DURATION_MS: i64 = 5 * 60 * 1000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;
/// Lifespans a sender may choose: 1, 5, 15 or 60 minutes.
const ALLOWED_DURATIONS_MS: [i64; 4] = [60_000, 300_000, 900_000, 3_600_000];
/// Images travel inline as encoded text, so the cap is generous.
const DEFAULT_MAX_CONTENT_LEN: usize = 8 * 1024 * 1024;

/// Server configuration, read from environment variables with defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub default_duration_ms: i64,
    pub allowed_durations_ms: Vec<i64>,
    pub sweep_interval: Duration,
    pub max_content_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            default_duration_ms: DEFAULT_DURATION_MS,
            allowed_durations_ms: ALLOWED_DURATIONS_MS.to_vec(),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
        }
    }
}

impl Config {
    /// Build a config from `VANISH_SERVER_ADDR`, `VANISH_DEFAULT_DURATION_MS`
    /// and `VANISH_SWEEP_INTERVAL_MS`, falling back to defaults for unset or
    /// unparseable values.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("VANISH_SERVER_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(duration) = env_i64("VANISH_DEFAULT_DURATION_MS") {
            if config.allowed_durations_ms.contains(&duration) {
                config.default_duration_ms = duration;
            } else {
                warn!(
                    "VANISH_DEFAULT_DURATION_MS={} is not an allowed lifespan, keeping {}",
                    duration, config.default_duration_ms
                );
            }
        }
        if let Some(interval_ms) = env_i64("VANISH_SWEEP_INTERVAL_MS") {
            if interval_ms > 0 {
                config.sweep_interval = Duration::from_millis(interval_ms as u64);
            }
        }
        config.enforce_sweep_bound();
        config
    }

    /// Smallest lifespan a sender may choose.
    pub fn min_duration_ms(&self) -> i64 {
        self.allowed_durations_ms.iter().copied().min().unwrap_or(0)
    }

    /// The sweep interval must stay strictly below the smallest allowed
    /// duration, otherwise a viewed message could outlive its deadline by
    /// more than one tick indefinitely.
    fn enforce_sweep_bound(&mut self) {
        let min_duration = Duration::from_millis(self.min_duration_ms() as u64);
        if self.sweep_interval >= min_duration {
            warn!(
                "Sweep interval {:?} >= smallest duration {:?}, resetting to {}ms",
                self.sweep_interval, min_duration, DEFAULT_SWEEP_INTERVAL_MS
            );
            self.sweep_interval = Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS);
        }
    }
}

fn env_i64(name: &str) -> Option<i64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}={}", name, raw);
            None
        }
    }
}
