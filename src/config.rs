//! Runtime-configurable tuning parameters for devcast.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `DEVCAST_`) or by constructing a custom `DevcastConfig`.

use std::time::Duration;

/// Tuning parameters for broadcast rounds and benchmarking.
#[derive(Debug, Clone)]
pub struct DevcastConfig {
    /// Timeout for the round barrier. A transfer that never satisfies
    /// its token surfaces as `TransferTimeout` naming the stuck tokens.
    pub barrier_timeout: Duration,

    /// Group size G for the grouped-tree topology.
    pub group_size: u32,

    /// Untimed rounds before measurement starts.
    pub warmup_rounds: u32,

    /// Timed rounds when the per-field payload is small enough to make
    /// many repetitions cheap (payload <= `small_payload_bytes`).
    pub rounds_small: u32,

    /// Timed rounds for larger payloads.
    pub rounds_large: u32,

    /// Payload threshold separating `rounds_small` from `rounds_large`.
    pub small_payload_bytes: usize,
}

impl Default for DevcastConfig {
    fn default() -> Self {
        Self {
            barrier_timeout: Duration::from_secs(30),
            group_size: 4,
            warmup_rounds: 5,
            rounds_small: 90,
            rounds_large: 10,
            small_payload_bytes: 65536,
        }
    }
}

impl DevcastConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `DEVCAST_BARRIER_TIMEOUT_SECS`
    /// - `DEVCAST_GROUP_SIZE`
    /// - `DEVCAST_WARMUP_ROUNDS`
    /// - `DEVCAST_ROUNDS_SMALL`
    /// - `DEVCAST_ROUNDS_LARGE`
    /// - `DEVCAST_SMALL_PAYLOAD_BYTES`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("DEVCAST_BARRIER_TIMEOUT_SECS") {
            if let Ok(s) = v.parse::<u64>() {
                cfg.barrier_timeout = Duration::from_secs(s);
            }
        }
        if let Ok(v) = std::env::var("DEVCAST_GROUP_SIZE") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.group_size = n;
            }
        }
        if let Ok(v) = std::env::var("DEVCAST_WARMUP_ROUNDS") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.warmup_rounds = n;
            }
        }
        if let Ok(v) = std::env::var("DEVCAST_ROUNDS_SMALL") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.rounds_small = n;
            }
        }
        if let Ok(v) = std::env::var("DEVCAST_ROUNDS_LARGE") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.rounds_large = n;
            }
        }
        if let Ok(v) = std::env::var("DEVCAST_SMALL_PAYLOAD_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.small_payload_bytes = n;
            }
        }

        cfg
    }

    /// Timed round count for a given per-field payload size. Never zero:
    /// the benchmark divides by it.
    pub fn timed_rounds(&self, payload_bytes: usize) -> u32 {
        let rounds = if payload_bytes <= self.small_payload_bytes {
            self.rounds_small
        } else {
            self.rounds_large
        };
        rounds.max(1)
    }
}
