//! Replay and fetch-pool configuration, validation, and error types.
//!
//! [`ReplayConfig`] shapes one clock's delivery channel and telemetry;
//! [`PoolConfig`] sizes the shared fetch pool. Both follow the
//! validate-at-construction discipline: `validate()` checks structural
//! invariants before any thread is spawned.

use std::error::Error;
use std::fmt;
use std::time::Duration;

// ── ReplayConfig ───────────────────────────────────────────────────

/// Configuration for one [`ReplayClock`](crate::clock::ReplayClock).
#[derive(Clone, Debug)]
pub struct ReplayConfig {
    /// Capacity of the bounded packet delivery channel. When the channel
    /// is full the clock drops the packet rather than blocking on a slow
    /// consumer. Default: 100.
    pub channel_capacity: usize,
    /// Number of per-tick wake-up errors retained for the timing
    /// statistics window. Default: 1000.
    pub timing_window: usize,
    /// Budget for one fetch round trip through the pool. `None` = one
    /// sample interval (resolved when the clock binds to its source).
    pub fetch_timeout: Option<Duration>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            timing_window: 1000,
            fetch_timeout: None,
        }
    }
}

impl ReplayConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ReplayConfigError> {
        if self.channel_capacity == 0 {
            return Err(ReplayConfigError::ChannelCapacityZero);
        }
        if self.timing_window == 0 {
            return Err(ReplayConfigError::TimingWindowZero);
        }
        if let Some(t) = self.fetch_timeout {
            if t.is_zero() {
                return Err(ReplayConfigError::FetchTimeoutZero);
            }
        }
        Ok(())
    }
}

// ── PoolConfig ─────────────────────────────────────────────────────

/// Configuration for the shared [`FetchPool`](crate::fetch::FetchPool).
#[derive(Clone, Debug, Default)]
pub struct PoolConfig {
    /// Number of fetch worker threads. `None` = auto-detect
    /// (`available_parallelism / 2`, clamped to `[2, 16]`).
    pub worker_count: Option<usize>,
}

impl PoolConfig {
    /// Resolve the actual worker count, applying auto-detection if `None`.
    ///
    /// Explicit values are clamped to `[1, 64]`. Zero workers would
    /// create an unusable pool (no threads to service fetches).
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.clamp(1, 64),
            None => {
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4);
                (cpus / 2).clamp(2, 16)
            }
        }
    }
}

// ── ReplayConfigError ──────────────────────────────────────────────

/// Errors detected during [`ReplayConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayConfigError {
    /// `channel_capacity` is zero.
    ChannelCapacityZero,
    /// `timing_window` is zero.
    TimingWindowZero,
    /// An explicit `fetch_timeout` of zero was supplied.
    FetchTimeoutZero,
}

impl fmt::Display for ReplayConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelCapacityZero => write!(f, "channel_capacity must be at least 1"),
            Self::TimingWindowZero => write!(f, "timing_window must be at least 1"),
            Self::FetchTimeoutZero => write!(f, "fetch_timeout must be non-zero"),
        }
    }
}

impl Error for ReplayConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_succeeds() {
        assert!(ReplayConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_channel_capacity_fails() {
        let cfg = ReplayConfig {
            channel_capacity: 0,
            ..ReplayConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ReplayConfigError::ChannelCapacityZero));
    }

    #[test]
    fn validate_zero_timing_window_fails() {
        let cfg = ReplayConfig {
            timing_window: 0,
            ..ReplayConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ReplayConfigError::TimingWindowZero));
    }

    #[test]
    fn validate_zero_fetch_timeout_fails() {
        let cfg = ReplayConfig {
            fetch_timeout: Some(Duration::ZERO),
            ..ReplayConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ReplayConfigError::FetchTimeoutZero));
    }

    #[test]
    fn pool_config_resolved_worker_count_clamps_zero() {
        let cfg = PoolConfig {
            worker_count: Some(0),
        };
        assert_eq!(cfg.resolved_worker_count(), 1);
    }

    #[test]
    fn pool_config_resolved_worker_count_clamps_large() {
        let cfg = PoolConfig {
            worker_count: Some(200),
        };
        assert_eq!(cfg.resolved_worker_count(), 64);
    }

    #[test]
    fn pool_config_resolved_worker_count_auto() {
        let count = PoolConfig::default().resolved_worker_count();
        assert!((2..=16).contains(&count), "auto count {count} out of [2,16]");
    }
}
