//! Registry configuration and validation.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use spikecast_engine::{PoolConfig, ReplayConfig, ReplayConfigError};
use spikecast_noise::NoiseTransform;

/// Configuration for a [`SessionRegistry`](crate::registry::SessionRegistry).
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Session ceiling. At capacity the registry evicts an idle
    /// unsubscribed session before creating a new one. Default: 16.
    pub max_sessions: usize,
    /// Idle time after which an unsubscribed session is removed by the
    /// sweeper. Default: 1 hour.
    pub session_ttl: Duration,
    /// Minimum idle time before a session becomes LRU-evictable at
    /// capacity. Default: 60 s.
    pub eviction_grace: Duration,
    /// Pause between sweeper passes. Default: 5 minutes.
    pub sweep_interval: Duration,
    /// Per-session clock configuration.
    pub replay: ReplayConfig,
    /// Shared fetch pool sizing.
    pub pool: PoolConfig,
    /// Optional corruption transform stamped onto every new session's
    /// clock. `None` streams the recording verbatim.
    pub noise: Option<NoiseTransform>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 16,
            session_ttl: Duration::from_secs(3600),
            eviction_grace: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(300),
            replay: ReplayConfig::default(),
            pool: PoolConfig::default(),
            noise: None,
        }
    }
}

impl RegistryConfig {
    /// Validate all structural invariants, including the embedded
    /// replay config.
    pub fn validate(&self) -> Result<(), RegistryConfigError> {
        if self.max_sessions == 0 {
            return Err(RegistryConfigError::MaxSessionsZero);
        }
        if self.session_ttl.is_zero() {
            return Err(RegistryConfigError::SessionTtlZero);
        }
        if self.sweep_interval.is_zero() {
            return Err(RegistryConfigError::SweepIntervalZero);
        }
        self.replay.validate().map_err(RegistryConfigError::Replay)?;
        Ok(())
    }
}

/// Errors detected during [`RegistryConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryConfigError {
    /// `max_sessions` is zero.
    MaxSessionsZero,
    /// `session_ttl` is zero.
    SessionTtlZero,
    /// `sweep_interval` is zero.
    SweepIntervalZero,
    /// The embedded replay config is invalid.
    Replay(ReplayConfigError),
}

impl fmt::Display for RegistryConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxSessionsZero => write!(f, "max_sessions must be at least 1"),
            Self::SessionTtlZero => write!(f, "session_ttl must be non-zero"),
            Self::SweepIntervalZero => write!(f, "sweep_interval must be non-zero"),
            Self::Replay(e) => write!(f, "replay config: {e}"),
        }
    }
}

impl Error for RegistryConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Replay(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_succeeds() {
        assert!(RegistryConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_max_sessions_fails() {
        let cfg = RegistryConfig {
            max_sessions: 0,
            ..RegistryConfig::default()
        };
        assert_eq!(cfg.validate(), Err(RegistryConfigError::MaxSessionsZero));
    }

    #[test]
    fn validate_zero_ttl_fails() {
        let cfg = RegistryConfig {
            session_ttl: Duration::ZERO,
            ..RegistryConfig::default()
        };
        assert_eq!(cfg.validate(), Err(RegistryConfigError::SessionTtlZero));
    }

    #[test]
    fn validate_zero_sweep_interval_fails() {
        let cfg = RegistryConfig {
            sweep_interval: Duration::ZERO,
            ..RegistryConfig::default()
        };
        assert_eq!(cfg.validate(), Err(RegistryConfigError::SweepIntervalZero));
    }

    #[test]
    fn validate_surfaces_embedded_replay_errors() {
        let mut cfg = RegistryConfig::default();
        cfg.replay.channel_capacity = 0;
        assert!(matches!(
            cfg.validate(),
            Err(RegistryConfigError::Replay(_))
        ));
    }
}
