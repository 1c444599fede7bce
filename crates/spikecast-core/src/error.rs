//! Error types for the Spikecast replay framework.
//!
//! Organized by subsystem: construction ([`InitError`]), per-tick source
//! access ([`SourceError`]), session control ([`ControlError`]), and the
//! session registry ([`RegistryError`]).
//!
//! Fatal errors surface synchronously from constructors. Per-tick source
//! failures are never fatal: the clock counts a dropped packet and
//! proceeds to the next scheduled tick.

use std::error::Error;
use std::fmt;

use crate::id::TrialId;

/// Fatal errors while binding a replay clock to its source.
///
/// No session is created when any of these is returned.
#[derive(Clone, Debug, PartialEq)]
pub enum InitError {
    /// The sample source could not be reached or probed.
    SourceUnavailable {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The source reports zero samples.
    EmptyDataset,
    /// The source reports a zero or non-finite sample interval.
    InvalidInterval {
        /// The reported interval in milliseconds.
        interval_ms: f64,
    },
    /// A background thread could not be spawned.
    ThreadSpawn {
        /// Description of which thread failed.
        reason: String,
    },
    /// A configuration invariant was violated.
    InvalidConfig {
        /// Description of the violated invariant.
        reason: String,
    },
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable { reason } => {
                write!(f, "sample source unavailable: {reason}")
            }
            Self::EmptyDataset => write!(f, "sample source reports zero samples"),
            Self::InvalidInterval { interval_ms } => {
                write!(f, "invalid sample interval: {interval_ms}ms")
            }
            Self::ThreadSpawn { reason } => {
                write!(f, "thread spawn failed: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid config: {reason}")
            }
        }
    }
}

impl Error for InitError {}

/// Errors from a [`SampleSource`](crate::source::SampleSource) query.
///
/// On the tick path these are non-fatal: the failing tick is recorded as
/// a dropped packet and the loop continues.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceError {
    /// The backing storage is temporarily or permanently unreachable.
    Unavailable {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The requested index range falls outside the recording.
    OutOfRange {
        /// First requested index.
        index: u64,
        /// Total samples in the recording.
        total: u64,
    },
    /// The requested trial does not exist in the trial table.
    UnknownTrial {
        /// The trial that was requested.
        trial: TrialId,
    },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "source unavailable: {reason}"),
            Self::OutOfRange { index, total } => {
                write!(f, "index {index} out of range (total {total})")
            }
            Self::UnknownTrial { trial } => write!(f, "unknown trial {trial}"),
        }
    }
}

impl Error for SourceError {}

/// Caller errors on the session control surface.
///
/// Rejected synchronously; the session state is unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlError {
    /// `seek` target is outside `[0, total_samples)`.
    SeekOutOfRange {
        /// The requested position.
        position: u64,
        /// Total samples in the recording.
        total: u64,
    },
    /// Both a trial filter and a target filter were supplied.
    FilterConflict,
    /// The session is stopped; the operation is no longer valid.
    SessionStopped,
    /// A trial id used for seeking could not be resolved.
    TrialResolution(SourceError),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeekOutOfRange { position, total } => {
                write!(f, "seek position {position} out of range (total {total})")
            }
            Self::FilterConflict => {
                write!(f, "trial and target filters are mutually exclusive")
            }
            Self::SessionStopped => write!(f, "session is stopped"),
            Self::TrialResolution(e) => write!(f, "trial resolution failed: {e}"),
        }
    }
}

impl Error for ControlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TrialResolution(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SourceError> for ControlError {
    fn from(e: SourceError) -> Self {
        Self::TrialResolution(e)
    }
}

/// Errors from the session registry.
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryError {
    /// The session ceiling is reached and no idle session is evictable.
    AtCapacity {
        /// The configured ceiling.
        max_sessions: usize,
    },
    /// No session exists under the given key.
    NotFound {
        /// The key that was looked up.
        key: String,
    },
    /// Binding a new clock to the shared source failed.
    Init(InitError),
    /// A control operation routed to the keyed session was rejected.
    Control(ControlError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtCapacity { max_sessions } => {
                write!(f, "session ceiling reached ({max_sessions}), none evictable")
            }
            Self::NotFound { key } => write!(f, "session '{key}' not found"),
            Self::Init(e) => write!(f, "session init failed: {e}"),
            Self::Control(e) => write!(f, "session control failed: {e}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Init(e) => Some(e),
            Self::Control(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InitError> for RegistryError {
    fn from(e: InitError) -> Self {
        Self::Init(e)
    }
}

impl From<ControlError> for RegistryError {
    fn from(e: ControlError) -> Self {
        Self::Control(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_are_stable() {
        let e = InitError::SourceUnavailable {
            reason: "mmap failed".into(),
        };
        assert_eq!(format!("{e}"), "sample source unavailable: mmap failed");

        let e = SourceError::OutOfRange {
            index: 10,
            total: 5,
        };
        assert_eq!(format!("{e}"), "index 10 out of range (total 5)");

        let e = ControlError::SeekOutOfRange {
            position: 1000,
            total: 1000,
        };
        assert!(format!("{e}").contains("out of range"));

        let e = RegistryError::NotFound {
            key: "swift-cortex-7".into(),
        };
        assert!(format!("{e}").contains("swift-cortex-7"));
    }

    #[test]
    fn error_sources_chain() {
        let inner = SourceError::UnknownTrial { trial: TrialId(9) };
        let e = ControlError::TrialResolution(inner.clone());
        assert!(e.source().is_some());

        let e = RegistryError::Init(InitError::EmptyDataset);
        assert!(e.source().is_some());
        assert!(RegistryError::NotFound { key: "x".into() }.source().is_none());
    }
}
