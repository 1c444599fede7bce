//! The [`SampleSource`] contract — the shared, read-only data backend.
//!
//! One source instance backs every session in a process. Implementations
//! are expected to sit on slow or memory-mapped storage and take
//! milliseconds per query, so callers must keep queries off any
//! time-critical scheduling path (the engine routes tick-path queries
//! through its bounded fetch pool).

use std::time::Duration;

use crate::error::SourceError;
use crate::id::TrialId;
use crate::packet::SampleBundle;

/// Read-only access to a fixed pre-recorded multi-channel time series.
///
/// Implementations must tolerate concurrent calls from multiple threads;
/// all methods take `&self`.
pub trait SampleSource: Send + Sync {
    /// Total number of samples in the recording.
    fn total_samples(&self) -> Result<u64, SourceError>;

    /// Fixed interval between consecutive samples.
    fn sample_interval(&self) -> Result<Duration, SourceError>;

    /// Samples in `[start, end)`, time-aligned across channels,
    /// kinematics, and trial context.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `start >= total_samples` or `end > total_samples`
    /// or `start >= end`; `Unavailable` on storage failure.
    fn query(&self, start: u64, end: u64) -> Result<SampleBundle, SourceError>;

    /// All samples of one trial, in recording order.
    ///
    /// # Errors
    ///
    /// `UnknownTrial` if the trial is not in the trial table.
    fn query_by_trial(&self, trial: TrialId) -> Result<SampleBundle, SourceError>;
}
