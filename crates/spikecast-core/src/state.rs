//! Run-state machine, emission filters, and per-session statistics.

use std::fmt;

use crate::error::ControlError;
use crate::id::{TargetId, TrialId};

/// Lifecycle state of one replay clock.
///
/// ```text
/// Ready --start()--> Running <--pause()/resume()--> Paused
///   |                   |                             |
///   +-------------------+------ stop() --------------+--> Stopped
/// ```
///
/// `Stopped` is terminal; dataset exhaustion also lands here. `seek` and
/// `set_filter` are valid in every state except `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Bound to a source, not yet started.
    Ready,
    /// The tick loop is live.
    Running,
    /// Ticks are suspended; the cursor holds its position.
    Paused,
    /// Terminal: stopped explicitly or the recording was exhausted.
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Emission filter applied per tick.
///
/// A filter never changes the cadence of the underlying clock: the cursor
/// advances one sample per interval regardless, and a tick whose sample
/// fails the filter is silently not emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayFilter {
    /// Emit only samples inside the given trial.
    Trial(TrialId),
    /// Emit only samples whose trial reaches for the given target.
    Target(TargetId),
}

impl ReplayFilter {
    /// Build a filter from the control-surface pair of optional ids.
    ///
    /// Supplying both is a caller error — the two filters are mutually
    /// exclusive.
    pub fn from_parts(
        trial: Option<TrialId>,
        target: Option<TargetId>,
    ) -> Result<Option<Self>, ControlError> {
        match (trial, target) {
            (Some(_), Some(_)) => Err(ControlError::FilterConflict),
            (Some(t), None) => Ok(Some(Self::Trial(t))),
            (None, Some(t)) => Ok(Some(Self::Target(t))),
            (None, None) => Ok(None),
        }
    }

    /// Whether a sample with the given trial/target context passes.
    pub fn matches(&self, trial: Option<TrialId>, target: Option<TargetId>) -> bool {
        match self {
            Self::Trial(want) => trial == Some(*want),
            Self::Target(want) => target == Some(*want),
        }
    }
}

/// Point-in-time statistics snapshot of one replay clock.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayStats {
    /// Current recording index.
    pub cursor_index: u64,
    /// Total samples in the recording.
    pub total_samples: u64,
    /// Attempted tick count (monotonic; see the sequence policy).
    pub sequence: u64,
    /// Packets actually handed to the delivery channel.
    pub packets_emitted: u64,
    /// Ticks lost to fetch failure or delivery overrun.
    pub dropped_packets: u64,
    /// Reason of the most recent drop, if any.
    pub last_drop: Option<String>,
    /// Current run state.
    pub run_state: RunState,
    /// Mean wake-up error over the telemetry window, in milliseconds.
    pub timing_error_mean_ms: f64,
    /// Standard deviation of the wake-up error, in milliseconds.
    pub timing_error_std_ms: f64,
    /// Largest absolute wake-up error observed in the window, in
    /// milliseconds.
    pub timing_error_max_ms: f64,
}
