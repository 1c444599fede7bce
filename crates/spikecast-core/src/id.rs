//! Strongly-typed identifiers for trials and reach targets.

use std::fmt;

/// Identifies a trial within the recorded dataset.
///
/// Trials are contiguous spans of samples; `TrialId(n)` corresponds to
/// the n-th trial in the recording's trial table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrialId(pub u32);

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TrialId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a reach target within the recording's target layout.
///
/// Each trial reaches for exactly one active target; the id indexes the
/// trial's target position table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TargetId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
