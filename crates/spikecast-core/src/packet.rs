//! The sample/packet data model.
//!
//! A [`Sample`] is one time bin of the recording as stored by a
//! [`SampleSource`](crate::source::SampleSource); a [`SamplePacket`] is
//! one emitted replay tick, stamped with sequencing and timing metadata.
//! Packets are immutable once produced — the replay clock hands ownership
//! to the delivery layer and retains no reference.

use crate::id::{TargetId, TrialId};

/// Binned spike counts for the full channel array of one time bin.
#[derive(Clone, Debug, PartialEq)]
pub struct SpikeCounts {
    /// Channel identifiers, parallel to `counts`.
    pub channel_ids: Vec<u32>,
    /// Spike count per channel for this bin.
    pub counts: Vec<u32>,
    /// Bin width in milliseconds.
    pub bin_size_ms: f64,
}

impl SpikeCounts {
    /// Build counts with sequential channel ids `0..counts.len()`.
    pub fn from_counts(counts: Vec<u32>, bin_size_ms: f64) -> Self {
        let channel_ids = (0..counts.len() as u32).collect();
        Self {
            channel_ids,
            counts,
            bin_size_ms,
        }
    }

    /// Number of channels in this bin.
    pub fn num_channels(&self) -> usize {
        self.counts.len()
    }
}

/// Cursor kinematics ground truth for one time bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematics {
    /// X position.
    pub x: f64,
    /// Y position.
    pub y: f64,
    /// X-axis velocity.
    pub vx: f64,
    /// Y-axis velocity.
    pub vy: f64,
}

/// Reach-target intention ground truth for one time bin.
///
/// All fields are `None` outside of a trial.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TargetContext {
    /// Active target of the enclosing trial, if any.
    pub target_id: Option<TargetId>,
    /// Target X position.
    pub target_x: Option<f64>,
    /// Target Y position.
    pub target_y: Option<f64>,
}

/// One time-aligned bin of the recording: spikes, kinematics, and
/// trial/target context.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Binned spike counts.
    pub spikes: SpikeCounts,
    /// Cursor kinematics.
    pub kinematics: Kinematics,
    /// Target intention context.
    pub target: TargetContext,
    /// Enclosing trial, if the bin falls inside one.
    pub trial_id: Option<TrialId>,
    /// Milliseconds since trial start, if inside a trial.
    pub trial_time_ms: Option<f64>,
}

/// A contiguous run of samples returned by one source query.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBundle {
    /// Index of `samples[0]` in the full recording.
    pub start_index: u64,
    /// The samples, in recording order.
    pub samples: Vec<Sample>,
}

impl SampleBundle {
    /// Number of samples in the bundle.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the bundle holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One emitted replay tick.
///
/// `sequence` counts attempted ticks of the owning clock; `cursor_index`
/// is the position of the underlying sample in the recording. The two are
/// independent: seeks move the cursor without touching the sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplePacket {
    /// Monotonic tick counter of the emitting clock.
    pub sequence: u64,
    /// Recording index of the underlying sample.
    pub cursor_index: u64,
    /// Timestamp of the sample within the recording, in seconds
    /// (`cursor_index * sample_interval`).
    pub source_timestamp_s: f64,
    /// Binned spike counts.
    pub spikes: SpikeCounts,
    /// Cursor kinematics.
    pub kinematics: Kinematics,
    /// Target intention context.
    pub intention: TargetContext,
    /// Enclosing trial, if any.
    pub trial_id: Option<TrialId>,
    /// Milliseconds since trial start, if inside a trial.
    pub trial_time_ms: Option<f64>,
}

impl SamplePacket {
    /// Assemble a packet from a sample plus clock-side metadata.
    pub fn from_sample(sequence: u64, cursor_index: u64, interval_s: f64, sample: Sample) -> Self {
        Self {
            sequence,
            cursor_index,
            source_timestamp_s: cursor_index as f64 * interval_s,
            spikes: sample.spikes,
            kinematics: sample.kinematics,
            intention: sample.target,
            trial_id: sample.trial_id,
            trial_time_ms: sample.trial_time_ms,
        }
    }
}

/// Static facts about a replay stream, reported once per session.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamMetadata {
    /// Total number of samples in the recording.
    pub total_samples: u64,
    /// Fixed interval between samples, in milliseconds.
    pub interval_ms: f64,
    /// Replay rate implied by the interval, in Hz.
    pub frequency_hz: f64,
    /// Number of channels per sample.
    pub num_channels: usize,
    /// Total recording duration in seconds.
    pub duration_s: f64,
}
