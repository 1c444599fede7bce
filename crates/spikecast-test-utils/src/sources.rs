//! Reusable [`SampleSource`] test fixtures.
//!
//! Four standard sources for engine and registry testing:
//!
//! - [`SyntheticSource`] — deterministic in-memory recording with
//!   optional trial spans.
//! - [`FlakySource`] — wraps another source and fails every Nth query.
//! - [`SlowSource`] — wraps another source and adds fixed latency.
//! - [`UnreachableSource`] — fails every call (for init-failure paths).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use spikecast_core::{
    Kinematics, Sample, SampleBundle, SampleSource, SourceError, SpikeCounts, TargetContext,
    TargetId, TrialId,
};

/// One contiguous trial span within a [`SyntheticSource`].
#[derive(Clone, Copy, Debug)]
pub struct TrialSpan {
    /// Trial identifier.
    pub trial: TrialId,
    /// Active target of the trial.
    pub target: TargetId,
    /// First sample index of the trial (inclusive).
    pub start: u64,
    /// One past the last sample index.
    pub end: u64,
}

/// Deterministic in-memory recording.
///
/// Sample contents are a pure function of the index, so tests can assert
/// exact values: channel `c` of sample `i` holds `(i * 31 + c * 7) % 9`
/// spikes, and kinematics trace a slow circle.
pub struct SyntheticSource {
    total: u64,
    channels: usize,
    interval: Duration,
    trials: Vec<TrialSpan>,
}

impl SyntheticSource {
    /// A recording with no trial structure.
    pub fn new(total: u64, channels: usize, interval: Duration) -> Self {
        Self {
            total,
            channels,
            interval,
            trials: Vec::new(),
        }
    }

    /// Attach explicit trial spans.
    pub fn with_trials(mut self, trials: Vec<TrialSpan>) -> Self {
        self.trials = trials;
        self
    }

    /// Tile the recording with back-to-back trials of `span_len` samples.
    ///
    /// Trial `n` covers `[n * span_len, (n + 1) * span_len)` and reaches
    /// for target `n % 4`.
    pub fn with_tiled_trials(mut self, span_len: u64) -> Self {
        let mut trials = Vec::new();
        let mut start = 0;
        let mut n = 0u32;
        while start < self.total {
            trials.push(TrialSpan {
                trial: TrialId(n),
                target: TargetId(n % 4),
                start,
                end: (start + span_len).min(self.total),
            });
            start += span_len;
            n += 1;
        }
        self.trials = trials;
        self
    }

    /// The expected spike count for channel `c` of sample `i`.
    pub fn expected_count(index: u64, channel: usize) -> u32 {
        ((index * 31 + channel as u64 * 7) % 9) as u32
    }

    fn span_at(&self, index: u64) -> Option<&TrialSpan> {
        self.trials
            .iter()
            .find(|s| s.start <= index && index < s.end)
    }

    fn sample_at(&self, index: u64) -> Sample {
        let counts: Vec<u32> = (0..self.channels)
            .map(|c| Self::expected_count(index, c))
            .collect();
        let t = index as f64 * self.interval.as_secs_f64();
        let span = self.span_at(index);
        Sample {
            spikes: SpikeCounts::from_counts(counts, self.interval.as_secs_f64() * 1000.0),
            kinematics: Kinematics {
                x: (t * 0.5).cos() * 10.0,
                y: (t * 0.5).sin() * 10.0,
                vx: -(t * 0.5).sin() * 5.0,
                vy: (t * 0.5).cos() * 5.0,
            },
            target: span
                .map(|s| TargetContext {
                    target_id: Some(s.target),
                    target_x: Some(f64::from(s.target.0) * 5.0),
                    target_y: Some(f64::from(s.target.0) * -5.0),
                })
                .unwrap_or_default(),
            trial_id: span.map(|s| s.trial),
            trial_time_ms: span
                .map(|s| (index - s.start) as f64 * self.interval.as_secs_f64() * 1000.0),
        }
    }
}

impl SampleSource for SyntheticSource {
    fn total_samples(&self) -> Result<u64, SourceError> {
        Ok(self.total)
    }

    fn sample_interval(&self) -> Result<Duration, SourceError> {
        Ok(self.interval)
    }

    fn query(&self, start: u64, end: u64) -> Result<SampleBundle, SourceError> {
        if start >= end || end > self.total {
            return Err(SourceError::OutOfRange {
                index: start,
                total: self.total,
            });
        }
        Ok(SampleBundle {
            start_index: start,
            samples: (start..end).map(|i| self.sample_at(i)).collect(),
        })
    }

    fn query_by_trial(&self, trial: TrialId) -> Result<SampleBundle, SourceError> {
        let span = self
            .trials
            .iter()
            .find(|s| s.trial == trial)
            .ok_or(SourceError::UnknownTrial { trial })?;
        self.query(span.start, span.end)
    }
}

/// Wraps a source and fails every Nth `query` with `Unavailable`.
///
/// Metadata calls (`total_samples`, `sample_interval`) always succeed so
/// construction works; only the tick path is disturbed.
pub struct FlakySource {
    inner: Arc<dyn SampleSource>,
    fail_every: u64,
    calls: AtomicU64,
}

impl FlakySource {
    /// Fail the `fail_every`-th, `2*fail_every`-th, ... query call.
    pub fn new(inner: Arc<dyn SampleSource>, fail_every: u64) -> Self {
        assert!(fail_every > 0, "fail_every must be positive");
        Self {
            inner,
            fail_every,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of `query` calls observed so far.
    pub fn query_calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl SampleSource for FlakySource {
    fn total_samples(&self) -> Result<u64, SourceError> {
        self.inner.total_samples()
    }

    fn sample_interval(&self) -> Result<Duration, SourceError> {
        self.inner.sample_interval()
    }

    fn query(&self, start: u64, end: u64) -> Result<SampleBundle, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.fail_every == 0 {
            return Err(SourceError::Unavailable {
                reason: format!("injected failure on call {n}"),
            });
        }
        self.inner.query(start, end)
    }

    fn query_by_trial(&self, trial: TrialId) -> Result<SampleBundle, SourceError> {
        self.inner.query_by_trial(trial)
    }
}

/// Wraps a source and sleeps for a fixed delay before every query.
pub struct SlowSource {
    inner: Arc<dyn SampleSource>,
    delay: Duration,
}

impl SlowSource {
    /// Add `delay` of latency to each `query`.
    pub fn new(inner: Arc<dyn SampleSource>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl SampleSource for SlowSource {
    fn total_samples(&self) -> Result<u64, SourceError> {
        self.inner.total_samples()
    }

    fn sample_interval(&self) -> Result<Duration, SourceError> {
        self.inner.sample_interval()
    }

    fn query(&self, start: u64, end: u64) -> Result<SampleBundle, SourceError> {
        std::thread::sleep(self.delay);
        self.inner.query(start, end)
    }

    fn query_by_trial(&self, trial: TrialId) -> Result<SampleBundle, SourceError> {
        std::thread::sleep(self.delay);
        self.inner.query_by_trial(trial)
    }
}

/// Fails every call, including metadata probes.
///
/// Exercises the fatal construction path.
pub struct UnreachableSource;

impl UnreachableSource {
    fn err() -> SourceError {
        SourceError::Unavailable {
            reason: "backing file missing".into(),
        }
    }
}

impl SampleSource for UnreachableSource {
    fn total_samples(&self) -> Result<u64, SourceError> {
        Err(Self::err())
    }

    fn sample_interval(&self) -> Result<Duration, SourceError> {
        Err(Self::err())
    }

    fn query(&self, _start: u64, _end: u64) -> Result<SampleBundle, SourceError> {
        Err(Self::err())
    }

    fn query_by_trial(&self, _trial: TrialId) -> Result<SampleBundle, SourceError> {
        Err(Self::err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_contents_are_deterministic() {
        let src = SyntheticSource::new(100, 4, Duration::from_millis(25));
        let a = src.query(10, 12).unwrap();
        let b = src.query(10, 12).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.samples[0].spikes.counts[2], SyntheticSource::expected_count(10, 2));
    }

    #[test]
    fn synthetic_rejects_out_of_range() {
        let src = SyntheticSource::new(10, 2, Duration::from_millis(25));
        assert!(matches!(
            src.query(10, 11),
            Err(SourceError::OutOfRange { .. })
        ));
        assert!(matches!(
            src.query(5, 5),
            Err(SourceError::OutOfRange { .. })
        ));
    }

    #[test]
    fn tiled_trials_cover_the_recording() {
        let src = SyntheticSource::new(100, 2, Duration::from_millis(25)).with_tiled_trials(30);
        let b = src.query_by_trial(TrialId(1)).unwrap();
        assert_eq!(b.start_index, 30);
        assert_eq!(b.len(), 30);
        // Last trial is truncated at the end of the recording.
        let b = src.query_by_trial(TrialId(3)).unwrap();
        assert_eq!(b.start_index, 90);
        assert_eq!(b.len(), 10);
        assert!(matches!(
            src.query_by_trial(TrialId(4)),
            Err(SourceError::UnknownTrial { .. })
        ));
    }

    #[test]
    fn trial_context_present_inside_spans_only() {
        let src = SyntheticSource::new(20, 2, Duration::from_millis(25)).with_trials(vec![
            TrialSpan {
                trial: TrialId(0),
                target: TargetId(2),
                start: 5,
                end: 10,
            },
        ]);
        let outside = src.query(0, 1).unwrap();
        assert_eq!(outside.samples[0].trial_id, None);
        let inside = src.query(7, 8).unwrap();
        assert_eq!(inside.samples[0].trial_id, Some(TrialId(0)));
        assert_eq!(inside.samples[0].target.target_id, Some(TargetId(2)));
        assert_eq!(inside.samples[0].trial_time_ms, Some(50.0));
    }

    #[test]
    fn flaky_fails_on_schedule() {
        let inner = Arc::new(SyntheticSource::new(100, 2, Duration::from_millis(25)));
        let flaky = FlakySource::new(inner, 3);
        assert!(flaky.query(0, 1).is_ok());
        assert!(flaky.query(1, 2).is_ok());
        assert!(flaky.query(2, 3).is_err());
        assert!(flaky.query(3, 4).is_ok());
        assert_eq!(flaky.query_calls(), 4);
    }

    #[test]
    fn unreachable_fails_metadata() {
        assert!(UnreachableSource.total_samples().is_err());
        assert!(UnreachableSource.sample_interval().is_err());
    }
}
