//! Configurable corruption transform for replay streams.
//!
//! Adds deterministic per-bin noise to outgoing spike counts. Useful for
//! robustness testing of decoders against non-stationary recordings.
//!
//! Respects the determinism contract: uses a seeded ChaCha8 RNG derived
//! from `seed XOR tick`, producing identical corruption sequences for
//! identical seeds.
//!
//! Two effects, independently switchable:
//! - **Gaussian noise**: `c += noise_std * N(0,1) * (c + 1)` (Box-Muller
//!   transform), scaled by firing rate so active channels jitter more.
//! - **Slow drift**: a two-frequency sinusoid of the elapsed stream time,
//!   scaled per channel by a fixed random gain so channels wander apart.
//!
//! Counts are clamped at zero and rounded back to integers, so the
//! corrupted stream stays a valid spike-count stream.
//!
//! Constructed via the builder pattern: [`NoiseTransform::builder`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::f64::consts::TAU;
use std::time::Duration;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use spikecast_core::SamplePacket;

/// A deterministic spike-count corruption transform.
///
/// Both effects read the *unmodified* count, so noise and drift compose
/// additively rather than compounding. The RNG is re-seeded from
/// `seed XOR tick` on every application, ensuring deterministic replay
/// with the same configuration regardless of call order.
#[derive(Clone, Debug)]
pub struct NoiseTransform {
    noise_std: f64,
    drift_amplitude: f64,
    drift_period: Duration,
    seed: u64,
    enable_noise: bool,
    enable_drift: bool,
    /// Per-channel drift gain jitter in `[-0.5, 0.5]`, fixed at build time.
    channel_offsets: Vec<f64>,
}

/// Builder for [`NoiseTransform`].
///
/// Required field: `channels`.
pub struct NoiseTransformBuilder {
    channels: Option<usize>,
    noise_std: f64,
    drift_amplitude: f64,
    drift_period: Duration,
    seed: u64,
    enable_noise: bool,
    enable_drift: bool,
}

impl NoiseTransform {
    /// Create a new builder for configuring a `NoiseTransform`.
    pub fn builder() -> NoiseTransformBuilder {
        NoiseTransformBuilder {
            channels: None,
            noise_std: 0.5,
            drift_amplitude: 0.2,
            drift_period: Duration::from_secs(60),
            seed: 0,
            enable_noise: true,
            enable_drift: true,
        }
    }

    /// Whether this transform leaves every count unchanged.
    pub fn is_identity(&self) -> bool {
        !self.enable_noise && !self.enable_drift
    }

    /// Generate a Gaussian sample using Box-Muller transform.
    /// Avoids the `rand_distr` dependency.
    fn box_muller(rng: &mut ChaCha8Rng) -> f64 {
        let u1: f64 = rng.random::<f64>().max(1e-300); // avoid ln(0)
        let u2: f64 = rng.random();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }

    /// Drift factor at `elapsed` seconds into the stream.
    ///
    /// Two superimposed sinusoids: the configured period plus a weak
    /// component ten times faster, so the drift is not trivially
    /// subtractable by a single-frequency filter.
    fn drift_phase(&self, elapsed: Duration) -> f64 {
        let t = elapsed.as_secs_f64();
        let slow = self.drift_period.as_secs_f64();
        let fast = slow / 10.0;
        (TAU * t / slow).sin() + 0.1 * (TAU * t / fast).sin()
    }

    /// Corrupt one bin of spike counts.
    ///
    /// `elapsed` is stream time since replay start (drives the drift
    /// phase); `tick` seeds the per-bin RNG. Channels beyond the
    /// configured count reuse offsets modulo the configured length.
    pub fn apply(&self, counts: &[u32], elapsed: Duration, tick: u64) -> Vec<u32> {
        if self.is_identity() {
            return counts.to_vec();
        }

        let phase = self.drift_phase(elapsed);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ tick);

        counts
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let base = f64::from(c);
                // Rate-proportional scale; +1 keeps silent channels alive.
                let reference = base + 1.0;
                let mut v = base;
                if self.enable_drift {
                    let gain = 1.0 + self.channel_offsets[i % self.channel_offsets.len()];
                    v += self.drift_amplitude * phase * reference * gain;
                }
                if self.enable_noise {
                    v += self.noise_std * Self::box_muller(&mut rng) * reference;
                }
                v.max(0.0).round() as u32
            })
            .collect()
    }

    /// Corrupt the spike counts of an outgoing packet in place.
    ///
    /// Kinematics, trial context, and timing metadata pass through
    /// untouched; only `spikes.counts` is rewritten. The packet's
    /// sequence number is used as the RNG tick.
    pub fn transform_packet(&self, packet: &mut SamplePacket, elapsed: Duration) {
        if self.is_identity() {
            return;
        }
        packet.spikes.counts = self.apply(&packet.spikes.counts, elapsed, packet.sequence);
    }
}

impl NoiseTransformBuilder {
    /// Set the number of recorded channels (determines the per-channel
    /// drift offset table).
    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Set the Gaussian noise standard deviation (default: 0.5).
    /// Must be finite and >= 0.
    pub fn noise_std(mut self, std: f64) -> Self {
        self.noise_std = std;
        self
    }

    /// Set the drift amplitude (default: 0.2). Must be finite and >= 0.
    pub fn drift_amplitude(mut self, amplitude: f64) -> Self {
        self.drift_amplitude = amplitude;
        self
    }

    /// Set the slow drift period (default: 60s). Must be non-zero.
    pub fn drift_period(mut self, period: Duration) -> Self {
        self.drift_period = period;
        self
    }

    /// Set the seed for deterministic RNG (default: 0).
    ///
    /// Also seeds the per-channel drift offset table.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable Gaussian noise (default: enabled).
    pub fn enable_noise(mut self, on: bool) -> Self {
        self.enable_noise = on;
        self
    }

    /// Enable or disable slow drift (default: enabled).
    pub fn enable_drift(mut self, on: bool) -> Self {
        self.enable_drift = on;
        self
    }

    /// Build the transform, validating all configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - `channels` is not set or is zero
    /// - `noise_std` or `drift_amplitude` is negative or NaN
    /// - `drift_period` is zero
    pub fn build(self) -> Result<NoiseTransform, String> {
        let channels = self.channels.ok_or_else(|| "channels is required".to_string())?;
        if channels == 0 {
            return Err("channels must be > 0".to_string());
        }

        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(format!(
                "noise_std must be finite and >= 0, got {}",
                self.noise_std
            ));
        }

        if !self.drift_amplitude.is_finite() || self.drift_amplitude < 0.0 {
            return Err(format!(
                "drift_amplitude must be finite and >= 0, got {}",
                self.drift_amplitude
            ));
        }

        if self.drift_period.is_zero() {
            return Err("drift_period must be non-zero".to_string());
        }

        // Fixed per-channel drift gains, drawn once from the base seed.
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let channel_offsets = (0..channels).map(|_| rng.random::<f64>() - 0.5).collect();

        Ok(NoiseTransform {
            noise_std: self.noise_std,
            drift_amplitude: self.drift_amplitude,
            drift_period: self.drift_period,
            seed: self.seed,
            enable_noise: self.enable_noise,
            enable_drift: self.enable_drift,
            channel_offsets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use spikecast_core::{Kinematics, SpikeCounts, TargetContext, TrialId};

    fn transform() -> NoiseTransform {
        NoiseTransform::builder()
            .channels(8)
            .seed(42)
            .build()
            .unwrap()
    }

    // ---------------------------------------------------------------
    // Builder tests
    // ---------------------------------------------------------------

    #[test]
    fn builder_rejects_missing_channels() {
        let result = NoiseTransform::builder().build();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("channels"));
    }

    #[test]
    fn builder_rejects_zero_channels() {
        assert!(NoiseTransform::builder().channels(0).build().is_err());
    }

    #[test]
    fn builder_rejects_negative_noise_std() {
        let result = NoiseTransform::builder().channels(4).noise_std(-1.0).build();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("noise_std"));
    }

    #[test]
    fn builder_rejects_nan_drift_amplitude() {
        let result = NoiseTransform::builder()
            .channels(4)
            .drift_amplitude(f64::NAN)
            .build();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("drift_amplitude"));
    }

    #[test]
    fn builder_rejects_zero_period() {
        let result = NoiseTransform::builder()
            .channels(4)
            .drift_period(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    // ---------------------------------------------------------------
    // Transform logic tests
    // ---------------------------------------------------------------

    #[test]
    fn disabled_transform_is_identity() {
        let t = NoiseTransform::builder()
            .channels(4)
            .enable_noise(false)
            .enable_drift(false)
            .build()
            .unwrap();
        assert!(t.is_identity());
        let counts = vec![0, 3, 17, 250];
        assert_eq!(t.apply(&counts, Duration::from_secs(30), 7), counts);
    }

    #[test]
    fn determinism_same_tick_same_output() {
        let t = transform();
        let counts = vec![5; 8];
        let a = t.apply(&counts, Duration::from_secs(10), 400);
        let b = t.apply(&counts, Duration::from_secs(10), 400);
        assert_eq!(a, b, "same tick + same seed -> identical output");
    }

    #[test]
    fn different_ticks_different_output() {
        let t = transform();
        let counts = vec![50; 8];
        let a = t.apply(&counts, Duration::from_secs(10), 1);
        let b = t.apply(&counts, Duration::from_secs(10), 2);
        assert_ne!(a, b, "different ticks should produce different noise");
    }

    #[test]
    fn different_seeds_different_output() {
        let a = NoiseTransform::builder().channels(8).seed(1).build().unwrap();
        let b = NoiseTransform::builder().channels(8).seed(2).build().unwrap();
        let counts = vec![50; 8];
        assert_ne!(
            a.apply(&counts, Duration::from_secs(5), 9),
            b.apply(&counts, Duration::from_secs(5), 9)
        );
    }

    #[test]
    fn drift_varies_per_channel() {
        // Pure drift at a phase peak: distinct channel gains must show.
        let t = NoiseTransform::builder()
            .channels(8)
            .enable_noise(false)
            .drift_amplitude(2.0)
            .drift_period(Duration::from_secs(60))
            .seed(3)
            .build()
            .unwrap();
        // Quarter period puts the slow sinusoid at its maximum.
        let out = t.apply(&[100; 8], Duration::from_secs(15), 0);
        let distinct: std::collections::HashSet<u32> = out.iter().copied().collect();
        assert!(
            distinct.len() > 1,
            "per-channel gains should separate equal inputs, got {out:?}"
        );
    }

    #[test]
    fn noise_changes_values() {
        let t = NoiseTransform::builder()
            .channels(8)
            .enable_drift(false)
            .noise_std(1.0)
            .seed(0)
            .build()
            .unwrap();
        let counts = vec![100; 8];
        let out = t.apply(&counts, Duration::ZERO, 1);
        assert_ne!(out, counts, "Gaussian noise should perturb the counts");
    }

    #[test]
    fn packet_transform_touches_only_spikes() {
        let t = transform();
        let mut packet = SamplePacket {
            sequence: 12,
            cursor_index: 12,
            source_timestamp_s: 0.3,
            spikes: SpikeCounts::from_counts(vec![40; 8], 25.0),
            kinematics: Kinematics {
                x: 1.0,
                y: 2.0,
                vx: 3.0,
                vy: 4.0,
            },
            intention: TargetContext::default(),
            trial_id: Some(TrialId(2)),
            trial_time_ms: Some(75.0),
        };
        let before = packet.clone();
        t.transform_packet(&mut packet, Duration::from_millis(300));
        assert_eq!(packet.kinematics, before.kinematics);
        assert_eq!(packet.trial_id, before.trial_id);
        assert_eq!(packet.trial_time_ms, before.trial_time_ms);
        assert_eq!(packet.source_timestamp_s, before.source_timestamp_s);
        assert_eq!(packet.spikes.bin_size_ms, before.spikes.bin_size_ms);
        assert_eq!(packet.spikes.counts.len(), before.spikes.counts.len());
    }

    proptest! {
        #[test]
        fn corrupted_counts_never_go_negative(
            counts in proptest::collection::vec(0u32..500, 1..64),
            tick in 0u64..100_000,
            elapsed_ms in 0u64..600_000,
            std in 0.0f64..5.0,
            amp in 0.0f64..5.0,
        ) {
            let t = NoiseTransform::builder()
                .channels(16)
                .noise_std(std)
                .drift_amplitude(amp)
                .seed(7)
                .build()
                .unwrap();
            let out = t.apply(&counts, Duration::from_millis(elapsed_ms), tick);
            prop_assert_eq!(out.len(), counts.len());
            // u32 output is non-negative by type; the clamp is exercised
            // by extreme negative noise draws not panicking on cast.
        }
    }
}
