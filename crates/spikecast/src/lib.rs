//! Spikecast: session-isolated timed replay of recorded neural data.
//!
//! Streams a fixed pre-recorded time series of binned spike counts,
//! cursor kinematics, and trial context to many concurrent consumers at
//! the recording's native cadence. Each session owns an independent
//! replay cursor with pause/resume/seek/filter control; all sessions
//! share one read-only sample source behind a bounded fetch pool.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all Spikecast sub-crates. For most users, adding `spikecast` as
//! a single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use spikecast::prelude::*;
//!
//! // A tiny in-memory recording: 40 samples of 2 channels at 25 ms.
//! struct MiniSource;
//!
//! impl SampleSource for MiniSource {
//!     fn total_samples(&self) -> Result<u64, SourceError> {
//!         Ok(40)
//!     }
//!     fn sample_interval(&self) -> Result<Duration, SourceError> {
//!         Ok(Duration::from_millis(25))
//!     }
//!     fn query(&self, start: u64, end: u64) -> Result<SampleBundle, SourceError> {
//!         let samples = (start..end.min(40))
//!             .map(|i| Sample {
//!                 spikes: SpikeCounts::from_counts(vec![i as u32 % 5, 1], 25.0),
//!                 kinematics: Kinematics { x: 0.0, y: 0.0, vx: 0.0, vy: 0.0 },
//!                 target: TargetContext::default(),
//!                 trial_id: None,
//!                 trial_time_ms: None,
//!             })
//!             .collect();
//!         Ok(SampleBundle { start_index: start, samples })
//!     }
//!     fn query_by_trial(&self, trial: TrialId) -> Result<SampleBundle, SourceError> {
//!         Err(SourceError::UnknownTrial { trial })
//!     }
//! }
//!
//! let registry =
//!     SessionRegistry::new(Arc::new(MiniSource), RegistryConfig::default()).unwrap();
//! let key = registry.create(None).unwrap();
//! let packets = registry.attach(&key).unwrap();
//! registry.start(&key).unwrap();
//!
//! let first = packets.recv_timeout(Duration::from_secs(5)).unwrap();
//! assert_eq!(first.cursor_index, 0);
//! assert_eq!(first.spikes.counts.len(), 2);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `spikecast-core` | Packet data model, IDs, the `SampleSource` trait, errors |
//! | [`engine`] | `spikecast-engine` | `ReplayClock`, `FetchPool`, configs, timing telemetry |
//! | [`noise`] | `spikecast-noise` | Deterministic spike-count corruption transform |
//! | [`session`] | `spikecast-session` | `SessionRegistry` with LRU eviction and TTL sweep |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Packet data model, IDs, the source trait, and errors (`spikecast-core`).
pub use spikecast_core as types;

/// Replay clock, fetch pool, and configuration (`spikecast-engine`).
///
/// [`engine::ReplayClock`] is the per-session tick thread;
/// [`engine::FetchPool`] is the shared read path.
pub use spikecast_engine as engine;

/// Deterministic spike-count corruption (`spikecast-noise`).
///
/// Build a [`noise::NoiseTransform`] and hand it to the registry config
/// to stress-test decoders against drifting, noisy recordings.
pub use spikecast_noise as noise;

/// Session registry and lifecycle management (`spikecast-session`).
pub use spikecast_session as session;

/// Common imports for typical Spikecast usage.
///
/// ```rust
/// use spikecast::prelude::*;
/// ```
pub mod prelude {
    // Data model
    pub use spikecast_core::{
        Kinematics, Sample, SampleBundle, SamplePacket, SpikeCounts, StreamMetadata,
        TargetContext, TargetId, TrialId,
    };

    // Source contract and control types
    pub use spikecast_core::{ReplayFilter, ReplayStats, RunState, SampleSource};

    // Errors
    pub use spikecast_core::{ControlError, InitError, RegistryError, SourceError};

    // Engine
    pub use spikecast_engine::{FetchPool, PoolConfig, ReplayClock, ReplayConfig};

    // Noise
    pub use spikecast_noise::NoiseTransform;

    // Session layer
    pub use spikecast_session::{RegistryConfig, RegistryStats, SessionInfo, SessionRegistry};
}
