//! Replay engine: the per-session clock and the shared fetch pool.
//!
//! See [`ReplayClock`] for the tick-loop architecture and
//! [`FetchPool`] for the shared read path.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod fetch;
pub mod telemetry;

pub use clock::ReplayClock;
pub use config::{PoolConfig, ReplayConfig, ReplayConfigError};
pub use fetch::FetchPool;
pub use telemetry::ErrorWindow;
