//! Test utilities and mock sources for Spikecast development.
//!
//! Not published; dev-dependency of the engine and session crates.

mod sources;

pub use sources::{FlakySource, SlowSource, SyntheticSource, TrialSpan, UnreachableSource};
