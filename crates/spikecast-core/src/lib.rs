//! Core types and traits for the Spikecast replay framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Spikecast workspace:
//! typed identifiers, the sample/packet data model, the [`SampleSource`]
//! contract, run-state types, and error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod packet;
pub mod source;
pub mod state;

pub use error::{ControlError, InitError, RegistryError, SourceError};
pub use id::{TargetId, TrialId};
pub use packet::{
    Kinematics, Sample, SampleBundle, SamplePacket, SpikeCounts, StreamMetadata, TargetContext,
};
pub use source::SampleSource;
pub use state::{ReplayFilter, ReplayStats, RunState};
