//! Session layer: keyed registry of isolated replay clocks over one
//! shared source.
//!
//! See [`SessionRegistry`] for lifecycle, eviction, and sweep semantics.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
mod keys;
pub mod registry;

pub use config::{RegistryConfig, RegistryConfigError};
pub use registry::{RegistryStats, SessionInfo, SessionRegistry};
