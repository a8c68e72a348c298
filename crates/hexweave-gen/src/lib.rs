//! Map generation for hosts with custom tiles.
//!
//! [`GenerationService`] replaces a host's standard and compact map
//! generators with an async state machine per instance. Custom tiles from the
//! [`hexweave_registry::TileRegistry`] join the candidate pool, are placed
//! through the [`PlacementInterceptor`], and every placement waits on the
//! instance's [`InstanceSignals`] for network confirmation.

pub mod interceptor;
pub mod scheduler;
pub mod service;
pub mod shuffle;
pub mod signals;

#[cfg(test)]
mod test_support;

pub use interceptor::{Placement, PlacementInterceptor};
pub use scheduler::{
    GenerationError, GenerationReport, Layout, SlotPlacement, WaitPoint, compact_choice,
};
pub use service::{GenerationHandle, GenerationOutcome, GenerationService};
pub use shuffle::{derive_run_seed, run_rng, shuffle};
pub use signals::{InstanceSignals, SignalState, WaitError};
