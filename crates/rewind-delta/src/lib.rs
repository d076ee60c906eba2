//! # rewind-delta
//!
//! Incremental mutation records.
//!
//! This crate implements:
//! - [`MutationBuffer`]: raw notification accumulator with coalescing and
//!   hard-cap timers
//! - [`process_mutations`]: consolidation of a batch into one
//!   [`MutationData`](rewind_core::record::MutationData)
//!
//! ## Batch lifecycle
//!
//! ```text
//! Dom change ──► RawMutation ──► MutationBuffer::add_mutations
//!                                      │ timer fires / flush
//!                                      ▼
//!                          take_batch ──► process_mutations ──► MutationOutcome
//! ```
//!
//! A batch only refers to ids that were assigned before or during its own
//! processing, so later batches never invalidate earlier records.

pub mod buffer;
pub mod mutations;

pub use buffer::{BatchConfig, BatchTimer, MutationBuffer};
pub use mutations::{process_mutations, MutationOutcome};
