//! # rewind-core
//!
//! Shared vocabulary of the Rewind recording pipeline.
//!
//! This crate provides:
//! - [`dom::Dom`], the live document model the host keeps in sync with the page
//! - Host events ([`events::DomEvent`]) and raw change notifications
//! - Privacy levels and their inheritance over the composed tree
//! - The closed record and serialized-node sum types
//! - An explicit timer [`scheduler::Scheduler`] and [`scheduler::Throttle`]
//!
//! ## Privacy inheritance
//!
//! ```text
//! document (ALLOW)
//! └── form  [data-rw-privacy=mask]        -> MASK
//!     ├── input[type=text]                -> MASK       (inherits)
//!     └── div.rw-privacy-hidden           -> HIDDEN
//!         └── span[data-rw-privacy=allow] -> HIDDEN     (absorbed)
//! ```

pub mod dom;
pub mod error;
pub mod events;
pub mod privacy;
pub mod record;
pub mod scheduler;

pub use dom::{Dom, NodeKey, NodeKind, RawMutation, RuleKey, RuleParent, SheetKey};
pub use error::{DomError, Result};
pub use events::{DomEvent, EventId};
pub use privacy::{NodePrivacyLevel, PrivacyCache};
pub use record::{IncrementalData, NodeId, Record, SerializedNode, SerializedNodeKind, TimeStamp};
pub use scheduler::{Scheduler, Throttle, ThrottleOptions, TimerId};
