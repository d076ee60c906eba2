//! Rewind SDK - privacy-aware session recording
//!
//! This SDK ties the Rewind crates together into a [`Recorder`]: it observes
//! a live [`Dom`](rewind_core::Dom), turns host events and tree changes into
//! replay records and hands finished segments to a [`Transport`].
//!
//! # Quick Start
//!
//! ```rust
//! use rewind_core::Dom;
//! use rewind_sdk::{MemoryTransport, PageExitReason, Recorder, RecorderConfig, SharedViewContext};
//! use rewind_segment::{SegmentContext, SyncEncoder};
//!
//! let mut dom = Dom::new("https://example.com/");
//! let body = dom.create_element("body");
//! dom.append_child(dom.document(), body).unwrap();
//!
//! let transport = MemoryTransport::new();
//! let view = SharedViewContext::with_context(SegmentContext {
//!     application_id: "app".into(),
//!     session_id: "session".into(),
//!     view_id: "home".into(),
//! });
//!
//! let mut recorder = Recorder::start(
//!     RecorderConfig::default(),
//!     &mut dom,
//!     0,
//!     SyncEncoder::new(),
//!     transport.clone(),
//!     view,
//! );
//!
//! // The host forwards events and calls `advance` as time passes.
//! recorder.advance(&mut dom, 100);
//! recorder.on_page_exit(&mut dom, PageExitReason::PageHide, 200);
//!
//! assert_eq!(transport.len(), 1);
//! ```
//!
//! # Architecture
//!
//! - [`recorder`] - Lifecycle, event routing and timer dispatch
//! - [`scope`] - Per-tree trackers and timer keys
//! - [`shadow`] - Shadow root scopes
//! - [`trackers`] - Event to record payload conversion
//! - [`transport`] - In-memory and channel transports, view context
//! - [`config`] - Recorder configuration
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod recorder;
pub mod scope;
pub mod shadow;
pub mod trackers;
pub mod transport;

// Re-exports for convenience
pub use config::{EnvironmentCapabilities, RecorderConfig, RecorderConfigBuilder};
pub use error::{RecorderError, Result};
pub use recorder::{check_environment, worker_encoder, Recorder, RecorderStatus};
pub use scope::{ScopeId, ScopeTrackers, TimerKey};
pub use shadow::ShadowRootController;
pub use transport::{ChannelTransport, Delivery, MemoryTransport, SentPayload, SharedViewContext};

// Re-export commonly used types from the pipeline crates
pub use rewind_core::{privacy::NodePrivacyLevel, DomEvent, EventId};
pub use rewind_segment::{
    FlushReason, PageExitReason, ReplayPayload, SegmentContext, Transport, ViewContextProvider, ViewReplayStats,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{RecorderConfig, RecorderConfigBuilder};
    pub use crate::error::RecorderError;
    pub use crate::recorder::{Recorder, RecorderStatus};
    pub use crate::transport::{MemoryTransport, SharedViewContext};
    pub use rewind_core::{Dom, DomEvent, NodePrivacyLevel};
    pub use rewind_segment::{PageExitReason, SegmentContext, SyncEncoder, Transport, ViewContextProvider};
}
