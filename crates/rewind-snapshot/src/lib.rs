//! # rewind-snapshot
//!
//! Node identity and privacy-aware serialization.
//!
//! This crate provides:
//! - [`RecordingContext`]: node id and scroll position tables of a recording
//! - [`serialize_document`] / [`serialize_node_with_id`]: the snapshot serializer
//! - Attribute redaction and form value extraction
//! - Stylesheet inlining with absolute `url()` references
//!
//! ## Example
//!
//! ```rust
//! use rewind_core::dom::Dom;
//! use rewind_core::privacy::NodePrivacyLevel;
//! use rewind_snapshot::{serialize_document, RecordingContext, SerializationScope, SerializationStatus};
//!
//! let mut dom = Dom::new("https://example.com/");
//! let body = dom.create_element("body");
//! dom.append_child(dom.document(), body).unwrap();
//!
//! let mut ctx = RecordingContext::new();
//! let mut scope = SerializationScope::new(SerializationStatus::InitialFullSnapshot);
//! let tree = serialize_document(&dom, &mut ctx, &mut scope, NodePrivacyLevel::Allow).unwrap();
//!
//! assert_eq!(tree.child_nodes().len(), 1);
//! assert!(ctx.ids.contains(body));
//! ```

pub mod attributes;
pub mod context;
pub mod css;
pub mod serialize;

pub use attributes::{element_input_value, serialize_attribute, STABLE_ATTRIBUTES};
pub use context::{
    NodeIdTable, RecordingContext, ScrollPositionTable, SerializationScope, SerializationStatus,
};
pub use css::switch_to_absolute_url;
pub use serialize::{
    serialize_document, serialize_node_with_id, serialize_text_content, SerializeOptions,
};
