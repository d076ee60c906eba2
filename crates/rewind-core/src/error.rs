//! Error types for document model operations.

use thiserror::Error;

/// Errors returned by [`crate::dom::Dom`] when the host asks for an
/// operation the tree cannot perform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("Node not found")]
    NodeNotFound,

    #[error("Node is not an element")]
    NotAnElement,

    #[error("Node cannot hold character data")]
    NotCharacterData,

    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(String),

    #[error("Reference node is not a child of the parent")]
    NotAChild,

    #[error("Element already hosts a shadow root")]
    ShadowRootExists,

    #[error("Stylesheet not found")]
    SheetNotFound,

    #[error("CSS rule not found")]
    RuleNotFound,

    #[error("CSS rule is not a grouping rule")]
    NotAGroupingRule,

    #[error("Invalid index: {index} (length: {length})")]
    IndexOutOfBounds { index: usize, length: usize },
}

pub type Result<T> = std::result::Result<T, DomError>;
