//! Host events delivered to the recorder.
//!
//! The host translates environment events (pointer, scroll, input, ...) into
//! [`DomEvent`] values and hands them over together with the current time.
//! Targets are arena keys of the [`Dom`](crate::dom::Dom) the event refers to.

use crate::dom::{NodeKey, RuleKey, RuleParent};
use crate::record::{MediaInteractionType, MouseInteractionType};

/// Host-assigned identifier of an environment event. Frustration signals
/// reference the events they were derived from through it.
pub type EventId = u64;

#[derive(Clone, Debug, PartialEq)]
pub enum DomEvent {
    /// `mousemove` or `touchmove`. Coordinates are relative to the visual
    /// viewport.
    PointerMove {
        target: NodeKey,
        client_x: f64,
        client_y: f64,
        is_touch: bool,
    },
    MouseInteraction {
        event_id: EventId,
        kind: MouseInteractionType,
        target: NodeKey,
        client_x: f64,
        client_y: f64,
    },
    /// An element, or the document itself, scrolled.
    Scroll { target: NodeKey },
    /// The layout viewport changed size.
    Resize,
    /// The visual viewport was zoomed, scrolled or resized.
    VisualViewportResize,
    /// `input` or `change` on a form control.
    Input { target: NodeKey },
    Media {
        target: NodeKey,
        kind: MediaInteractionType,
    },
    /// A rule was inserted at `index` under `parent`.
    StyleSheetRuleInserted {
        parent: RuleParent,
        index: usize,
        rule: RuleKey,
    },
    /// The rule at `index` under `parent` was deleted.
    StyleSheetRuleDeleted { parent: RuleParent, index: usize },
    /// The window gained or lost focus.
    FocusChange { has_focus: bool },
}

impl DomEvent {
    /// Node the event is dispatched on, if any.
    pub fn target(&self) -> Option<NodeKey> {
        match self {
            DomEvent::PointerMove { target, .. }
            | DomEvent::MouseInteraction { target, .. }
            | DomEvent::Scroll { target }
            | DomEvent::Input { target }
            | DomEvent::Media { target, .. } => Some(*target),
            _ => None,
        }
    }
}
