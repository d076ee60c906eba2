//! Event trackers.
//!
//! Each tracker turns one family of host events into record payloads. They
//! share no state; the [`Recorder`](crate::Recorder) routes events to them
//! and timestamps what they return.
//!
//! | Tracker | Events | Throttle |
//! |---------|--------|----------|
//! | [`mouse`] | pointer moves, interactions | moves: leading, 50 ms |
//! | [`scroll`] | element and document scroll | leading + trailing, 100 ms |
//! | [`viewport`] | resize, visual viewport | trailing, 200 ms |
//! | [`input`] | form control changes | none, deduplicated |
//! | [`media`] | play / pause | none |
//! | [`stylesheet`] | CSSOM rule insert / delete | none |
//! | [`frustration`] | rage, dead and error clicks | none |
//! | [`focus`] | window focus | none |
//!
//! Element-targeted trackers drop events whose target has no id yet or is
//! hidden.

pub mod focus;
pub mod frustration;
pub mod input;
pub mod media;
pub mod mouse;
pub mod scroll;
pub mod stylesheet;
pub mod viewport;

use rewind_core::dom::{Dom, NodeKey};
use rewind_core::privacy::{effective_privacy_level, NodePrivacyLevel};
use rewind_core::record::NodeId;
use rewind_snapshot::RecordingContext;

/// Id and effective level of an event target that may be recorded.
pub fn recordable_target(
    dom: &Dom,
    ctx: &RecordingContext,
    target: NodeKey,
    default_level: NodePrivacyLevel,
) -> Option<(NodeId, NodePrivacyLevel)> {
    let id = ctx.ids.get(target)?;
    let level = effective_privacy_level(dom, target, default_level, None);
    (level != NodePrivacyLevel::Hidden).then_some((id, level))
}
