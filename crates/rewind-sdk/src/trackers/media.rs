//! Media playback.

use super::recordable_target;
use rewind_core::dom::{Dom, NodeKey};
use rewind_core::privacy::NodePrivacyLevel;
use rewind_core::record::{MediaInteractionData, MediaInteractionType};
use rewind_snapshot::RecordingContext;

pub fn media_interaction(
    dom: &Dom,
    ctx: &RecordingContext,
    target: NodeKey,
    kind: MediaInteractionType,
    default_level: NodePrivacyLevel,
) -> Option<MediaInteractionData> {
    let (id, _) = recordable_target(dom, ctx, target, default_level)?;
    Some(MediaInteractionData { id, kind })
}
