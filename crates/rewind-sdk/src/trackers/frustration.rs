//! Frustration signals and the record ids they reference.

use rewind_core::events::EventId;
use rewind_core::record::{FrustrationData, FrustrationType, RecordId};
use std::collections::HashMap;

/// Record ids handed out per host event. The same event always maps to the
/// same id, so a frustration signal can point at the interaction records
/// produced for its events.
#[derive(Debug, Default)]
pub struct RecordIds {
    ids: HashMap<EventId, RecordId>,
    next_id: RecordId,
}

impl RecordIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_for_event(&mut self, event: EventId) -> RecordId {
        *self.ids.entry(event).or_insert_with(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Frustration payload, or `None` when there is nothing to report.
pub fn frustration_data(
    types: &[FrustrationType],
    events: &[EventId],
    record_ids: &mut RecordIds,
) -> Option<FrustrationData> {
    if types.is_empty() || events.is_empty() {
        return None;
    }
    Some(FrustrationData {
        frustration_types: types.to_vec(),
        record_ids: events.iter().map(|e| record_ids.id_for_event(*e)).collect(),
    })
}
