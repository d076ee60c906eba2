//! Per-recording state shared by every serialization pass.
//!
//! A [`RecordingContext`] is created once per recording and passed
//! explicitly to every entry point, so independent recordings never share
//! id counters. Both tables are keyed by [`NodeKey`] through
//! `SecondaryMap`: once the host discards a node, its entry can never be
//! looked up again.

use rewind_core::dom::NodeKey;
use rewind_core::record::{NodeId, ScrollPosition};
use slotmap::SecondaryMap;
use std::collections::HashSet;

/// Association between live nodes and their serialized ids.
#[derive(Clone, Debug)]
pub struct NodeIdTable {
    ids: SecondaryMap<NodeKey, NodeId>,
    next_id: NodeId,
}

impl NodeIdTable {
    pub fn new() -> Self {
        Self {
            ids: SecondaryMap::new(),
            next_id: 1,
        }
    }

    /// Id of a node that was serialized before.
    pub fn get(&self, node: NodeKey) -> Option<NodeId> {
        self.ids.get(node).copied()
    }

    /// Existing id of `node`, or the next counter value.
    pub fn get_or_assign(&mut self, node: NodeKey) -> NodeId {
        if let Some(id) = self.get(node) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(node, id);
        id
    }

    pub fn contains(&self, node: NodeKey) -> bool {
        self.ids.contains_key(node)
    }

    /// Number of ids handed out so far.
    pub fn assigned(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for NodeIdTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Last known scroll offsets of elements, restated by later full snapshots.
#[derive(Clone, Debug, Default)]
pub struct ScrollPositionTable {
    positions: SecondaryMap<NodeKey, ScrollPosition>,
}

impl ScrollPositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node: NodeKey, position: ScrollPosition) {
        self.positions.insert(node, position);
    }

    pub fn get(&self, node: NodeKey) -> Option<&ScrollPosition> {
        self.positions.get(node)
    }

    pub fn remove(&mut self, node: NodeKey) -> Option<ScrollPosition> {
        self.positions.remove(node)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// State owned by one recording.
#[derive(Clone, Debug, Default)]
pub struct RecordingContext {
    pub ids: NodeIdTable,
    pub scroll_positions: ScrollPositionTable,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Why a serialization pass runs. Decides how scroll offsets are handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerializationStatus {
    /// First snapshot of the recording: read live offsets.
    InitialFullSnapshot,
    /// Later snapshot: restate offsets from the table.
    SubsequentFullSnapshot,
    /// Nodes added by a mutation: no offsets.
    Mutation,
}

/// State of a single serialization pass.
#[derive(Clone, Debug)]
pub struct SerializationScope {
    pub status: SerializationStatus,
    /// Shadow roots met during the pass, in document order. The caller
    /// registers them with its shadow root controller.
    pub discovered_shadow_roots: Vec<NodeKey>,
    /// Ids serialized during the pass.
    pub serialized_ids: HashSet<NodeId>,
}

impl SerializationScope {
    pub fn new(status: SerializationStatus) -> Self {
        Self {
            status,
            discovered_shadow_roots: Vec::new(),
            serialized_ids: HashSet::new(),
        }
    }

    /// Whether `id` was already emitted by this pass.
    pub fn has_serialized(&self, id: NodeId) -> bool {
        self.serialized_ids.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::dom::Dom;

    #[test]
    fn test_ids_are_stable_and_monotonic() {
        let mut dom = Dom::new("https://example.com/");
        let a = dom.create_element("div");
        let b = dom.create_element("div");
        let mut table = NodeIdTable::new();

        let id_a = table.get_or_assign(a);
        let id_b = table.get_or_assign(b);

        assert_eq!(table.get_or_assign(a), id_a);
        assert!(id_b > id_a);
        assert_eq!(table.assigned(), 2);
    }

    #[test]
    fn test_discarded_nodes_are_forgotten() {
        let mut dom = Dom::new("https://example.com/");
        let a = dom.create_element("div");
        let mut table = NodeIdTable::new();
        let old_id = table.get_or_assign(a);

        dom.discard(a).unwrap();
        let reused = dom.create_element("span");

        assert!(!table.contains(reused));
        assert!(table.get_or_assign(reused) > old_id);
    }
}
