//! Turning a batch of raw notifications into one [`MutationData`].
//!
//! ```text
//! raw batch
//!   ├─ removed subtrees ─► shadow roots to unregister
//!   ├─ filter: target connected, target and ancestors known, not hidden
//!   ├─ child lists ─► adds (document order) / removes (moves cancel out)
//!   ├─ character data ─► texts (one per node)
//!   └─ attributes ─► attributes (one per node and name)
//! ```
//!
//! Nodes serialized by an add of the same batch are skipped by the text and
//! attribute passes: their state is already in the add.

use rewind_core::dom::{Dom, NodeKey, RawMutation};
use rewind_core::privacy::{effective_privacy_level, NodePrivacyLevel, PrivacyCache};
use rewind_core::record::{
    AddedNodeMutation, AttributeMutation, MutationData, NodeId, RemovedNodeMutation, TextMutation,
};
use rewind_snapshot::{
    element_input_value, serialize_attribute, serialize_node_with_id, serialize_text_content,
    RecordingContext, SerializationScope, SerializationStatus, SerializeOptions,
};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Result of processing one batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutationOutcome {
    /// The consolidated record payload, absent when nothing changed.
    pub data: Option<MutationData>,
    /// Shadow roots found in removed subtrees. Unregister before registering
    /// `added_shadow_roots`.
    pub removed_shadow_roots: Vec<NodeKey>,
    /// Shadow roots found while serializing added subtrees.
    pub added_shadow_roots: Vec<NodeKey>,
}

/// Process a batch of raw mutations observed on one root.
pub fn process_mutations(
    dom: &Dom,
    batch: Vec<RawMutation>,
    ctx: &mut RecordingContext,
    default_level: NodePrivacyLevel,
) -> MutationOutcome {
    trace!(mutations = batch.len(), "processing mutation batch");
    let mut outcome = MutationOutcome::default();

    for mutation in &batch {
        if let RawMutation::ChildList { removed, .. } = mutation {
            for node in removed {
                collect_shadow_roots(dom, *node, &mut outcome.removed_shadow_roots);
            }
        }
    }

    let mut cache = PrivacyCache::new();
    let filtered: Vec<RawMutation> = batch
        .into_iter()
        .filter(|m| {
            let target = m.target();
            dom.is_connected(target)
                && node_and_ancestors_are_known(dom, ctx, target)
                && effective_privacy_level(dom, target, default_level, Some(&mut cache))
                    != NodePrivacyLevel::Hidden
        })
        .collect();

    let mut scope = SerializationScope::new(SerializationStatus::Mutation);
    let (adds, removes) = process_child_list(dom, &filtered, ctx, &mut scope, default_level, &mut cache);
    let serialized_in_batch =
        |node: NodeKey, ctx: &RecordingContext| ctx.ids.get(node).is_some_and(|id| scope.has_serialized(id));

    let texts = process_character_data(dom, &filtered, ctx, default_level, &mut cache, &serialized_in_batch);
    let attributes = process_attributes(dom, &filtered, ctx, default_level, &mut cache, &serialized_in_batch);

    outcome.added_shadow_roots = std::mem::take(&mut scope.discovered_shadow_roots);
    let data = MutationData {
        adds,
        removes,
        texts,
        attributes,
    };
    if !data.is_empty() {
        outcome.data = Some(data);
    }
    outcome
}

/// Every shadow root hosted inside `node`'s subtree, nested ones included.
fn collect_shadow_roots(dom: &Dom, node: NodeKey, out: &mut Vec<NodeKey>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if let Some(root) = dom.shadow_root(current) {
            out.push(root);
            stack.push(root);
        }
        stack.extend(dom.children(current).iter().rev());
    }
}

fn node_and_ancestors_are_known(dom: &Dom, ctx: &RecordingContext, node: NodeKey) -> bool {
    let mut current = Some(node);
    while let Some(key) = current {
        if !ctx.ids.contains(key) && !dom.is_shadow_root(key) {
            return false;
        }
        current = dom.composed_parent(key);
    }
    true
}

/// Child indices from the root of `node`'s tree down to `node`.
fn document_position(dom: &Dom, node: NodeKey) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = node;
    while let Some(index) = dom.index_in_parent(current) {
        path.push(index);
        match dom.parent(current) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    path.reverse();
    path
}

fn process_child_list(
    dom: &Dom,
    mutations: &[RawMutation],
    ctx: &mut RecordingContext,
    scope: &mut SerializationScope,
    default_level: NodePrivacyLevel,
    cache: &mut PrivacyCache,
) -> (Vec<AddedNodeMutation>, Vec<RemovedNodeMutation>) {
    // Nodes still added at the end of the batch, and truly removed nodes with
    // the parent they were removed from.
    let mut added: Vec<NodeKey> = Vec::new();
    let mut added_set: HashSet<NodeKey> = HashSet::new();
    let mut removed: Vec<(NodeKey, NodeKey)> = Vec::new();
    for mutation in mutations {
        let RawMutation::ChildList {
            target,
            added: added_nodes,
            removed: removed_nodes,
        } = mutation
        else {
            continue;
        };
        for node in added_nodes {
            if added_set.insert(*node) {
                added.push(*node);
            }
        }
        for node in removed_nodes {
            if added_set.remove(node) {
                added.retain(|n| n != node);
            } else if !removed.iter().any(|(n, _)| n == node) {
                removed.push((*node, *target));
            }
        }
    }

    let mut sorted: Vec<(Vec<usize>, NodeKey)> = added
        .into_iter()
        .filter(|node| dom.is_connected(*node))
        .map(|node| (document_position(dom, node), node))
        .collect();
    sorted.sort();

    // Moved siblings further right are re-inserted later in this loop, so
    // they cannot anchor an insertion yet.
    let mut pending: HashSet<NodeKey> = sorted.iter().map(|(_, node)| *node).collect();
    let mut adds = Vec::new();
    for (_, node) in sorted {
        pending.remove(&node);
        if ctx.ids.get(node).is_some_and(|id| scope.has_serialized(id)) {
            continue;
        }
        let Some(parent) = dom.parent(node) else {
            continue;
        };
        let Some(parent_id) = ctx.ids.get(parent) else {
            continue;
        };
        let parent_level = effective_privacy_level(dom, parent, default_level, Some(&mut *cache));
        if parent_level.is_absorbing() {
            continue;
        }
        let Some(serialized) =
            serialize_node_with_id(dom, node, ctx, scope, SerializeOptions::new(parent_level))
        else {
            continue;
        };
        adds.push(AddedNodeMutation {
            parent_id,
            next_id: next_known_sibling(dom, ctx, node, &pending),
            node: serialized,
        });
    }

    // A removed node serialized again by an add was moved, not removed.
    let removes = removed
        .into_iter()
        .filter(|(node, _)| !ctx.ids.get(*node).is_some_and(|id| scope.has_serialized(id)))
        .filter_map(|(node, parent)| {
            Some(RemovedNodeMutation {
                parent_id: ctx.ids.get(parent)?,
                id: ctx.ids.get(node)?,
            })
        })
        .collect();

    (adds, removes)
}

fn next_known_sibling(
    dom: &Dom,
    ctx: &RecordingContext,
    node: NodeKey,
    pending: &HashSet<NodeKey>,
) -> Option<NodeId> {
    let mut sibling = dom.next_sibling(node);
    while let Some(current) = sibling {
        if !pending.contains(&current) {
            if let Some(id) = ctx.ids.get(current) {
                return Some(id);
            }
        }
        sibling = dom.next_sibling(current);
    }
    None
}

fn process_character_data(
    dom: &Dom,
    mutations: &[RawMutation],
    ctx: &RecordingContext,
    default_level: NodePrivacyLevel,
    cache: &mut PrivacyCache,
    serialized_in_batch: &impl Fn(NodeKey, &RecordingContext) -> bool,
) -> Vec<TextMutation> {
    let mut handled = HashSet::new();
    let mut texts = Vec::new();
    for mutation in mutations {
        let RawMutation::CharacterData { target, old_value } = mutation else {
            continue;
        };
        // The first notification of a node carries the value before the batch.
        if !handled.insert(*target) || serialized_in_batch(*target, ctx) {
            continue;
        }
        let Some(value) = dom.character_data(*target) else {
            continue;
        };
        if old_value.as_deref() == Some(value) {
            continue;
        }
        let Some(parent) = dom.composed_parent(*target) else {
            continue;
        };
        let parent_level = effective_privacy_level(dom, parent, default_level, Some(&mut *cache));
        if parent_level.is_absorbing() {
            continue;
        }
        let Some(id) = ctx.ids.get(*target) else {
            continue;
        };
        texts.push(TextMutation {
            id,
            value: serialize_text_content(dom, *target, parent_level),
        });
    }
    texts
}

fn process_attributes(
    dom: &Dom,
    mutations: &[RawMutation],
    ctx: &RecordingContext,
    default_level: NodePrivacyLevel,
    cache: &mut PrivacyCache,
    serialized_in_batch: &impl Fn(NodeKey, &RecordingContext) -> bool,
) -> Vec<AttributeMutation> {
    let mut handled: HashSet<(NodeKey, &str)> = HashSet::new();
    let mut by_node: HashMap<NodeKey, usize> = HashMap::new();
    let mut attributes: Vec<AttributeMutation> = Vec::new();

    for mutation in mutations {
        let RawMutation::Attributes {
            target,
            name,
            old_value,
        } = mutation
        else {
            continue;
        };
        if !handled.insert((*target, name.as_str())) || serialized_in_batch(*target, ctx) {
            continue;
        }
        let current = dom.attribute(*target, name);
        if current == old_value.as_deref() {
            continue;
        }
        let level = effective_privacy_level(dom, *target, default_level, Some(&mut *cache));
        let value = if name == "value" {
            match element_input_value(dom, *target, level) {
                Some(value) => Some(value),
                None => continue,
            }
        } else {
            serialize_attribute(dom, *target, level, name)
        };
        let Some(id) = ctx.ids.get(*target) else {
            continue;
        };

        let index = *by_node.entry(*target).or_insert_with(|| {
            attributes.push(AttributeMutation {
                id,
                attributes: Default::default(),
            });
            attributes.len() - 1
        });
        attributes[index].attributes.insert(name.clone(), value);
    }
    attributes
}
