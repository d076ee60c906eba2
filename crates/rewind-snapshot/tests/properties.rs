//! Property-based tests for the snapshot serializer.
//!
//!  - Identity stability: serializing twice yields the same ids
//!  - Hidden elements never contribute descendants
//!  - Ignored subtrees never receive ids

use proptest::prelude::*;
use rewind_core::dom::{Dom, NodeKey};
use rewind_core::privacy::{NodePrivacyLevel, PRIVACY_ATTR_NAME};
use rewind_core::record::{SerializedNode, SerializedNodeKind};
use rewind_snapshot::{serialize_document, RecordingContext, SerializationScope, SerializationStatus};
use std::collections::HashSet;

#[derive(Clone, Debug)]
enum Shape {
    Element { tag: &'static str, marker: Option<&'static str> },
    Text(String),
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    prop_oneof![
        4 => (
            prop::sample::select(vec!["div", "span", "p", "script", "input", "section"]),
            prop::sample::select(vec![None, Some("allow"), Some("mask"), Some("hidden")]),
        )
            .prop_map(|(tag, marker)| Shape::Element { tag, marker }),
        1 => "[a-z ]{0,8}".prop_map(Shape::Text),
    ]
}

fn tree_strategy() -> impl Strategy<Value = Vec<(usize, Shape)>> {
    prop::collection::vec((0usize..1000, shape_strategy()), 1..50)
}

/// Build a page; text nodes only ever become leaves.
fn build(shape: &[(usize, Shape)]) -> (Dom, Vec<NodeKey>) {
    let mut dom = Dom::new("https://example.com/");
    let body = dom.create_element("body");
    dom.append_child(dom.document(), body).unwrap();
    let mut containers = vec![body];
    let mut all = vec![body];
    for (parent_choice, node) in shape {
        let parent = containers[parent_choice % containers.len()];
        let key = match node {
            Shape::Element { tag, marker } => {
                let key = dom.create_element(tag);
                if let Some(value) = marker {
                    dom.set_attribute(key, PRIVACY_ATTR_NAME, *value).unwrap();
                }
                containers.push(key);
                key
            }
            Shape::Text(text) => dom.create_text(text.clone()),
        };
        dom.append_child(parent, key).unwrap();
        all.push(key);
    }
    (dom, all)
}

fn snapshot(dom: &Dom, ctx: &mut RecordingContext) -> SerializedNode {
    let mut scope = SerializationScope::new(SerializationStatus::InitialFullSnapshot);
    serialize_document(dom, ctx, &mut scope, NodePrivacyLevel::Allow).unwrap()
}

fn is_ignored(dom: &Dom, node: NodeKey) -> bool {
    let mut current = Some(node);
    while let Some(key) = current {
        if dom.tag_name(key) == Some("script") && dom.attribute(key, PRIVACY_ATTR_NAME).is_none() {
            return true;
        }
        current = dom.parent(key);
    }
    false
}

proptest! {
    #[test]
    fn serialization_is_identity_stable(shape in tree_strategy()) {
        let (dom, _) = build(&shape);
        let mut ctx = RecordingContext::new();

        let first = snapshot(&dom, &mut ctx);
        let assigned = ctx.ids.assigned();
        let second = snapshot(&dom, &mut ctx);

        prop_assert_eq!(first, second);
        prop_assert_eq!(ctx.ids.assigned(), assigned);
    }

    #[test]
    fn hidden_elements_have_no_children(shape in tree_strategy()) {
        let (dom, _) = build(&shape);
        let mut ctx = RecordingContext::new();
        let tree = snapshot(&dom, &mut ctx);

        for node in tree.walk() {
            if let SerializedNodeKind::Element { attributes, child_nodes, .. } = &node.kind {
                if attributes.get(PRIVACY_ATTR_NAME) == Some(&Some("hidden".to_string())) {
                    prop_assert!(child_nodes.is_empty());
                }
            }
        }
    }

    #[test]
    fn ignored_subtrees_get_no_ids(shape in tree_strategy()) {
        let (dom, nodes) = build(&shape);
        let mut ctx = RecordingContext::new();
        let tree = snapshot(&dom, &mut ctx);
        let emitted: HashSet<u64> = tree.walk().iter().map(|n| n.id).collect();

        for node in nodes {
            if is_ignored(&dom, node) {
                prop_assert!(!ctx.ids.contains(node));
            }
            if let Some(id) = ctx.ids.get(node) {
                prop_assert!(emitted.contains(&id));
            }
        }
    }
}
