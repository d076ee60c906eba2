//! Snapshot serializer.
//!
//! Turns a live subtree into a redacted [`SerializedNode`] tree and assigns
//! ids through the [`RecordingContext`]. The privacy level flows top-down:
//! each element reduces its own self level with the level inherited from its
//! parent, so no cache is needed within one pass.
//!
//! | Level           | Element output                                   |
//! |-----------------|--------------------------------------------------|
//! | `Allow`         | attributes and children as is                    |
//! | `Mask`          | hint attributes and text censored                |
//! | `MaskUserInput` | form values and form text censored               |
//! | `Hidden`        | size placeholder, no children                    |
//! | `Ignore`        | nothing, no id                                   |

use crate::attributes::{element_input_value, serialize_attribute};
use crate::context::{RecordingContext, SerializationScope, SerializationStatus};
use crate::css::{stylesheet_css_text, switch_to_absolute_url};
use rewind_core::dom::{Dom, ElementData, NodeKey, NodeKind};
use rewind_core::privacy::{
    censor_text, is_form_element, reduce_privacy_level, self_privacy_level, should_mask_node,
    NodePrivacyLevel, CENSORED_STRING_MARK, PRIVACY_ATTR_NAME, PRIVACY_ATTR_VALUE_HIDDEN,
};
use rewind_core::record::{Attributes, ScrollPosition, SerializedNode, SerializedNodeKind};

/// Options inherited from the parent during a descent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Effective privacy level of the parent.
    pub parent_level: NodePrivacyLevel,
    /// Drop whitespace-only text nodes (set inside `<head>`).
    pub ignore_white_space: bool,
}

impl SerializeOptions {
    pub fn new(parent_level: NodePrivacyLevel) -> Self {
        Self {
            parent_level,
            ignore_white_space: false,
        }
    }
}

/// Serialize the whole document.
pub fn serialize_document(
    dom: &Dom,
    ctx: &mut RecordingContext,
    scope: &mut SerializationScope,
    default_level: NodePrivacyLevel,
) -> Option<SerializedNode> {
    serialize_node_with_id(
        dom,
        dom.document(),
        ctx,
        scope,
        SerializeOptions::new(default_level),
    )
}

/// Serialize `node` and its subtree, reusing or assigning its id.
///
/// Returns `None` for ignored nodes, comments, unknown keys and
/// whitespace-only text when `ignore_white_space` is set.
pub fn serialize_node_with_id(
    dom: &Dom,
    node: NodeKey,
    ctx: &mut RecordingContext,
    scope: &mut SerializationScope,
    options: SerializeOptions,
) -> Option<SerializedNode> {
    let kind = serialize_node(dom, node, ctx, scope, options)?;
    let id = ctx.ids.get_or_assign(node);
    scope.serialized_ids.insert(id);
    Some(SerializedNode { id, kind })
}

fn serialize_node(
    dom: &Dom,
    node: NodeKey,
    ctx: &mut RecordingContext,
    scope: &mut SerializationScope,
    options: SerializeOptions,
) -> Option<SerializedNodeKind> {
    match dom.kind(node)? {
        NodeKind::Document => Some(SerializedNodeKind::Document {
            child_nodes: serialize_child_nodes(dom, node, ctx, scope, options),
        }),
        NodeKind::ShadowRoot { .. } => {
            scope.discovered_shadow_roots.push(node);
            Some(SerializedNodeKind::DocumentFragment {
                is_shadow_root: true,
                child_nodes: serialize_child_nodes(dom, node, ctx, scope, options),
            })
        }
        NodeKind::DocumentType {
            name,
            public_id,
            system_id,
        } => Some(SerializedNodeKind::DocumentType {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
        }),
        NodeKind::Element(el) => serialize_element(dom, node, el, ctx, scope, options),
        NodeKind::Text(text) => {
            let (text_content, is_style) = text_content(dom, node, text, options)?;
            Some(SerializedNodeKind::Text {
                text_content,
                is_style,
            })
        }
        NodeKind::CData(_) => Some(SerializedNodeKind::CData),
        NodeKind::Comment(_) => None,
    }
}

fn serialize_child_nodes(
    dom: &Dom,
    node: NodeKey,
    ctx: &mut RecordingContext,
    scope: &mut SerializationScope,
    options: SerializeOptions,
) -> Vec<SerializedNode> {
    let mut children: Vec<NodeKey> = dom.children(node).to_vec();
    children.extend(dom.shadow_root(node));
    children
        .into_iter()
        .filter_map(|child| serialize_node_with_id(dom, child, ctx, scope, options))
        .collect()
}

fn serialize_element(
    dom: &Dom,
    node: NodeKey,
    el: &ElementData,
    ctx: &mut RecordingContext,
    scope: &mut SerializationScope,
    options: SerializeOptions,
) -> Option<SerializedNodeKind> {
    let tag_name = valid_tag_name(&el.tag_name);
    let level = reduce_privacy_level(self_privacy_level(dom, node), options.parent_level);

    match level {
        NodePrivacyLevel::Ignore => return None,
        NodePrivacyLevel::Hidden => {
            let mut attributes = Attributes::new();
            attributes.insert("rr_width".into(), Some(format!("{}px", el.rect.width)));
            attributes.insert("rr_height".into(), Some(format!("{}px", el.rect.height)));
            attributes.insert(
                PRIVACY_ATTR_NAME.into(),
                Some(PRIVACY_ATTR_VALUE_HIDDEN.into()),
            );
            return Some(SerializedNodeKind::Element {
                tag_name,
                attributes,
                child_nodes: Vec::new(),
                is_svg: el.is_svg,
            });
        }
        _ => {}
    }

    let attributes = serialize_attributes(dom, node, el, level, ctx, scope.status);
    let child_options = SerializeOptions {
        parent_level: level,
        ignore_white_space: tag_name == "head",
    };
    let child_nodes = serialize_child_nodes(dom, node, ctx, scope, child_options);

    Some(SerializedNodeKind::Element {
        tag_name,
        attributes,
        child_nodes,
        is_svg: el.is_svg,
    })
}

/// Redacted attributes of an element plus the synthetic ones.
pub fn serialize_attributes(
    dom: &Dom,
    node: NodeKey,
    el: &ElementData,
    level: NodePrivacyLevel,
    ctx: &mut RecordingContext,
    status: SerializationStatus,
) -> Attributes {
    let mut attributes = Attributes::new();
    let tag = el.tag_name.as_str();

    for (name, _) in &el.attributes {
        if let Some(value) = serialize_attribute(dom, node, level, name) {
            attributes.insert(name.clone(), Some(value));
        }
    }

    if is_form_element(tag) {
        attributes.remove("value");
        if let Some(value) = element_input_value(dom, node, level).filter(|v| !v.is_empty()) {
            attributes.insert("value".into(), Some(value));
        }
    }

    if tag == "option" && level == NodePrivacyLevel::Allow && el.form.selected {
        attributes.insert("selected".into(), Some("true".into()));
    }

    let inline_sheet = match tag {
        "link" => el.attribute("rel").map(|r| r.eq_ignore_ascii_case("stylesheet")) == Some(true),
        "style" => dom
            .children(node)
            .iter()
            .all(|c| dom.character_data(*c).map(|t| t.trim().is_empty()).unwrap_or(true)),
        _ => false,
    };
    if inline_sheet {
        if let Some(css_text) = el.sheet.and_then(|sheet| stylesheet_css_text(dom, sheet)) {
            attributes.insert("_cssText".into(), Some(css_text));
        }
    }

    if tag == "input" && matches!(el.input_type().as_str(), "radio" | "checkbox") {
        if level == NodePrivacyLevel::Allow {
            attributes.insert("checked".into(), Some(el.form.checked.to_string()));
        } else if should_mask_node(dom, node, level) {
            attributes.remove("checked");
        }
    }

    if matches!(tag, "audio" | "video") {
        let state = if el.paused { "paused" } else { "played" };
        attributes.insert("rr_mediaState".into(), Some(state.into()));
    }

    let scroll = match status {
        SerializationStatus::InitialFullSnapshot => {
            let position = ScrollPosition {
                top: el.scroll.top.round(),
                left: el.scroll.left.round(),
            };
            if position.top != 0.0 || position.left != 0.0 {
                ctx.scroll_positions.set(node, position.clone());
            }
            Some(position)
        }
        SerializationStatus::SubsequentFullSnapshot => ctx.scroll_positions.get(node).cloned(),
        SerializationStatus::Mutation => None,
    };
    if let Some(position) = scroll {
        if position.left != 0.0 {
            attributes.insert("rr_scrollLeft".into(), Some(format!("{}", position.left)));
        }
        if position.top != 0.0 {
            attributes.insert("rr_scrollTop".into(), Some(format!("{}", position.top)));
        }
    }

    attributes
}

/// Recorded value of a character-data node whose parent has `parent_level`.
pub fn serialize_text_content(
    dom: &Dom,
    node: NodeKey,
    parent_level: NodePrivacyLevel,
) -> Option<String> {
    let text = dom.character_data(node)?;
    text_content(dom, node, text, SerializeOptions::new(parent_level)).map(|(content, _)| content)
}

/// Recorded content of a text node, with its `is_style` flag.
fn text_content(
    dom: &Dom,
    node: NodeKey,
    text: &str,
    options: SerializeOptions,
) -> Option<(String, bool)> {
    if options.ignore_white_space && text.trim().is_empty() {
        return None;
    }
    let parent_tag = dom.parent(node).and_then(|p| dom.tag_name(p));
    let level = options.parent_level;
    let is_style = parent_tag == Some("style");

    let content = if parent_tag == Some("script") || level == NodePrivacyLevel::Hidden {
        CENSORED_STRING_MARK.to_string()
    } else if is_style {
        switch_to_absolute_url(text, Some(dom.base_url()))
    } else if should_mask_node(dom, node, level) {
        match parent_tag {
            Some("datalist" | "select" | "optgroup") if text.trim().is_empty() => return None,
            Some("option") => CENSORED_STRING_MARK.to_string(),
            _ => censor_text(text),
        }
    } else {
        text.to_string()
    };
    Some((content, is_style))
}

/// Lowercased tag name, or `div` when it contains unexpected characters.
pub fn valid_tag_name(tag_name: &str) -> String {
    let processed = tag_name.trim().to_ascii_lowercase();
    let valid = !processed.is_empty()
        && processed
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        processed
    } else {
        "div".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::dom::RuleParent;

    struct Page {
        dom: Dom,
        head: NodeKey,
        body: NodeKey,
    }

    fn page() -> Page {
        let mut dom = Dom::new("https://example.com/");
        let doctype = dom.create_doctype("html", "", "");
        let html = dom.create_element("html");
        let head = dom.create_element("head");
        let body = dom.create_element("body");
        dom.append_child(dom.document(), doctype).unwrap();
        dom.append_child(dom.document(), html).unwrap();
        dom.append_child(html, head).unwrap();
        dom.append_child(html, body).unwrap();
        Page { dom, head, body }
    }

    fn snapshot(dom: &Dom, ctx: &mut RecordingContext) -> (SerializedNode, SerializationScope) {
        let mut scope = SerializationScope::new(SerializationStatus::InitialFullSnapshot);
        let node = serialize_document(dom, ctx, &mut scope, NodePrivacyLevel::Allow).unwrap();
        (node, scope)
    }

    fn find<'a>(root: &'a SerializedNode, id: u64) -> &'a SerializedNode {
        root.walk().into_iter().find(|n| n.id == id).unwrap()
    }

    #[test]
    fn test_document_structure() {
        let Page { mut dom, head, body } = page();
        let whitespace = dom.create_text("\n  ");
        let comment = dom.create_comment("hello");
        let text = dom.create_text("Hi");
        dom.append_child(head, whitespace).unwrap();
        dom.append_child(body, comment).unwrap();
        dom.append_child(body, text).unwrap();
        let mut ctx = RecordingContext::new();

        let (root, _) = snapshot(&dom, &mut ctx);

        assert!(matches!(root.kind, SerializedNodeKind::Document { .. }));
        assert!(matches!(root.child_nodes()[0].kind, SerializedNodeKind::DocumentType { .. }));
        assert!(ctx.ids.get(whitespace).is_none());
        assert!(ctx.ids.get(comment).is_none());
        let text_id = ctx.ids.get(text).unwrap();
        assert_eq!(
            find(&root, text_id).kind,
            SerializedNodeKind::Text {
                text_content: "Hi".into(),
                is_style: false
            }
        );
    }

    #[test]
    fn test_ids_are_stable_across_snapshots() {
        let Page { mut dom, body, .. } = page();
        let div = dom.create_element("div");
        dom.append_child(body, div).unwrap();
        let mut ctx = RecordingContext::new();

        let (first, _) = snapshot(&dom, &mut ctx);
        let (second, _) = snapshot(&dom, &mut ctx);

        assert_eq!(first, second);
    }

    #[test]
    fn test_hidden_element_is_a_placeholder() {
        let Page { mut dom, body, .. } = page();
        let secret = dom.create_element("section");
        dom.set_attribute(secret, PRIVACY_ATTR_NAME, "hidden").unwrap();
        dom.set_attribute(secret, "title", "top secret").unwrap();
        dom.set_rect(secret, 120.0, 40.5).unwrap();
        let inner = dom.create_text("classified");
        dom.append_child(body, secret).unwrap();
        dom.append_child(secret, inner).unwrap();
        let mut ctx = RecordingContext::new();

        let (root, _) = snapshot(&dom, &mut ctx);

        let node = find(&root, ctx.ids.get(secret).unwrap());
        let attributes = node.attributes().unwrap();
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes["rr_width"].as_deref(), Some("120px"));
        assert_eq!(attributes["rr_height"].as_deref(), Some("40.5px"));
        assert!(node.child_nodes().is_empty());
        assert!(ctx.ids.get(inner).is_none());
    }

    #[test]
    fn test_ignored_subtree_gets_no_id() {
        let Page { mut dom, head, .. } = page();
        let script = dom.create_element("script");
        let code = dom.create_text("track()");
        dom.append_child(head, script).unwrap();
        dom.append_child(script, code).unwrap();
        let mut ctx = RecordingContext::new();

        let (root, _) = snapshot(&dom, &mut ctx);

        assert!(ctx.ids.get(script).is_none());
        assert!(ctx.ids.get(code).is_none());
        assert!(root
            .walk()
            .iter()
            .all(|n| !matches!(&n.kind, SerializedNodeKind::Element { tag_name, .. } if tag_name == "script")));
    }

    #[test]
    fn test_masked_text_and_inputs() {
        let Page { mut dom, body, .. } = page();
        let form = dom.create_element("form");
        dom.set_attribute(form, PRIVACY_ATTR_NAME, "mask-user-input").unwrap();
        let label = dom.create_text("Name");
        let input = dom.create_element("input");
        dom.set_value(input, "Alice").unwrap();
        let textarea = dom.create_element("textarea");
        let typed = dom.create_text("my story");
        dom.append_child(body, form).unwrap();
        dom.append_child(form, label).unwrap();
        dom.append_child(form, input).unwrap();
        dom.append_child(form, textarea).unwrap();
        dom.append_child(textarea, typed).unwrap();
        let mut ctx = RecordingContext::new();

        let (root, _) = snapshot(&dom, &mut ctx);

        let input_node = find(&root, ctx.ids.get(input).unwrap());
        assert_eq!(input_node.attributes().unwrap()["value"].as_deref(), Some("***"));
        assert_eq!(
            find(&root, ctx.ids.get(label).unwrap()).kind,
            SerializedNodeKind::Text {
                text_content: "Name".into(),
                is_style: false
            }
        );
        assert_eq!(
            find(&root, ctx.ids.get(typed).unwrap()).kind,
            SerializedNodeKind::Text {
                text_content: "xx xxxxx".into(),
                is_style: false
            }
        );
    }

    #[test]
    fn test_shadow_roots_are_discovered_after_children() {
        let Page { mut dom, body, .. } = page();
        let host = dom.create_element("my-widget");
        let light = dom.create_element("span");
        dom.append_child(body, host).unwrap();
        dom.append_child(host, light).unwrap();
        let root = dom.attach_shadow(host).unwrap();
        let inner = dom.create_element("b");
        dom.append_child(root, inner).unwrap();
        let mut ctx = RecordingContext::new();

        let (tree, scope) = snapshot(&dom, &mut ctx);

        assert_eq!(scope.discovered_shadow_roots, vec![root]);
        let host_node = find(&tree, ctx.ids.get(host).unwrap());
        let children = host_node.child_nodes();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].id, ctx.ids.get(light).unwrap());
        assert!(matches!(
            children[1].kind,
            SerializedNodeKind::DocumentFragment { is_shadow_root: true, .. }
        ));
    }

    #[test]
    fn test_inline_stylesheet_and_media_state() {
        let Page { mut dom, head, body } = page();
        let style = dom.create_element("style");
        dom.append_child(head, style).unwrap();
        let sheet = dom.create_stylesheet(Some(style), None).unwrap();
        dom.insert_rule(RuleParent::Sheet(sheet), 0, "p { background: url(p.png); }")
            .unwrap();
        let video = dom.create_element("video");
        dom.append_child(body, video).unwrap();
        let mut ctx = RecordingContext::new();

        let (root, _) = snapshot(&dom, &mut ctx);

        let style_node = find(&root, ctx.ids.get(style).unwrap());
        assert_eq!(
            style_node.attributes().unwrap()["_cssText"].as_deref(),
            Some("p { background: url(https://example.com/p.png); }")
        );
        let video_node = find(&root, ctx.ids.get(video).unwrap());
        assert_eq!(
            video_node.attributes().unwrap()["rr_mediaState"].as_deref(),
            Some("paused")
        );
    }

    #[test]
    fn test_scroll_positions_are_restated() {
        let Page { mut dom, body, .. } = page();
        let list = dom.create_element("ul");
        dom.append_child(body, list).unwrap();
        dom.set_scroll(list, 120.4, 0.0).unwrap();
        let mut ctx = RecordingContext::new();

        let (first, _) = snapshot(&dom, &mut ctx);
        let id = ctx.ids.get(list).unwrap();
        assert_eq!(
            find(&first, id).attributes().unwrap()["rr_scrollTop"].as_deref(),
            Some("120")
        );

        // Offsets are restated from the table, not read again.
        dom.set_scroll(list, 0.0, 0.0).unwrap();
        let mut scope = SerializationScope::new(SerializationStatus::SubsequentFullSnapshot);
        let second = serialize_document(&dom, &mut ctx, &mut scope, NodePrivacyLevel::Allow).unwrap();
        assert_eq!(
            find(&second, id).attributes().unwrap()["rr_scrollTop"].as_deref(),
            Some("120")
        );
    }

    #[test]
    fn test_invalid_tag_names() {
        assert_eq!(valid_tag_name("DIV"), "div");
        assert_eq!(valid_tag_name("my-widget"), "my-widget");
        assert_eq!(valid_tag_name("bad<tag"), "div");
    }
}
