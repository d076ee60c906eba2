//! Live document model.
//!
//! The recorder never owns the page. The host keeps a [`Dom`] in sync with
//! the real document and lends it to the recorder on every call. Every
//! structural, attribute or character-data change made through the `Dom`
//! API queues a [`RawMutation`]; the recorder drains the queue with
//! [`Dom::take_mutations`].
//!
//! Nodes live in a generational arena: a [`NodeKey`] of a discarded node is
//! never resolved again, even if its slot is reused. Side tables keyed by
//! `NodeKey` therefore behave like weak maps.

use crate::error::{DomError, Result};
use crate::record::VisualViewportData;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Arena key of a node in a [`Dom`].
    pub struct NodeKey;
    /// Arena key of a stylesheet.
    pub struct SheetKey;
    /// Arena key of a CSS rule.
    pub struct RuleKey;
}

/// Bounding box size of an element, in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

/// Scroll offsets of an element, in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub top: f64,
    pub left: f64,
}

/// Live (non-attribute) state of form controls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormState {
    pub value: Option<String>,
    pub checked: bool,
    pub selected: bool,
}

/// Element payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementData {
    /// Lowercase tag name.
    pub tag_name: String,
    /// Attributes in insertion order.
    pub attributes: Vec<(String, String)>,
    pub is_svg: bool,
    pub shadow_root: Option<NodeKey>,
    pub form: FormState,
    pub rect: Rect,
    /// Intrinsic size of images, when loaded.
    pub natural_size: Option<Rect>,
    pub scroll: ScrollOffset,
    /// Playback state of media elements.
    pub paused: bool,
    /// Stylesheet attached to `<style>` and `<link>` elements.
    pub sheet: Option<SheetKey>,
}

impl ElementData {
    fn new(tag_name: &str, is_svg: bool) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attributes: Vec::new(),
            is_svg,
            shadow_root: None,
            form: FormState::default(),
            rect: Rect::default(),
            natural_size: None,
            scroll: ScrollOffset::default(),
            paused: true,
            sheet: None,
        }
    }

    /// Get an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Check whether the `class` attribute contains `class_name`.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attribute("class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }

    /// The `type` of an `<input>`, lowercased, defaulting to `text`.
    pub fn input_type(&self) -> String {
        self.attribute("type")
            .map(|t| t.to_ascii_lowercase())
            .unwrap_or_else(|| "text".to_string())
    }
}

/// Node payload variants.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Document,
    DocumentType {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// A shadow root attached to `host`.
    ShadowRoot { host: NodeKey },
    Element(Box<ElementData>),
    Text(String),
    CData(String),
    Comment(String),
}

/// A node in the arena.
#[derive(Clone, Debug)]
pub struct DomNode {
    pub kind: NodeKind,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
}

/// A raw change notification, queued by every mutating [`Dom`] operation.
#[derive(Clone, Debug, PartialEq)]
pub enum RawMutation {
    ChildList {
        target: NodeKey,
        added: Vec<NodeKey>,
        removed: Vec<NodeKey>,
    },
    CharacterData {
        target: NodeKey,
        old_value: Option<String>,
    },
    Attributes {
        target: NodeKey,
        name: String,
        old_value: Option<String>,
    },
}

impl RawMutation {
    /// The node the notification is about.
    pub fn target(&self) -> NodeKey {
        match self {
            RawMutation::ChildList { target, .. }
            | RawMutation::CharacterData { target, .. }
            | RawMutation::Attributes { target, .. } => *target,
        }
    }
}

/// Where a CSS rule lives: directly in a sheet or inside a grouping rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleParent {
    Sheet(SheetKey),
    Rule(RuleKey),
}

/// A stylesheet and its top-level rules.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleSheet {
    pub owner: Option<NodeKey>,
    pub href: Option<String>,
    pub rules: Vec<RuleKey>,
}

/// Rule body.
#[derive(Clone, Debug, PartialEq)]
pub enum CssRuleBody {
    Style(String),
    /// `@media`, `@supports` and friends.
    Grouping { prelude: String, rules: Vec<RuleKey> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CssRule {
    pub parent_sheet: SheetKey,
    pub parent_rule: Option<RuleKey>,
    pub body: CssRuleBody,
}

/// Window-level state read by snapshots and viewport trackers.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowState {
    pub href: String,
    pub width: u32,
    pub height: u32,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub has_focus: bool,
    pub visual_viewport: Option<VisualViewportData>,
}

/// The live document.
#[derive(Debug)]
pub struct Dom {
    nodes: SlotMap<NodeKey, DomNode>,
    sheets: SlotMap<SheetKey, StyleSheet>,
    rules: SlotMap<RuleKey, CssRule>,
    document: NodeKey,
    base_url: String,
    window: WindowState,
    pending: Vec<RawMutation>,
}

impl Dom {
    /// Create an empty document loaded from `href`.
    pub fn new(href: impl Into<String>) -> Self {
        let href = href.into();
        let mut nodes = SlotMap::with_key();
        let document = nodes.insert(DomNode {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
        });
        Self {
            nodes,
            sheets: SlotMap::with_key(),
            rules: SlotMap::with_key(),
            document,
            base_url: href.clone(),
            window: WindowState {
                href,
                width: 1024,
                height: 768,
                scroll_x: 0.0,
                scroll_y: 0.0,
                has_focus: true,
                visual_viewport: None,
            },
            pending: Vec::new(),
        }
    }

    /// The document node.
    pub fn document(&self) -> NodeKey {
        self.document
    }

    /// Base URL used to resolve relative references.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, url: impl Into<String>) {
        self.base_url = url.into();
    }

    pub fn window(&self) -> &WindowState {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut WindowState {
        &mut self.window
    }

    // ------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------

    /// Create a detached HTML element.
    pub fn create_element(&mut self, tag_name: &str) -> NodeKey {
        self.insert_node(NodeKind::Element(Box::new(ElementData::new(tag_name, false))))
    }

    /// Create a detached element in the SVG namespace.
    pub fn create_svg_element(&mut self, tag_name: &str) -> NodeKey {
        self.insert_node(NodeKind::Element(Box::new(ElementData::new(tag_name, true))))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeKey {
        self.insert_node(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeKey {
        self.insert_node(NodeKind::Comment(text.into()))
    }

    pub fn create_cdata(&mut self, text: impl Into<String>) -> NodeKey {
        self.insert_node(NodeKind::CData(text.into()))
    }

    pub fn create_doctype(
        &mut self,
        name: impl Into<String>,
        public_id: impl Into<String>,
        system_id: impl Into<String>,
    ) -> NodeKey {
        self.insert_node(NodeKind::DocumentType {
            name: name.into(),
            public_id: public_id.into(),
            system_id: system_id.into(),
        })
    }

    /// Attach a shadow root to `host` and return it.
    pub fn attach_shadow(&mut self, host: NodeKey) -> Result<NodeKey> {
        match self.element(host) {
            None if self.nodes.contains_key(host) => return Err(DomError::NotAnElement),
            None => return Err(DomError::NodeNotFound),
            Some(el) if el.shadow_root.is_some() => return Err(DomError::ShadowRootExists),
            Some(_) => {}
        }
        let root = self.insert_node(NodeKind::ShadowRoot { host });
        if let Some(el) = self.element_mut(host) {
            el.shadow_root = Some(root);
        }
        Ok(root)
    }

    fn insert_node(&mut self, kind: NodeKind) -> NodeKey {
        self.nodes.insert(DomNode {
            kind,
            parent: None,
            children: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Tree mutation
    // ------------------------------------------------------------------

    /// Append `child` to `parent`, moving it if it is already in the tree.
    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference` (or last when `None`).
    pub fn insert_before(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        reference: Option<NodeKey>,
    ) -> Result<()> {
        self.check_insertion(parent, child)?;
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild);
            }
            if reference == child {
                return Ok(());
            }
        }

        if let Some(old_parent) = self.parent(child) {
            self.detach(old_parent, child);
        }

        let position = match reference {
            Some(reference) => self.nodes[parent]
                .children
                .iter()
                .position(|c| *c == reference)
                .ok_or(DomError::NotAChild)?,
            None => self.nodes[parent].children.len(),
        };
        self.nodes[parent].children.insert(position, child);
        self.nodes[child].parent = Some(parent);
        self.pending.push(RawMutation::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Remove `child` from `parent`. The node stays alive until discarded.
    pub fn remove_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return Err(DomError::NodeNotFound);
        }
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild);
        }
        self.detach(parent, child);
        Ok(())
    }

    /// Remove `node` from its parent, if any.
    pub fn remove(&mut self, node: NodeKey) -> Result<()> {
        match self.parent(node) {
            Some(parent) => self.remove_child(parent, node),
            None if self.nodes.contains_key(node) => Ok(()),
            None => Err(DomError::NodeNotFound),
        }
    }

    fn detach(&mut self, parent: NodeKey, child: NodeKey) {
        self.nodes[parent].children.retain(|c| *c != child);
        self.nodes[child].parent = None;
        self.pending.push(RawMutation::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
        });
    }

    fn check_insertion(&self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let (Some(parent_node), Some(child_node)) = (self.nodes.get(parent), self.nodes.get(child))
        else {
            return Err(DomError::NodeNotFound);
        };
        match parent_node.kind {
            NodeKind::Document | NodeKind::ShadowRoot { .. } | NodeKind::Element(_) => {}
            _ => {
                return Err(DomError::HierarchyRequest(
                    "parent cannot have children".to_string(),
                ))
            }
        }
        if matches!(
            child_node.kind,
            NodeKind::Document | NodeKind::ShadowRoot { .. }
        ) {
            return Err(DomError::HierarchyRequest(
                "node cannot be inserted".to_string(),
            ));
        }
        let mut current = Some(parent);
        while let Some(node) = current {
            if node == child {
                return Err(DomError::HierarchyRequest(
                    "node is an ancestor of the parent".to_string(),
                ));
            }
            current = self.composed_parent(node);
        }
        Ok(())
    }

    /// Drop a detached subtree from the arena, as a garbage collector would.
    pub fn discard(&mut self, node: NodeKey) -> Result<()> {
        if !self.nodes.contains_key(node) {
            return Err(DomError::NodeNotFound);
        }
        if self.parent(node).is_some() || node == self.document {
            return Err(DomError::HierarchyRequest(
                "only detached nodes can be discarded".to_string(),
            ));
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.nodes.remove(current) {
                stack.extend(removed.children);
                if let NodeKind::Element(el) = removed.kind {
                    stack.extend(el.shadow_root);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attributes and character data
    // ------------------------------------------------------------------

    pub fn set_attribute(&mut self, node: NodeKey, name: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let el = self.element_mut_checked(node)?;
        let name = name.to_ascii_lowercase();
        let old_value = match el.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                el.attributes.push((name.clone(), value));
                None
            }
        };
        self.pending.push(RawMutation::Attributes {
            target: node,
            name,
            old_value,
        });
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeKey, name: &str) -> Result<()> {
        let el = self.element_mut_checked(node)?;
        let name = name.to_ascii_lowercase();
        let Some(position) = el.attributes.iter().position(|(n, _)| *n == name) else {
            return Ok(());
        };
        let (_, old_value) = el.attributes.remove(position);
        self.pending.push(RawMutation::Attributes {
            target: node,
            name,
            old_value: Some(old_value),
        });
        Ok(())
    }

    /// Replace the data of a text, CDATA or comment node.
    pub fn set_text(&mut self, node: NodeKey, text: impl Into<String>) -> Result<()> {
        let entry = self.nodes.get_mut(node).ok_or(DomError::NodeNotFound)?;
        let slot = match &mut entry.kind {
            NodeKind::Text(t) | NodeKind::CData(t) | NodeKind::Comment(t) => t,
            _ => return Err(DomError::NotCharacterData),
        };
        let old_value = std::mem::replace(slot, text.into());
        self.pending.push(RawMutation::CharacterData {
            target: node,
            old_value: Some(old_value),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Live element state (no notifications, like the real DOM)
    // ------------------------------------------------------------------

    pub fn set_value(&mut self, node: NodeKey, value: impl Into<String>) -> Result<()> {
        self.element_mut_checked(node)?.form.value = Some(value.into());
        Ok(())
    }

    pub fn set_checked(&mut self, node: NodeKey, checked: bool) -> Result<()> {
        self.element_mut_checked(node)?.form.checked = checked;
        Ok(())
    }

    pub fn set_selected(&mut self, node: NodeKey, selected: bool) -> Result<()> {
        self.element_mut_checked(node)?.form.selected = selected;
        Ok(())
    }

    pub fn set_rect(&mut self, node: NodeKey, width: f64, height: f64) -> Result<()> {
        self.element_mut_checked(node)?.rect = Rect { width, height };
        Ok(())
    }

    pub fn set_natural_size(&mut self, node: NodeKey, width: f64, height: f64) -> Result<()> {
        self.element_mut_checked(node)?.natural_size = Some(Rect { width, height });
        Ok(())
    }

    pub fn set_scroll(&mut self, node: NodeKey, top: f64, left: f64) -> Result<()> {
        self.element_mut_checked(node)?.scroll = ScrollOffset { top, left };
        Ok(())
    }

    pub fn set_paused(&mut self, node: NodeKey, paused: bool) -> Result<()> {
        self.element_mut_checked(node)?.paused = paused;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stylesheets
    // ------------------------------------------------------------------

    /// Create a stylesheet, attaching it to `owner` when given.
    pub fn create_stylesheet(&mut self, owner: Option<NodeKey>, href: Option<String>) -> Result<SheetKey> {
        if let Some(owner) = owner {
            self.element_mut_checked(owner)?;
        }
        let sheet = self.sheets.insert(StyleSheet {
            owner,
            href,
            rules: Vec::new(),
        });
        if let Some(owner) = owner {
            if let Some(el) = self.element_mut(owner) {
                el.sheet = Some(sheet);
            }
        }
        Ok(sheet)
    }

    /// Insert a style rule at `index` under `parent`.
    pub fn insert_rule(&mut self, parent: RuleParent, index: usize, text: impl Into<String>) -> Result<RuleKey> {
        self.insert_rule_body(parent, index, CssRuleBody::Style(text.into()))
    }

    /// Insert an empty grouping rule (e.g. `@media print`) at `index`.
    pub fn insert_grouping_rule(
        &mut self,
        parent: RuleParent,
        index: usize,
        prelude: impl Into<String>,
    ) -> Result<RuleKey> {
        self.insert_rule_body(
            parent,
            index,
            CssRuleBody::Grouping {
                prelude: prelude.into(),
                rules: Vec::new(),
            },
        )
    }

    fn insert_rule_body(&mut self, parent: RuleParent, index: usize, body: CssRuleBody) -> Result<RuleKey> {
        let (parent_sheet, parent_rule) = match parent {
            RuleParent::Sheet(sheet) => {
                if !self.sheets.contains_key(sheet) {
                    return Err(DomError::SheetNotFound);
                }
                (sheet, None)
            }
            RuleParent::Rule(rule) => {
                let rule_data = self.rules.get(rule).ok_or(DomError::RuleNotFound)?;
                if !matches!(rule_data.body, CssRuleBody::Grouping { .. }) {
                    return Err(DomError::NotAGroupingRule);
                }
                (rule_data.parent_sheet, Some(rule))
            }
        };
        let length = self.rule_list(parent)?.len();
        if index > length {
            return Err(DomError::IndexOutOfBounds { index, length });
        }
        let key = self.rules.insert(CssRule {
            parent_sheet,
            parent_rule,
            body,
        });
        self.rule_list_mut(parent)?.insert(index, key);
        Ok(key)
    }

    /// Delete the rule at `index` under `parent`.
    pub fn delete_rule(&mut self, parent: RuleParent, index: usize) -> Result<()> {
        let list = self.rule_list_mut(parent)?;
        if index >= list.len() {
            return Err(DomError::IndexOutOfBounds {
                index,
                length: list.len(),
            });
        }
        let removed = list.remove(index);
        let mut stack = vec![removed];
        while let Some(rule) = stack.pop() {
            if let Some(CssRule {
                body: CssRuleBody::Grouping { rules, .. },
                ..
            }) = self.rules.remove(rule)
            {
                stack.extend(rules);
            }
        }
        Ok(())
    }

    /// The rules directly under `parent`.
    pub fn rule_list(&self, parent: RuleParent) -> Result<&[RuleKey]> {
        match parent {
            RuleParent::Sheet(sheet) => self
                .sheets
                .get(sheet)
                .map(|s| s.rules.as_slice())
                .ok_or(DomError::SheetNotFound),
            RuleParent::Rule(rule) => match self.rules.get(rule).map(|r| &r.body) {
                Some(CssRuleBody::Grouping { rules, .. }) => Ok(rules.as_slice()),
                Some(_) => Err(DomError::NotAGroupingRule),
                None => Err(DomError::RuleNotFound),
            },
        }
    }

    fn rule_list_mut(&mut self, parent: RuleParent) -> Result<&mut Vec<RuleKey>> {
        match parent {
            RuleParent::Sheet(sheet) => self
                .sheets
                .get_mut(sheet)
                .map(|s| &mut s.rules)
                .ok_or(DomError::SheetNotFound),
            RuleParent::Rule(rule) => match self.rules.get_mut(rule).map(|r| &mut r.body) {
                Some(CssRuleBody::Grouping { rules, .. }) => Ok(rules),
                Some(_) => Err(DomError::NotAGroupingRule),
                None => Err(DomError::RuleNotFound),
            },
        }
    }

    pub fn sheet(&self, sheet: SheetKey) -> Option<&StyleSheet> {
        self.sheets.get(sheet)
    }

    pub fn rule(&self, rule: RuleKey) -> Option<&CssRule> {
        self.rules.get(rule)
    }

    /// Serialized text of a single rule, including nested rules.
    pub fn rule_css_text(&self, rule: RuleKey) -> String {
        match self.rules.get(rule).map(|r| &r.body) {
            Some(CssRuleBody::Style(text)) => text.clone(),
            Some(CssRuleBody::Grouping { prelude, rules }) => {
                let inner: Vec<String> = rules.iter().map(|r| self.rule_css_text(*r)).collect();
                format!("{} {{ {} }}", prelude, inner.join(" "))
            }
            None => String::new(),
        }
    }

    /// Concatenated text of every rule in a sheet.
    pub fn sheet_css_text(&self, sheet: SheetKey) -> Option<String> {
        let sheet = self.sheets.get(sheet)?;
        Some(
            sheet
                .rules
                .iter()
                .map(|r| self.rule_css_text(*r))
                .collect::<Vec<_>>()
                .join(""),
        )
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn contains(&self, node: NodeKey) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn node(&self, node: NodeKey) -> Option<&DomNode> {
        self.nodes.get(node)
    }

    pub fn kind(&self, node: NodeKey) -> Option<&NodeKind> {
        self.nodes.get(node).map(|n| &n.kind)
    }

    pub fn element(&self, node: NodeKey) -> Option<&ElementData> {
        match self.kind(node) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeKey) -> Option<&mut ElementData> {
        match self.nodes.get_mut(node).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn element_mut_checked(&mut self, node: NodeKey) -> Result<&mut ElementData> {
        if !self.nodes.contains_key(node) {
            return Err(DomError::NodeNotFound);
        }
        self.element_mut(node).ok_or(DomError::NotAnElement)
    }

    /// Lowercase tag name of an element.
    pub fn tag_name(&self, node: NodeKey) -> Option<&str> {
        self.element(node).map(|el| el.tag_name.as_str())
    }

    pub fn attribute(&self, node: NodeKey, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.attribute(name))
    }

    /// Data of a text, CDATA or comment node.
    pub fn character_data(&self, node: NodeKey) -> Option<&str> {
        match self.kind(node) {
            Some(NodeKind::Text(t)) | Some(NodeKind::CData(t)) | Some(NodeKind::Comment(t)) => {
                Some(t)
            }
            _ => None,
        }
    }

    pub fn is_text(&self, node: NodeKey) -> bool {
        matches!(self.kind(node), Some(NodeKind::Text(_)))
    }

    pub fn is_shadow_root(&self, node: NodeKey) -> bool {
        matches!(self.kind(node), Some(NodeKind::ShadowRoot { .. }))
    }

    /// Host element of a shadow root.
    pub fn shadow_host(&self, node: NodeKey) -> Option<NodeKey> {
        match self.kind(node) {
            Some(NodeKind::ShadowRoot { host }) => Some(*host),
            _ => None,
        }
    }

    /// Shadow root hosted by an element.
    pub fn shadow_root(&self, node: NodeKey) -> Option<NodeKey> {
        self.element(node).and_then(|el| el.shadow_root)
    }

    pub fn parent(&self, node: NodeKey) -> Option<NodeKey> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    /// Parent in the composed tree: a shadow root's parent is its host.
    pub fn composed_parent(&self, node: NodeKey) -> Option<NodeKey> {
        self.parent(node).or_else(|| self.shadow_host(node))
    }

    pub fn children(&self, node: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn next_sibling(&self, node: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|c| *c == node)?;
        siblings.get(position + 1).copied()
    }

    /// Position of `node` among its parent's children.
    pub fn index_in_parent(&self, node: NodeKey) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|c| *c == node)
    }

    /// Root of the tree containing `node` without crossing shadow
    /// boundaries: the document, a shadow root, or a detached subtree root.
    pub fn root_of(&self, node: NodeKey) -> NodeKey {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Whether `node` is reachable from the document, across shadow hosts.
    pub fn is_connected(&self, node: NodeKey) -> bool {
        if !self.nodes.contains_key(node) {
            return false;
        }
        let mut current = node;
        loop {
            if current == self.document {
                return true;
            }
            match self.composed_parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Pre-order traversal of `root` and its light-tree descendants.
    pub fn descendants(&self, root: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !self.nodes.contains_key(node) {
                continue;
            }
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    /// Number of live nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Drain queued change notifications.
    pub fn take_mutations(&mut self) -> Vec<RawMutation> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(dom: &mut Dom) -> NodeKey {
        let html = dom.create_element("html");
        let body = dom.create_element("body");
        dom.append_child(dom.document(), html).unwrap();
        dom.append_child(html, body).unwrap();
        dom.take_mutations();
        body
    }

    #[test]
    fn test_append_queues_child_list() {
        let mut dom = Dom::new("https://example.com/");
        let body = body(&mut dom);
        let div = dom.create_element("DIV");

        dom.append_child(body, div).unwrap();

        assert_eq!(dom.tag_name(div), Some("div"));
        assert_eq!(
            dom.take_mutations(),
            vec![RawMutation::ChildList {
                target: body,
                added: vec![div],
                removed: vec![],
            }]
        );
        assert!(dom.is_connected(div));
    }

    #[test]
    fn test_move_queues_remove_then_add() {
        let mut dom = Dom::new("https://example.com/");
        let body = body(&mut dom);
        let a = dom.create_element("div");
        let b = dom.create_element("div");
        dom.append_child(body, a).unwrap();
        dom.append_child(body, b).unwrap();
        dom.take_mutations();

        dom.append_child(b, a).unwrap();

        let mutations = dom.take_mutations();
        assert_eq!(mutations.len(), 2);
        assert_eq!(mutations[0].target(), body);
        assert_eq!(mutations[1].target(), b);
        assert_eq!(dom.parent(a), Some(b));
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut dom = Dom::new("https://example.com/");
        let body = body(&mut dom);
        let div = dom.create_element("div");
        dom.append_child(body, div).unwrap();

        assert!(matches!(
            dom.append_child(div, body),
            Err(DomError::HierarchyRequest(_))
        ));
    }

    #[test]
    fn test_attribute_old_values() {
        let mut dom = Dom::new("https://example.com/");
        let div = dom.create_element("div");
        dom.set_attribute(div, "title", "a").unwrap();
        dom.set_attribute(div, "title", "b").unwrap();
        dom.remove_attribute(div, "title").unwrap();

        let old_values: Vec<_> = dom
            .take_mutations()
            .into_iter()
            .map(|m| match m {
                RawMutation::Attributes { old_value, .. } => old_value,
                _ => panic!("unexpected mutation"),
            })
            .collect();
        assert_eq!(old_values, vec![None, Some("a".into()), Some("b".into())]);
        assert_eq!(dom.attribute(div, "title"), None);
    }

    #[test]
    fn test_shadow_root_connectivity() {
        let mut dom = Dom::new("https://example.com/");
        let body = body(&mut dom);
        let host = dom.create_element("my-widget");
        dom.append_child(body, host).unwrap();
        let root = dom.attach_shadow(host).unwrap();
        let inner = dom.create_element("span");
        dom.append_child(root, inner).unwrap();

        assert_eq!(dom.root_of(inner), root);
        assert_eq!(dom.composed_parent(root), Some(host));
        assert!(dom.is_connected(inner));
        assert_eq!(dom.attach_shadow(host), Err(DomError::ShadowRootExists));

        dom.remove(host).unwrap();
        assert!(!dom.is_connected(inner));
    }

    #[test]
    fn test_discard_invalidates_keys() {
        let mut dom = Dom::new("https://example.com/");
        let div = dom.create_element("div");
        let text = dom.create_text("hi");
        dom.append_child(div, text).unwrap();

        dom.discard(div).unwrap();

        assert!(!dom.contains(div));
        assert!(!dom.contains(text));
        let reused = dom.create_element("p");
        assert_ne!(reused, div);
    }

    #[test]
    fn test_nested_rules() {
        let mut dom = Dom::new("https://example.com/");
        let style = dom.create_element("style");
        let sheet = dom.create_stylesheet(Some(style), None).unwrap();
        dom.insert_rule(RuleParent::Sheet(sheet), 0, "a { color: red; }").unwrap();
        let media = dom
            .insert_grouping_rule(RuleParent::Sheet(sheet), 1, "@media print")
            .unwrap();
        dom.insert_rule(RuleParent::Rule(media), 0, "b { color: blue; }").unwrap();

        assert_eq!(
            dom.sheet_css_text(sheet).unwrap(),
            "a { color: red; }@media print { b { color: blue; } }"
        );
        assert_eq!(
            dom.insert_rule(RuleParent::Sheet(sheet), 5, "x {}"),
            Err(DomError::IndexOutOfBounds { index: 5, length: 2 })
        );

        dom.delete_rule(RuleParent::Sheet(sheet), 1).unwrap();
        assert!(dom.rule(media).is_none());
    }
}
