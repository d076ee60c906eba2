//! Privacy levels and their resolution over the composed tree.
//!
//! Every node has a *self level* derived from its tag, attributes and
//! classes, and an *effective level* obtained by combining the self level
//! with the parent's effective level:
//!
//! ```text
//! effective(node) = reduce(self(node), effective(parent(node)))
//! reduce(_, HIDDEN | IGNORE)   = parent level   (absorbing)
//! reduce(Some(level), _)       = level
//! reduce(None, parent)         = parent
//! ```

use crate::dom::{Dom, NodeKey, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute carrying an explicit privacy marker.
pub const PRIVACY_ATTR_NAME: &str = "data-rw-privacy";
/// Class prefix carrying an explicit privacy marker (`rw-privacy-mask`, ...).
pub const PRIVACY_CLASS_PREFIX: &str = "rw-privacy-";

pub const PRIVACY_ATTR_VALUE_ALLOW: &str = "allow";
pub const PRIVACY_ATTR_VALUE_MASK: &str = "mask";
pub const PRIVACY_ATTR_VALUE_MASK_USER_INPUT: &str = "mask-user-input";
pub const PRIVACY_ATTR_VALUE_HIDDEN: &str = "hidden";

/// Replacement for masked strings.
pub const CENSORED_STRING_MARK: &str = "***";
/// 1x1 transparent gif used when a masked image has no known size.
pub const CENSORED_IMG_MARK: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAP///wAAACH5BAEAAAAALAAAAAABAAEAAAICRAEAOw==";

/// Redaction level of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodePrivacyLevel {
    Allow,
    Mask,
    MaskUserInput,
    Hidden,
    Ignore,
}

impl NodePrivacyLevel {
    /// Levels that stop recording of the subtree entirely.
    pub fn is_absorbing(&self) -> bool {
        matches!(self, NodePrivacyLevel::Hidden | NodePrivacyLevel::Ignore)
    }

    fn from_marker(value: &str) -> Option<Self> {
        match value {
            PRIVACY_ATTR_VALUE_ALLOW => Some(NodePrivacyLevel::Allow),
            PRIVACY_ATTR_VALUE_MASK => Some(NodePrivacyLevel::Mask),
            PRIVACY_ATTR_VALUE_MASK_USER_INPUT => Some(NodePrivacyLevel::MaskUserInput),
            PRIVACY_ATTR_VALUE_HIDDEN => Some(NodePrivacyLevel::Hidden),
            _ => None,
        }
    }
}

/// Effective levels computed during one traversal. Never kept across passes.
pub type PrivacyCache = HashMap<NodeKey, NodePrivacyLevel>;

/// Combine a self level with the parent's effective level.
pub fn reduce_privacy_level(
    self_level: Option<NodePrivacyLevel>,
    parent_level: NodePrivacyLevel,
) -> NodePrivacyLevel {
    if parent_level.is_absorbing() {
        return parent_level;
    }
    self_level.unwrap_or(parent_level)
}

/// Self level of a node, if any.
pub fn self_privacy_level(dom: &Dom, node: NodeKey) -> Option<NodePrivacyLevel> {
    let el = dom.element(node)?;

    if el.tag_name == "base" {
        return Some(NodePrivacyLevel::Allow);
    }

    // Explicit markers, the most restrictive marker wins.
    let attr_level = el
        .attribute(PRIVACY_ATTR_NAME)
        .and_then(NodePrivacyLevel::from_marker);
    let class_level = [
        PRIVACY_ATTR_VALUE_HIDDEN,
        PRIVACY_ATTR_VALUE_MASK,
        PRIVACY_ATTR_VALUE_MASK_USER_INPUT,
        PRIVACY_ATTR_VALUE_ALLOW,
    ]
    .into_iter()
    .find(|marker| el.has_class(&format!("{}{}", PRIVACY_CLASS_PREFIX, marker)))
    .and_then(NodePrivacyLevel::from_marker);
    for level in [
        NodePrivacyLevel::Hidden,
        NodePrivacyLevel::Mask,
        NodePrivacyLevel::MaskUserInput,
        NodePrivacyLevel::Allow,
    ] {
        if attr_level == Some(level) || class_level == Some(level) {
            return Some(level);
        }
    }

    // Built-in sensitive fields.
    if el.tag_name == "input" {
        let input_type = el.input_type();
        if matches!(input_type.as_str(), "password" | "email" | "tel" | "hidden") {
            return Some(NodePrivacyLevel::Mask);
        }
    }
    if let Some(autocomplete) = el.attribute("autocomplete") {
        let autocomplete = autocomplete.to_ascii_lowercase();
        if autocomplete.starts_with("cc-")
            || autocomplete == "current-password"
            || autocomplete == "new-password"
        {
            return Some(NodePrivacyLevel::Mask);
        }
    }

    if should_ignore_element(dom, node) {
        return Some(NodePrivacyLevel::Ignore);
    }

    None
}

/// Elements that carry no visual information and are left out of recordings.
fn should_ignore_element(dom: &Dom, node: NodeKey) -> bool {
    let Some(el) = dom.element(node) else {
        return false;
    };
    let lower = |name: &str| el.attribute(name).map(|v| v.to_ascii_lowercase());

    match el.tag_name.as_str() {
        "script" => true,
        "link" => {
            let rel = lower("rel").unwrap_or_default();
            (rel == "preload" && lower("as").as_deref() == Some("script"))
                || rel == "modulepreload"
                || rel == "shortcut icon"
                || rel == "icon"
        }
        "meta" => {
            let name = lower("name").unwrap_or_default();
            let property = lower("property").unwrap_or_default();
            let http_equiv = lower("http-equiv").unwrap_or_default();
            const TRACKING_NAMES: [&str; 5] =
                ["robots", "googlebot", "bingbot", "slurp", "yandex"];
            const SOCIAL_PREFIXES: [&str; 6] =
                ["og:", "twitter:", "fb:", "article:", "pinterest", "al:"];
            name.ends_with("verification")
                || TRACKING_NAMES.contains(&name.as_str())
                || SOCIAL_PREFIXES
                    .iter()
                    .any(|p| name.starts_with(p) || property.starts_with(p))
                || name == "keywords"
                || name == "generator"
                || name == "framework"
                || name == "author"
                || http_equiv == "x-dns-prefetch-control"
        }
        _ => false,
    }
}

/// Effective privacy level of `node`.
///
/// Walks the composed parent chain up to the first cached ancestor (or the
/// root, which inherits `default_level`) and resolves downwards, filling the
/// cache when one is given.
pub fn effective_privacy_level(
    dom: &Dom,
    node: NodeKey,
    default_level: NodePrivacyLevel,
    mut cache: Option<&mut PrivacyCache>,
) -> NodePrivacyLevel {
    let mut chain = Vec::new();
    let mut inherited = default_level;
    let mut current = Some(node);
    while let Some(key) = current {
        if let Some(level) = cache.as_deref().and_then(|c| c.get(&key)) {
            inherited = *level;
            break;
        }
        chain.push(key);
        current = dom.composed_parent(key);
    }

    for key in chain.into_iter().rev() {
        inherited = reduce_privacy_level(self_privacy_level(dom, key), inherited);
        if let Some(cache) = cache.as_deref_mut() {
            cache.insert(key, inherited);
        }
    }
    inherited
}

/// Tags whose content is user input.
pub fn is_form_element(tag_name: &str) -> bool {
    matches!(tag_name, "input" | "textarea" | "select" | "option")
}

/// Whether the content of `node` must be masked at `level`.
pub fn should_mask_node(dom: &Dom, node: NodeKey, level: NodePrivacyLevel) -> bool {
    match level {
        NodePrivacyLevel::Mask | NodePrivacyLevel::Hidden | NodePrivacyLevel::Ignore => true,
        NodePrivacyLevel::MaskUserInput => {
            let subject = match dom.kind(node) {
                Some(NodeKind::Text(_)) => dom.parent(node),
                _ => Some(node),
            };
            subject
                .and_then(|n| dom.tag_name(n))
                .map(is_form_element)
                .unwrap_or(false)
        }
        NodePrivacyLevel::Allow => false,
    }
}

/// Replace every non-whitespace character with `x`.
pub fn censor_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { c } else { 'x' })
        .collect()
}

/// A silver placeholder image with the given dimensions.
pub fn censored_image_for_size(width: f64, height: f64) -> String {
    format!(
        "data:image/svg+xml;charset=utf-8,<svg xmlns='http://www.w3.org/2000/svg' width='{}' height='{}' style='background-color:silver'></svg>",
        width.round(),
        height.round()
    )
}
