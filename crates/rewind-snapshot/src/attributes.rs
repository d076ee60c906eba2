//! Attribute redaction and form value extraction.

use rewind_core::dom::{Dom, NodeKey};
use rewind_core::privacy::{
    censored_image_for_size, should_mask_node, NodePrivacyLevel, CENSORED_IMG_MARK,
    CENSORED_STRING_MARK, PRIVACY_ATTR_NAME,
};

/// Attributes used by tests and tooling to locate elements. Kept as is even
/// under `Mask`.
pub const STABLE_ATTRIBUTES: [&str; 11] = [
    "data-rw-action-name",
    "data-testid",
    "data-test",
    "data-qa",
    "data-cy",
    "data-test-id",
    "data-qa-id",
    "data-testing",
    "data-component",
    "data-element",
    "data-source-file",
];

/// Attribute values longer than this are candidates for truncation.
pub const MAX_ATTRIBUTE_VALUE_CHAR_LENGTH: usize = 100_000;

/// Serialized value of attribute `name` of `node` at `level`.
///
/// `None` when the node has no such attribute.
pub fn serialize_attribute(
    dom: &Dom,
    node: NodeKey,
    level: NodePrivacyLevel,
    name: &str,
) -> Option<String> {
    let el = dom.element(node)?;
    let value = el.attribute(name)?;

    if level == NodePrivacyLevel::Mask
        && name != PRIVACY_ATTR_NAME
        && !STABLE_ATTRIBUTES.contains(&name)
    {
        let tag = el.tag_name.as_str();
        if matches!(name, "title" | "alt" | "placeholder") {
            return Some(CENSORED_STRING_MARK.to_string());
        }
        if tag == "img" && matches!(name, "src" | "srcset") {
            if let Some(natural) = el.natural_size.filter(|s| s.width > 0.0) {
                return Some(censored_image_for_size(natural.width, natural.height));
            }
            if el.rect.width > 0.0 || el.rect.height > 0.0 {
                return Some(censored_image_for_size(el.rect.width, el.rect.height));
            }
            return Some(CENSORED_IMG_MARK.to_string());
        }
        if tag == "source" && matches!(name, "src" | "srcset") {
            return Some(CENSORED_IMG_MARK.to_string());
        }
        if tag == "a" && name == "href" {
            return Some(CENSORED_STRING_MARK.to_string());
        }
        if !value.is_empty() && name.starts_with("data-") {
            return Some(CENSORED_STRING_MARK.to_string());
        }
        if tag == "iframe" && name == "srcdoc" {
            return Some(CENSORED_STRING_MARK.to_string());
        }
    }

    Some(truncate_long_data_url(value))
}

/// Shorten data URLs above the size limit to their header followed by
/// `truncated`. Other values are returned unchanged.
pub fn truncate_long_data_url(value: &str) -> String {
    if value.len() > MAX_ATTRIBUTE_VALUE_CHAR_LENGTH && value.starts_with("data:") {
        if let Some(comma) = value.find(',') {
            return format!("{}truncated", &value[..=comma]);
        }
    }
    value.to_string()
}

/// Value of a form control as it may be recorded at `level`.
///
/// The live value wins over the `value` attribute. Masked controls yield the
/// censor marker, except buttons whose label is kept. Empty masked values
/// and masked options yield nothing.
pub fn element_input_value(dom: &Dom, node: NodeKey, level: NodePrivacyLevel) -> Option<String> {
    let el = dom.element(node)?;
    let tag = el.tag_name.as_str();
    let value = el.form.value.as_deref().or_else(|| el.attribute("value"));

    if should_mask_node(dom, node, level) {
        if tag == "input" && matches!(el.input_type().as_str(), "button" | "submit" | "reset") {
            return value.map(str::to_string);
        }
        return match value {
            Some(v) if !v.is_empty() && tag != "option" => Some(CENSORED_STRING_MARK.to_string()),
            _ => None,
        };
    }

    match tag {
        "option" | "select" | "input" | "textarea" => value.map(str::to_string),
        _ => None,
    }
}
