//! CSS inlining helpers.

use rewind_core::dom::{Dom, SheetKey};
use url::Url;

/// Rewrite relative `url(...)` references in `css_text` to absolute URLs
/// resolved against `base`.
///
/// Absolute (`scheme:`), protocol-relative (`//host`) and `data:` references
/// are kept as written, as are references that fail to resolve.
pub fn switch_to_absolute_url(css_text: &str, base: Option<&str>) -> String {
    let Some(base) = base.and_then(|b| Url::parse(b).ok()) else {
        return css_text.to_string();
    };

    let mut out = String::with_capacity(css_text.len());
    let mut rest = css_text;
    while let Some(start) = rest.find("url(") {
        let (before, after_open) = rest.split_at(start + 4);
        out.push_str(before);

        let Some(end) = after_open.find(')') else {
            out.push_str(after_open);
            return out;
        };
        let inner = &after_open[..end];
        let (quote, reference) = match inner.chars().next() {
            Some(q @ ('\'' | '"')) if inner.len() >= 2 && inner.ends_with(q) => {
                (Some(q), &inner[1..inner.len() - 1])
            }
            _ => (None, inner),
        };

        match absolute_reference(reference, &base) {
            Some(absolute) => {
                if let Some(q) = quote {
                    out.push(q);
                    out.push_str(&absolute);
                    out.push(q);
                } else {
                    out.push_str(&absolute);
                }
            }
            None => out.push_str(inner),
        }
        out.push(')');
        rest = &after_open[end + 1..];
    }
    out.push_str(rest);
    out
}

fn absolute_reference(reference: &str, base: &Url) -> Option<String> {
    if reference.is_empty() || is_absolute(reference) {
        return None;
    }
    base.join(reference).ok().map(String::from)
}

fn is_absolute(reference: &str) -> bool {
    if reference.starts_with("//") {
        return true;
    }
    // `scheme:` prefix, `data:` included.
    match reference.find(':') {
        Some(colon) if colon > 0 => reference[..colon]
            .chars()
            .all(|c| c.is_ascii_alphabetic()),
        _ => false,
    }
}

/// Resolved text of a stylesheet with absolute `url()` references, or
/// `None` when the sheet is unknown or empty.
pub fn stylesheet_css_text(dom: &Dom, sheet: SheetKey) -> Option<String> {
    let text = dom.sheet_css_text(sheet)?;
    if text.is_empty() {
        return None;
    }
    let base = dom
        .sheet(sheet)
        .and_then(|s| s.href.as_deref())
        .unwrap_or_else(|| dom.base_url());
    Some(switch_to_absolute_url(&text, Some(base)))
}
