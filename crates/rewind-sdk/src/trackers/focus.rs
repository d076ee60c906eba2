//! Window focus.

use rewind_core::dom::Dom;
use rewind_core::record::FocusData;

/// Current focus state of the window.
pub fn focus_data(dom: &Dom) -> FocusData {
    FocusData {
        has_focus: dom.window().has_focus,
    }
}
