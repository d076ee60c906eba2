//! Form control values.

use rewind_core::dom::{Dom, NodeKey};
use rewind_core::privacy::{effective_privacy_level, should_mask_node, NodePrivacyLevel};
use rewind_core::record::InputData;
use rewind_snapshot::{element_input_value, RecordingContext};
use slotmap::SecondaryMap;

#[derive(Clone, Debug, PartialEq, Eq)]
enum InputState {
    Text(String),
    Checked(bool),
}

/// Input tracker of one scope. Remembers the last emitted state per
/// element and only reports changes.
#[derive(Debug, Default)]
pub struct InputTracker {
    last_states: SecondaryMap<NodeKey, InputState>,
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle an `input`/`change` event on `target` inside the tree rooted
    /// at `root`.
    ///
    /// Checking a radio also reports the other radios of its group within
    /// `root` as unchecked.
    pub fn on_input(
        &mut self,
        dom: &Dom,
        ctx: &RecordingContext,
        root: NodeKey,
        target: NodeKey,
        default_level: NodePrivacyLevel,
    ) -> Vec<InputData> {
        let mut emitted = Vec::new();
        let Some(element) = dom.element(target) else {
            return emitted;
        };
        if !matches!(element.tag_name.as_str(), "input" | "textarea" | "select") {
            return emitted;
        }
        let level = effective_privacy_level(dom, target, default_level, None);
        if level == NodePrivacyLevel::Hidden {
            return emitted;
        }

        let input_type = element.input_type();
        let is_toggle = element.tag_name == "input" && matches!(input_type.as_str(), "radio" | "checkbox");
        let state = if is_toggle {
            if should_mask_node(dom, target, level) {
                return emitted;
            }
            InputState::Checked(element.form.checked)
        } else {
            match element_input_value(dom, target, level) {
                Some(value) => InputState::Text(value),
                None => return emitted,
            }
        };
        self.emit(ctx, target, state, &mut emitted);

        if input_type == "radio" && element.form.checked {
            if let Some(name) = element.attribute("name") {
                for other in radio_group(dom, root, name) {
                    if other == target {
                        continue;
                    }
                    let other_level = effective_privacy_level(dom, other, default_level, None);
                    if should_mask_node(dom, other, other_level) {
                        continue;
                    }
                    self.emit(ctx, other, InputState::Checked(false), &mut emitted);
                }
            }
        }
        emitted
    }

    pub fn clear(&mut self) {
        self.last_states.clear();
    }

    fn emit(&mut self, ctx: &RecordingContext, node: NodeKey, state: InputState, out: &mut Vec<InputData>) {
        let Some(id) = ctx.ids.get(node) else {
            return;
        };
        if self.last_states.get(node) == Some(&state) {
            return;
        }
        self.last_states.insert(node, state.clone());
        out.push(match state {
            InputState::Text(text) => InputData {
                id,
                text: Some(text),
                is_checked: None,
            },
            InputState::Checked(checked) => InputData {
                id,
                text: None,
                is_checked: Some(checked),
            },
        });
    }
}

fn radio_group(dom: &Dom, root: NodeKey, name: &str) -> Vec<NodeKey> {
    dom.descendants(root)
        .into_iter()
        .filter(|node| {
            dom.element(*node).is_some_and(|el| {
                el.tag_name == "input" && el.input_type() == "radio" && el.attribute("name") == Some(name)
            })
        })
        .collect()
}
