//! Serialized node and record types.
//!
//! Every variant is a closed sum type so consumers match exhaustively. The
//! serde representation is internally tagged (`type` for records and nodes,
//! `source` for incremental snapshots) so a decoded segment is
//! self-describing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier assigned to a serialized node, stable for the node's lifetime.
pub type NodeId = u64;

/// Milliseconds since the Unix epoch (or any host-chosen origin).
pub type TimeStamp = u64;

/// Identifier of a record that frustration signals can point back to.
pub type RecordId = u64;

/// Attribute map of a serialized element. `None` means "removed".
pub type Attributes = BTreeMap<String, Option<String>>;

fn is_false(value: &bool) -> bool {
    !*value
}

/// A node of a serialized tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: SerializedNodeKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SerializedNodeKind {
    Document {
        child_nodes: Vec<SerializedNode>,
    },
    DocumentFragment {
        is_shadow_root: bool,
        child_nodes: Vec<SerializedNode>,
    },
    DocumentType {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element {
        tag_name: String,
        attributes: Attributes,
        child_nodes: Vec<SerializedNode>,
        #[serde(default, skip_serializing_if = "is_false")]
        is_svg: bool,
    },
    Text {
        text_content: String,
        #[serde(default, skip_serializing_if = "is_false")]
        is_style: bool,
    },
    #[serde(rename = "cdata")]
    CData,
}

impl SerializedNode {
    /// Children of container nodes, empty for leaves.
    pub fn child_nodes(&self) -> &[SerializedNode] {
        match &self.kind {
            SerializedNodeKind::Document { child_nodes }
            | SerializedNodeKind::DocumentFragment { child_nodes, .. }
            | SerializedNodeKind::Element { child_nodes, .. } => child_nodes,
            _ => &[],
        }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match &self.kind {
            SerializedNodeKind::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    /// Depth-first iterator over this node and its descendants.
    pub fn walk(&self) -> Vec<&SerializedNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.child_nodes().iter().rev());
        }
        out
    }
}

// ============================================================================
// Mutation payload
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddedNodeMutation {
    pub parent_id: NodeId,
    pub next_id: Option<NodeId>,
    pub node: SerializedNode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedNodeMutation {
    pub parent_id: NodeId,
    pub id: NodeId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMutation {
    pub id: NodeId,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMutation {
    pub id: NodeId,
    pub attributes: Attributes,
}

/// One consolidated batch of tree changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationData {
    pub adds: Vec<AddedNodeMutation>,
    pub removes: Vec<RemovedNodeMutation>,
    pub texts: Vec<TextMutation>,
    pub attributes: Vec<AttributeMutation>,
}

impl MutationData {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty()
            && self.removes.is_empty()
            && self.texts.is_empty()
            && self.attributes.is_empty()
    }
}

// ============================================================================
// Incremental payloads
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MousePosition {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub time_offset: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MouseMoveData {
    pub positions: Vec<MousePosition>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseInteractionType {
    MouseUp,
    MouseDown,
    Click,
    ContextMenu,
    DblClick,
    Focus,
    Blur,
    TouchStart,
    TouchEnd,
}

impl MouseInteractionType {
    /// Focus and blur carry no pointer coordinates.
    pub fn has_coordinates(&self) -> bool {
        !matches!(self, MouseInteractionType::Focus | MouseInteractionType::Blur)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MouseInteractionData {
    #[serde(rename = "type")]
    pub kind: MouseInteractionType,
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrollData {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportResizeData {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputData {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_checked: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaInteractionType {
    Play,
    Pause,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInteractionData {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: MediaInteractionType,
}

/// Position of a rule: a flat index for top-level rules, a path through
/// grouping rules otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleIndex {
    Flat(usize),
    Path(Vec<usize>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSheetAddRule {
    pub rule: String,
    pub index: RuleIndex,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSheetDeleteRule {
    pub index: RuleIndex,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSheetRuleData {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adds: Option<Vec<StyleSheetAddRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removes: Option<Vec<StyleSheetDeleteRule>>,
}

/// Payload of an incremental snapshot, tagged by `source`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum IncrementalData {
    Mutation(MutationData),
    MouseMove(MouseMoveData),
    TouchMove(MouseMoveData),
    MouseInteraction(MouseInteractionData),
    Scroll(ScrollData),
    ViewportResize(ViewportResizeData),
    Input(InputData),
    MediaInteraction(MediaInteractionData),
    StyleSheetRule(StyleSheetRuleData),
}

impl IncrementalData {
    pub fn source_name(&self) -> &'static str {
        match self {
            IncrementalData::Mutation(_) => "mutation",
            IncrementalData::MouseMove(_) => "mouse_move",
            IncrementalData::TouchMove(_) => "touch_move",
            IncrementalData::MouseInteraction(_) => "mouse_interaction",
            IncrementalData::Scroll(_) => "scroll",
            IncrementalData::ViewportResize(_) => "viewport_resize",
            IncrementalData::Input(_) => "input",
            IncrementalData::MediaInteraction(_) => "media_interaction",
            IncrementalData::StyleSheetRule(_) => "style_sheet_rule",
        }
    }
}

// ============================================================================
// Top-level records
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub top: f64,
    pub left: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FullSnapshotData {
    pub node: SerializedNode,
    pub initial_offset: ScrollPosition,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    pub href: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusData {
    pub has_focus: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualViewportData {
    pub scale: f64,
    pub offset_left: f64,
    pub offset_top: f64,
    pub page_left: f64,
    pub page_top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrustrationType {
    RageClick,
    DeadClick,
    ErrorClick,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrustrationData {
    pub frustration_types: Vec<FrustrationType>,
    pub record_ids: Vec<RecordId>,
}

/// A timestamped entry of the replay stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    FullSnapshot {
        timestamp: TimeStamp,
        data: FullSnapshotData,
    },
    IncrementalSnapshot {
        timestamp: TimeStamp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RecordId>,
        data: IncrementalData,
    },
    Meta {
        timestamp: TimeStamp,
        data: MetaData,
    },
    Focus {
        timestamp: TimeStamp,
        data: FocusData,
    },
    ViewEnd {
        timestamp: TimeStamp,
    },
    VisualViewport {
        timestamp: TimeStamp,
        data: VisualViewportData,
    },
    Frustration {
        timestamp: TimeStamp,
        data: FrustrationData,
    },
}

impl Record {
    /// Build an incremental snapshot record without a record id.
    pub fn incremental(timestamp: TimeStamp, data: IncrementalData) -> Self {
        Record::IncrementalSnapshot {
            timestamp,
            id: None,
            data,
        }
    }

    pub fn timestamp(&self) -> TimeStamp {
        match self {
            Record::FullSnapshot { timestamp, .. }
            | Record::IncrementalSnapshot { timestamp, .. }
            | Record::Meta { timestamp, .. }
            | Record::Focus { timestamp, .. }
            | Record::ViewEnd { timestamp }
            | Record::VisualViewport { timestamp, .. }
            | Record::Frustration { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_full_snapshot(&self) -> bool {
        matches!(self, Record::FullSnapshot { .. })
    }

    /// Short label used by statistics and tooling.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Record::FullSnapshot { .. } => "full_snapshot",
            Record::IncrementalSnapshot { data, .. } => data.source_name(),
            Record::Meta { .. } => "meta",
            Record::Focus { .. } => "focus",
            Record::ViewEnd { .. } => "view_end",
            Record::VisualViewport { .. } => "visual_viewport",
            Record::Frustration { .. } => "frustration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = Record::incremental(
            42,
            IncrementalData::Input(InputData {
                id: 7,
                text: Some("***".into()),
                is_checked: None,
            }),
        );
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "incremental_snapshot");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["data"]["source"], "input");
        assert_eq!(json["data"]["text"], "***");
        assert!(json["data"].get("is_checked").is_none());
    }

    #[test]
    fn test_serialized_node_roundtrip() {
        let mut attributes = Attributes::new();
        attributes.insert("class".into(), Some("a".into()));
        let node = SerializedNode {
            id: 1,
            kind: SerializedNodeKind::Element {
                tag_name: "div".into(),
                attributes,
                child_nodes: vec![SerializedNode {
                    id: 2,
                    kind: SerializedNodeKind::Text {
                        text_content: "hi".into(),
                        is_style: false,
                    },
                }],
                is_svg: false,
            },
        };

        let json = serde_json::to_string(&node).unwrap();
        let decoded: SerializedNode = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, node);
        assert_eq!(node.walk().len(), 2);
    }

    #[test]
    fn test_rule_index_untagged() {
        let flat = serde_json::to_string(&RuleIndex::Flat(3)).unwrap();
        let path = serde_json::to_string(&RuleIndex::Path(vec![1, 0])).unwrap();
        assert_eq!(flat, "3");
        assert_eq!(path, "[1,0]");
    }

    #[test]
    fn test_mouse_interaction_coordinates() {
        assert!(MouseInteractionType::Click.has_coordinates());
        assert!(!MouseInteractionType::Blur.has_coordinates());
    }
}
