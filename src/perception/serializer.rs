//! Snapshot serialization for the prompt.
//!
//! Flattens the tree in document order into a JSON payload:
//!
//! ```json
//! {"nodeCount":3,"truncated":false,"omittedNodes":0,"views":[{...},{...},{...}]}
//! ```
//!
//! Each view record carries the identifiers, bounds, class, text,
//! descriptions and operations the resolver needs, plus `depth` and
//! `parentId` so the model can phrase traversal hints. Text fields are
//! clipped to `max_field_chars` and whole records are dropped from the end
//! once `max_payload_chars` is reached.

use std::borrow::Cow;

use serde::Serialize;

use crate::config::SnapshotConfig;
use crate::errors::PilotResult;
use crate::perception::types::{Bounds, FlatNode, RangeInfo, Snapshot};

const ELLIPSIS: char = '\u{2026}';

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    view_id: Option<&'a str>,
    unique_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
    depth: usize,
    bounds: Bounds,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_description: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_description: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint_text: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tooltip_text: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label_for: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    package_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    window_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    range_info: Option<RangeInfo>,
    input_type: i32,
    operations: &'a [String],
}

#[derive(Debug, Clone)]
pub struct SerializedSnapshot {
    pub payload: String,
    pub node_count: usize,
    pub emitted: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct SnapshotSerializer {
    max_nodes: usize,
    max_payload_chars: usize,
    max_field_chars: usize,
}

impl SnapshotSerializer {
    pub fn new(config: &SnapshotConfig) -> Self {
        Self {
            max_nodes: config.max_nodes.max(1),
            max_payload_chars: config.max_payload_chars,
            max_field_chars: config.max_field_chars.max(1),
        }
    }

    /// The payload, envelope included, never exceeds `max_payload_chars`
    /// characters; records that do not fit are dropped from the end.
    pub fn serialize(&self, snapshot: &Snapshot) -> PilotResult<SerializedSnapshot> {
        let flat = snapshot.flatten();
        let node_count = flat.len();

        // widest possible envelope: "false" and every node omitted
        let envelope = render(node_count, false, node_count, &[]).chars().count();
        let budget = self.max_payload_chars.saturating_sub(envelope);

        let mut records: Vec<String> = Vec::new();
        let mut used = 0usize;
        for entry in &flat {
            if records.len() >= self.max_nodes {
                break;
            }
            let record = serde_json::to_string(&self.to_record(entry, &flat))?;
            let separator = usize::from(!records.is_empty());
            let cost = record.chars().count() + separator;
            if used + cost > budget {
                break;
            }
            used += cost;
            records.push(record);
        }

        let emitted = records.len();
        let truncated = emitted < node_count;
        if truncated {
            tracing::debug!(
                node_count,
                emitted,
                max_nodes = self.max_nodes,
                max_chars = self.max_payload_chars,
                "snapshot payload truncated"
            );
        }

        let payload = render(node_count, truncated, node_count - emitted, &records);
        Ok(SerializedSnapshot { payload, node_count, emitted, truncated })
    }

    fn to_record<'a>(&self, entry: &FlatNode<'a>, flat: &[FlatNode<'a>]) -> ViewRecord<'a> {
        let node = entry.node;
        let clipped = |field: &'a Option<String>| field.as_deref().map(|s| clip(s, self.max_field_chars));
        ViewRecord {
            view_id: node.view_id.as_deref(),
            unique_id: &node.unique_id,
            parent_id: entry.parent.map(|p| flat[p].node.unique_id.as_str()),
            depth: entry.depth,
            bounds: node.bounds,
            class_name: node.class_name.as_deref(),
            text: clipped(&node.text),
            content_description: clipped(&node.content_description),
            state_description: clipped(&node.state_description),
            hint_text: clipped(&node.hint_text),
            tooltip_text: clipped(&node.tooltip_text),
            label_for: node.label_for.as_deref(),
            package_name: node.package_name.as_deref(),
            window_id: node.window_id,
            range_info: node.range_info,
            input_type: node.input_type,
            operations: &node.operations,
        }
    }
}

impl Default for SnapshotSerializer {
    fn default() -> Self {
        Self::new(&SnapshotConfig::default())
    }
}

fn render(node_count: usize, truncated: bool, omitted: usize, records: &[String]) -> String {
    format!(
        "{{\"nodeCount\":{},\"truncated\":{},\"omittedNodes\":{},\"views\":[{}]}}",
        node_count,
        truncated,
        omitted,
        records.join(",")
    )
}

/// Cuts `s` to at most `max` characters, the last being an ellipsis.
fn clip(s: &str, max: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max) {
        None => Cow::Borrowed(s),
        Some(_) => {
            let keep = max.saturating_sub(1);
            let cut = s.char_indices().nth(keep).map_or(s.len(), |(i, _)| i);
            let mut out = String::with_capacity(cut + ELLIPSIS.len_utf8());
            out.push_str(&s[..cut]);
            out.push(ELLIPSIS);
            Cow::Owned(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::UiNode;

    fn tree() -> Snapshot {
        let button = UiNode {
            view_id: Some("btn.submit".into()),
            unique_id: "3".into(),
            bounds: Bounds::new(0, 100, 200, 150),
            class_name: Some("android.widget.Button".into()),
            text: Some("Submit \"now\"".into()),
            operations: vec!["click".into(), "focus".into()],
            ..Default::default()
        };
        let field = UiNode {
            view_id: Some("field.name".into()),
            unique_id: "2".into(),
            hint_text: Some("Name".into()),
            operations: vec!["set-text".into()],
            ..Default::default()
        };
        let form = UiNode { unique_id: "1".into(), children: vec![field, button], ..Default::default() };
        let footer = UiNode { unique_id: "4".into(), text: Some("v1.0".into()), ..Default::default() };
        Snapshot::new(UiNode { unique_id: "0".into(), children: vec![form, footer], ..Default::default() })
    }

    fn views(payload: &str) -> Vec<serde_json::Value> {
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        value["views"].as_array().unwrap().clone()
    }

    #[test]
    fn payload_preserves_count_and_document_order() {
        let snapshot = tree();
        let out = SnapshotSerializer::default().serialize(&snapshot).unwrap();
        assert!(!out.truncated);
        let views = views(&out.payload);
        assert_eq!(views.len(), snapshot.flatten().len());
        let ids: Vec<&str> = views.iter().map(|v| v["uniqueId"].as_str().unwrap()).collect();
        let expected: Vec<&str> =
            snapshot.flatten().iter().map(|f| f.node.unique_id.as_str()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn records_carry_resolver_fields() {
        let out = SnapshotSerializer::default().serialize(&tree()).unwrap();
        let views = views(&out.payload);
        let button = &views[3];
        assert_eq!(button["viewId"], "btn.submit");
        assert_eq!(button["parentId"], "1");
        assert_eq!(button["depth"], 2);
        assert_eq!(button["bounds"]["bottom"], 150);
        assert_eq!(button["text"], "Submit \"now\"");
        assert_eq!(button["operations"][0], "click");
        assert!(views[0].get("parentId").is_none());
    }

    #[test]
    fn node_limit_truncates_in_order() {
        let cfg = SnapshotConfig { max_nodes: 2, ..Default::default() };
        let out = SnapshotSerializer::new(&cfg).serialize(&tree()).unwrap();
        assert!(out.truncated);
        assert_eq!(out.emitted, 2);
        let value: serde_json::Value = serde_json::from_str(&out.payload).unwrap();
        assert_eq!(value["omittedNodes"], 3);
        assert_eq!(value["views"][1]["uniqueId"], "1");
    }

    #[test]
    fn char_budget_bounds_payload() {
        let cfg = SnapshotConfig { max_payload_chars: 300, ..Default::default() };
        let out = SnapshotSerializer::new(&cfg).serialize(&tree()).unwrap();
        assert!(out.truncated);
        assert!(out.emitted >= 1);
        assert!(out.payload.chars().count() <= 300);
    }

    #[test]
    fn oversized_node_is_clipped_to_fit() {
        let root = UiNode {
            unique_id: "0".into(),
            text: Some("x".repeat(1_000_000)),
            content_description: Some("\u{e9}".repeat(5_000)),
            ..Default::default()
        };
        let cfg = SnapshotConfig { max_payload_chars: 60_000, max_field_chars: 1_000, ..Default::default() };
        let out = SnapshotSerializer::new(&cfg).serialize(&Snapshot::new(root)).unwrap();
        assert!(out.payload.chars().count() <= 60_000);
        assert!(!out.truncated);
        let views = views(&out.payload);
        let text = views[0]["text"].as_str().unwrap();
        assert_eq!(text.chars().count(), 1_000);
        assert!(text.ends_with('\u{2026}'));
        assert_eq!(views[0]["contentDescription"].as_str().unwrap().chars().count(), 1_000);
    }

    #[test]
    fn record_larger_than_budget_is_omitted() {
        let root = UiNode { unique_id: "0".into(), text: Some("y".repeat(500)), ..Default::default() };
        let cfg = SnapshotConfig { max_payload_chars: 200, ..Default::default() };
        let out = SnapshotSerializer::new(&cfg).serialize(&Snapshot::new(root)).unwrap();
        assert!(out.payload.chars().count() <= 200);
        assert!(out.truncated);
        assert_eq!(out.emitted, 0);
        let value: serde_json::Value = serde_json::from_str(&out.payload).unwrap();
        assert_eq!(value["omittedNodes"], 1);
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("\u{e9}\u{e9}\u{e9}\u{e9}", 3), "\u{e9}\u{e9}\u{2026}");
        assert_eq!(clip("abcd", 4), "abcd");
    }

    #[test]
    fn range_and_label_fields_are_carried() {
        let slider = UiNode {
            unique_id: "5".into(),
            window_id: Some(12),
            tooltip_text: Some("Volume".into()),
            range_info: Some(RangeInfo { current: 30.0, min: 0.0, max: 100.0, kind: 2 }),
            ..Default::default()
        };
        let label = UiNode { unique_id: "4".into(), text: Some("Volume".into()), label_for: Some("5".into()), ..Default::default() };
        let root = UiNode { unique_id: "0".into(), children: vec![label, slider], ..Default::default() };
        let out = SnapshotSerializer::default().serialize(&Snapshot::new(root)).unwrap();
        let views = views(&out.payload);
        assert_eq!(views[1]["labelFor"], "5");
        assert_eq!(views[2]["windowId"], 12);
        assert_eq!(views[2]["tooltipText"], "Volume");
        assert_eq!(views[2]["rangeInfo"]["max"], 100.0);
        assert_eq!(views[2]["rangeInfo"]["type"], 2);
        assert!(views[0].get("rangeInfo").is_none());
    }

    #[test]
    fn serialization_is_deterministic() {
        let snapshot = tree();
        let serializer = SnapshotSerializer::default();
        let a = serializer.serialize(&snapshot).unwrap();
        let b = serializer.serialize(&snapshot).unwrap();
        assert_eq!(a.payload, b.payload);
    }
}
