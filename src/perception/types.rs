use serde::{Deserialize, Serialize};

/// Screen rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Midpoint, computed wide so that model-supplied extremes cannot overflow.
    pub fn center(&self) -> (i32, i32) {
        (midpoint(self.left, self.right), midpoint(self.top, self.bottom))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Zero for empty or inverted rectangles.
    pub fn area(&self) -> i64 {
        let w = (self.right as i64 - self.left as i64).max(0);
        let h = (self.bottom as i64 - self.top as i64).max(0);
        w.saturating_mul(h)
    }
}

fn midpoint(a: i32, b: i32) -> i32 {
    // the mean of two i32 values always fits back into i32
    ((a as i64 + b as i64) / 2) as i32
}

/// Value range of a slider, progress bar or rating control.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeInfo {
    pub current: f32,
    pub min: f32,
    pub max: f32,
    /// Platform range type: 0 int, 1 float, 2 percent.
    #[serde(rename = "type", default)]
    pub kind: i32,
}

/// One element of the screen tree.
///
/// `unique_id` is scoped to the snapshot that produced it and must be
/// re-resolved against every new snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,
    pub unique_id: String,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip_text: Option<String>,
    /// Unique id of the node this one labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_info: Option<RangeInfo>,
    #[serde(default)]
    pub input_type: i32,
    /// Operation names the platform reports as available, e.g. "click".
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn supports(&self, operation: &str) -> bool {
        self.operations.iter().any(|op| op == operation)
    }
}

/// A node visited during pre-order flattening, with a link to its parent's
/// position in the same flattened list.
#[derive(Debug, Clone, Copy)]
pub struct FlatNode<'a> {
    pub node: &'a UiNode,
    pub parent: Option<usize>,
    pub depth: usize,
}

/// One immutable capture of the screen tree.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: uuid::Uuid,
    pub captured_at: chrono::DateTime<chrono::Utc>,
    root: UiNode,
}

impl Snapshot {
    pub fn new(root: UiNode) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            captured_at: chrono::Utc::now(),
            root,
        }
    }

    pub fn root(&self) -> &UiNode {
        &self.root
    }

    /// Pre-order traversal with an explicit stack, so arbitrarily deep trees
    /// cannot overflow the call stack.
    pub fn flatten(&self) -> Vec<FlatNode<'_>> {
        let mut out = Vec::new();
        let mut stack: Vec<(&UiNode, Option<usize>, usize)> = vec![(&self.root, None, 0)];
        while let Some((node, parent, depth)) = stack.pop() {
            let index = out.len();
            out.push(FlatNode { node, parent, depth });
            for child in node.children.iter().rev() {
                stack.push((child, Some(index), depth + 1));
            }
        }
        out
    }
}
