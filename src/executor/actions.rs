use std::fmt;

use serde::{Deserialize, Serialize};

use crate::perception::types::Bounds;

/// Node operations and the navigate pseudo-action.
///
/// `as_str()` is the operation name handed to the device backend and matched
/// against `UiNode::operations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Focus,
    ClearFocus,
    ClearSelection,
    Click,
    LongClick,
    Collapse,
    Expand,
    ContextClick,
    Copy,
    Cut,
    Paste,
    Dismiss,
    ScrollBackward,
    ScrollForward,
    ScrollToPosition,
    ShowOnScreen,
    PageUp,
    PageDown,
    PageLeft,
    PageRight,
    Select,
    SetSelection,
    SetText,
    ImeEnter,
    Navigate,
    /// A name the model produced that is not in the vocabulary.
    Unsupported(String),
}

impl ActionType {
    /// Accepts `set-text`, `set_text`, `SET_TEXT` and `ACTION_SET_TEXT`.
    pub fn parse(raw: &str) -> Self {
        let norm = normalize(raw, "action-");
        match norm.as_str() {
            "focus" | "accessibility-focus" => Self::Focus,
            "clear-focus" | "clear-accessibility-focus" => Self::ClearFocus,
            "clear-selection" => Self::ClearSelection,
            "click" | "tap" => Self::Click,
            "long-click" | "long-press" => Self::LongClick,
            "collapse" => Self::Collapse,
            "expand" => Self::Expand,
            "context-click" => Self::ContextClick,
            "copy" => Self::Copy,
            "cut" => Self::Cut,
            "paste" => Self::Paste,
            "dismiss" => Self::Dismiss,
            "scroll-backward" => Self::ScrollBackward,
            "scroll-forward" => Self::ScrollForward,
            "scroll-to-position" => Self::ScrollToPosition,
            "show-on-screen" => Self::ShowOnScreen,
            "page-up" => Self::PageUp,
            "page-down" => Self::PageDown,
            "page-left" => Self::PageLeft,
            "page-right" => Self::PageRight,
            "select" => Self::Select,
            "set-selection" => Self::SetSelection,
            "set-text" | "type-text" => Self::SetText,
            "ime-enter" => Self::ImeEnter,
            "navigate" => Self::Navigate,
            _ => Self::Unsupported(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Focus => "focus",
            Self::ClearFocus => "clear-focus",
            Self::ClearSelection => "clear-selection",
            Self::Click => "click",
            Self::LongClick => "long-click",
            Self::Collapse => "collapse",
            Self::Expand => "expand",
            Self::ContextClick => "context-click",
            Self::Copy => "copy",
            Self::Cut => "cut",
            Self::Paste => "paste",
            Self::Dismiss => "dismiss",
            Self::ScrollBackward => "scroll-backward",
            Self::ScrollForward => "scroll-forward",
            Self::ScrollToPosition => "scroll-to-position",
            Self::ShowOnScreen => "show-on-screen",
            Self::PageUp => "page-up",
            Self::PageDown => "page-down",
            Self::PageLeft => "page-left",
            Self::PageRight => "page-right",
            Self::Select => "select",
            Self::SetSelection => "set-selection",
            Self::SetText => "set-text",
            Self::ImeEnter => "ime-enter",
            Self::Navigate => "navigate",
            Self::Unsupported(raw) => raw,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device-wide navigation targets of a `navigate` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationType {
    Back,
    Home,
    Notifications,
    Recents,
    DismissNotifications,
    TakeScreenshot,
    OpenApp,
    Unsupported(String),
}

impl NavigationType {
    /// Accepts short names and the `GLOBAL_ACTION_*` / `open_app` spelling.
    pub fn parse(raw: &str) -> Self {
        let norm = normalize(raw, "global-action-");
        match norm.as_str() {
            "back" => Self::Back,
            "home" => Self::Home,
            "notifications" | "open-notifications" => Self::Notifications,
            "recents" | "open-recents" => Self::Recents,
            "dismiss-notification-shade" | "dismiss-notifications" => Self::DismissNotifications,
            "take-screenshot" | "screenshot" => Self::TakeScreenshot,
            "open-app" | "launch-app" => Self::OpenApp,
            _ => Self::Unsupported(raw.trim().to_string()),
        }
    }
}

fn normalize(raw: &str, prefix: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase().replace(['_', ' '], "-");
    match lowered.strip_prefix(prefix) {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    Child,
    Parent,
}

/// "Near this landmark": `child-<uniqueId>` or `parent-<uniqueId>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalHint {
    pub direction: TraversalDirection,
    pub node_id: String,
}

impl TraversalHint {
    pub fn parse(raw: &str) -> Option<Self> {
        let (direction, node_id) = raw.trim().split_once('-')?;
        let direction = match direction.to_ascii_lowercase().as_str() {
            "child" | "children" => TraversalDirection::Child,
            "parent" | "ancestor" => TraversalDirection::Parent,
            _ => return None,
        };
        let node_id = node_id.trim();
        if node_id.is_empty() {
            return None;
        }
        Some(Self { direction, node_id: node_id.to_string() })
    }
}

/// How the resolver locates the node for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    ViewId { view_id: String, unique_id: Option<String> },
    Traversal(TraversalHint),
    Bounds(Bounds),
    UniqueId(String),
    /// A target field was present but could not be read.
    Malformed { field: String, value: String },
    None,
}

/// One abstract instruction produced by the decoder and consumed once by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAction {
    pub action_type: ActionType,
    pub target: ActionTarget,
    /// Action-specific; validated by the resolver before dispatch.
    pub argument: String,
    pub navigation: Option<NavigationType>,
    pub package_name: String,
}

impl DeviceAction {
    pub fn new(action_type: ActionType, target: ActionTarget) -> Self {
        Self {
            action_type,
            target,
            argument: String::new(),
            navigation: None,
            package_name: String::new(),
        }
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = argument.into();
        self
    }

    pub fn navigate(navigation: NavigationType, package_name: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::Navigate,
            target: ActionTarget::None,
            argument: String::new(),
            navigation: Some(navigation),
            package_name: package_name.into(),
        }
    }
}

/// Validated argument of a node action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionArgument {
    None,
    Text { text: String },
    Selection { start: u32, end: u32 },
    Position { row: u32, column: u32 },
}
