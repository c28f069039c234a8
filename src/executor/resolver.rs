//! Action resolution against the current snapshot.
//!
//! The model reasoned over a snapshot that may already be stale, so every
//! action is mapped onto the snapshot taken just before it runs:
//!
//! 1. `ViewId`: all nodes sharing the identifier; several matches are
//!    disambiguated by the unique id, otherwise resolution fails.
//! 2. `Traversal`: find the landmark by unique id, then search its
//!    descendants (breadth-first) or ancestors (nearest first) for a node
//!    supporting the operation, falling back to the first child / direct parent.
//! 3. `Bounds`: exact rectangle, else the smallest node containing its centre.
//! 4. `navigate`: no node; resolves to a global action or an app launch.

use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::actions::{
    ActionArgument, ActionTarget, ActionType, DeviceAction, NavigationType, TraversalDirection,
    TraversalHint,
};
use crate::perception::types::{Bounds, FlatNode, Snapshot, UiNode};

/// Reference to a node, valid only within the snapshot it was resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub unique_id: String,
    pub view_id: Option<String>,
    pub bounds: Bounds,
    pub class_name: Option<String>,
}

impl From<&UiNode> for NodeRef {
    fn from(node: &UiNode) -> Self {
        Self {
            unique_id: node.unique_id.clone(),
            view_id: node.view_id.clone(),
            bounds: node.bounds,
            class_name: node.class_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalAction {
    Back,
    Home,
    Notifications,
    Recents,
    DismissNotifications,
    TakeScreenshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedAction {
    Node {
        node: NodeRef,
        operation: ActionType,
        argument: ActionArgument,
    },
    Global(GlobalAction),
    LaunchApp { package_name: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no screen snapshot available")]
    NoSnapshot,

    #[error("no node matches {0}")]
    NotFound(String),

    #[error("{candidates} nodes share view id `{view_id}` and the unique id does not single one out")]
    Ambiguous { view_id: String, candidates: usize },

    #[error("malformed {field}: `{value}`")]
    MalformedTarget { field: String, value: String },

    #[error("`{0}` needs a target node")]
    MissingTarget(ActionType),

    #[error("`{action}` expects an argument of the form {expected}, got `{argument}`")]
    InvalidArgument {
        action: ActionType,
        argument: String,
        expected: &'static str,
    },

    #[error("unsupported action type `{0}`")]
    UnsupportedAction(String),

    #[error("unsupported navigation type `{0}`")]
    UnsupportedNavigation(String),

    #[error("open-app needs a package name")]
    MissingPackageName,
}

fn pair_regex() -> &'static Regex {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    PAIR.get_or_init(|| Regex::new(r"^\s*(\d+)\s*-\s*(\d+)\s*$").expect("pair regex is valid"))
}

fn parse_pair(raw: &str) -> Option<(u32, u32)> {
    let caps = pair_regex().captures(raw)?;
    let a = caps.get(1)?.as_str().parse().ok()?;
    let b = caps.get(2)?.as_str().parse().ok()?;
    Some((a, b))
}

/// Validates the argument shape for the action type.
pub fn parse_argument(action: &ActionType, raw: &str) -> Result<ActionArgument, ResolveError> {
    let invalid = |expected| ResolveError::InvalidArgument {
        action: action.clone(),
        argument: raw.to_string(),
        expected,
    };
    match action {
        ActionType::SetText => Ok(ActionArgument::Text { text: raw.to_string() }),
        ActionType::SetSelection => parse_pair(raw)
            .map(|(start, end)| ActionArgument::Selection { start, end })
            .ok_or_else(|| invalid("\"start-end\"")),
        ActionType::ScrollToPosition => parse_pair(raw)
            .map(|(row, column)| ActionArgument::Position { row, column })
            .ok_or_else(|| invalid("\"row-column\"")),
        _ => {
            if !raw.is_empty() {
                tracing::debug!(action = %action, argument = raw, "argument ignored for action");
            }
            Ok(ActionArgument::None)
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ActionResolver;

impl ActionResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(
        &self,
        action: &DeviceAction,
        snapshot: Option<&Snapshot>,
    ) -> Result<ResolvedAction, ResolveError> {
        match &action.action_type {
            ActionType::Unsupported(raw) => {
                return Err(ResolveError::UnsupportedAction(raw.clone()))
            }
            ActionType::Navigate => return resolve_navigation(action),
            _ => {}
        }

        let argument = parse_argument(&action.action_type, &action.argument)?;
        let snapshot = snapshot.ok_or(ResolveError::NoSnapshot)?;
        let flat = snapshot.flatten();
        let operation = action.action_type.as_str();

        let node = match &action.target {
            ActionTarget::ViewId { view_id, unique_id } => {
                by_view_id(&flat, view_id, unique_id.as_deref())?
            }
            ActionTarget::Traversal(hint) => by_traversal(&flat, hint, operation)?,
            ActionTarget::Bounds(bounds) => by_bounds(&flat, bounds)?,
            ActionTarget::UniqueId(id) => flat
                .iter()
                .find(|f| f.node.unique_id == *id)
                .map(|f| f.node)
                .ok_or_else(|| ResolveError::NotFound(format!("unique id `{id}`")))?,
            ActionTarget::Malformed { field, value } => {
                return Err(ResolveError::MalformedTarget {
                    field: field.clone(),
                    value: value.clone(),
                })
            }
            ActionTarget::None => {
                return Err(ResolveError::MissingTarget(action.action_type.clone()))
            }
        };

        tracing::debug!(
            action = %action.action_type,
            unique_id = %node.unique_id,
            view_id = ?node.view_id,
            "action resolved"
        );
        Ok(ResolvedAction::Node {
            node: NodeRef::from(node),
            operation: action.action_type.clone(),
            argument,
        })
    }
}

fn resolve_navigation(action: &DeviceAction) -> Result<ResolvedAction, ResolveError> {
    let navigation = action
        .navigation
        .clone()
        .unwrap_or_else(|| NavigationType::Unsupported(String::new()));
    let global = match navigation {
        NavigationType::Back => GlobalAction::Back,
        NavigationType::Home => GlobalAction::Home,
        NavigationType::Notifications => GlobalAction::Notifications,
        NavigationType::Recents => GlobalAction::Recents,
        NavigationType::DismissNotifications => GlobalAction::DismissNotifications,
        NavigationType::TakeScreenshot => GlobalAction::TakeScreenshot,
        NavigationType::OpenApp => {
            let package_name = action.package_name.trim();
            if package_name.is_empty() {
                return Err(ResolveError::MissingPackageName);
            }
            return Ok(ResolvedAction::LaunchApp { package_name: package_name.to_string() });
        }
        NavigationType::Unsupported(raw) => return Err(ResolveError::UnsupportedNavigation(raw)),
    };
    Ok(ResolvedAction::Global(global))
}

fn by_view_id<'a>(
    flat: &[FlatNode<'a>],
    view_id: &str,
    unique_id: Option<&str>,
) -> Result<&'a UiNode, ResolveError> {
    let candidates: Vec<&'a UiNode> = flat
        .iter()
        .filter(|f| f.node.view_id.as_deref() == Some(view_id))
        .map(|f| f.node)
        .collect();

    match candidates.as_slice() {
        [] => Err(ResolveError::NotFound(format!("view id `{view_id}`"))),
        [only] => Ok(*only),
        many => unique_id
            .and_then(|uid| many.iter().copied().find(|n| n.unique_id == uid))
            .ok_or_else(|| ResolveError::Ambiguous {
                view_id: view_id.to_string(),
                candidates: many.len(),
            }),
    }
}

fn by_traversal<'a>(
    flat: &[FlatNode<'a>],
    hint: &TraversalHint,
    operation: &str,
) -> Result<&'a UiNode, ResolveError> {
    let landmark = flat
        .iter()
        .position(|f| f.node.unique_id == hint.node_id)
        .ok_or_else(|| ResolveError::NotFound(format!("landmark `{}`", hint.node_id)))?;

    match hint.direction {
        TraversalDirection::Child => {
            let root = flat[landmark].node;
            let mut queue: VecDeque<&'a UiNode> = root.children.iter().collect();
            while let Some(node) = queue.pop_front() {
                if node.supports(operation) {
                    return Ok(node);
                }
                queue.extend(node.children.iter());
            }
            root.children
                .first()
                .ok_or_else(|| ResolveError::NotFound(format!("child of `{}`", hint.node_id)))
        }
        TraversalDirection::Parent => {
            let direct = flat[landmark].parent;
            let mut cursor = direct;
            while let Some(idx) = cursor {
                if flat[idx].node.supports(operation) {
                    return Ok(flat[idx].node);
                }
                cursor = flat[idx].parent;
            }
            direct
                .map(|idx| flat[idx].node)
                .ok_or_else(|| ResolveError::NotFound(format!("parent of `{}`", hint.node_id)))
        }
    }
}

fn by_bounds<'a>(flat: &[FlatNode<'a>], bounds: &Bounds) -> Result<&'a UiNode, ResolveError> {
    if let Some(exact) = flat.iter().find(|f| f.node.bounds == *bounds) {
        return Ok(exact.node);
    }
    let (cx, cy) = bounds.center();
    flat.iter()
        .filter(|f| f.node.bounds.contains(cx, cy))
        // smallest area wins; on ties the deeper node
        .min_by_key(|f| (f.node.bounds.area(), std::cmp::Reverse(f.depth)))
        .map(|f| f.node)
        .ok_or_else(|| ResolveError::NotFound(format!("bounds {bounds:?}")))
}
