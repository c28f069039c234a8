//! Model reply decoding.
//!
//! The reply is expected to be one JSON object:
//!
//! ```json
//! {"responseType": "Action", "text": "Okay.", "actions": [{"type": "click", "targetId": "btn.submit"}]}
//! ```
//!
//! Markdown code fences and prose around the object are tolerated. A missing
//! or non-string `responseType`/`text` is a decode failure; everything inside
//! an action element is lenient and defaults to empty.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::executor::actions::{
    ActionTarget, ActionType, DeviceAction, NavigationType, TraversalHint,
};
use crate::perception::types::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    Summarize,
    Action,
    Answer,
    Error,
}

impl ResponseKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "summarize" | "summary" => Some(Self::Summarize),
            "action" => Some(Self::Action),
            "answer" => Some(Self::Answer),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Decoded model output. Only `Action` responses carry actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenResponse {
    pub kind: ResponseKind,
    pub text: String,
    pub actions: Vec<DeviceAction>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("malformed JSON: {0}")]
    Malformed(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown responseType `{0}`")]
    UnknownResponseType(String),

    #[error("`actions` must be an array")]
    ActionsNotArray,
}

/// Wire form of one action object. Every field is optional; numbers are
/// accepted where strings are expected.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireAction {
    #[serde(rename = "type", alias = "actionType", deserialize_with = "lenient_string")]
    kind: String,
    #[serde(alias = "viewId", deserialize_with = "lenient_string")]
    target_id: String,
    #[serde(deserialize_with = "lenient_string")]
    unique_id: String,
    bounds: Option<serde_json::Value>,
    #[serde(deserialize_with = "lenient_string")]
    traverse_direction: String,
    #[serde(alias = "textToType", deserialize_with = "lenient_string")]
    argument: String,
    #[serde(deserialize_with = "lenient_string")]
    navigation_type: String,
    #[serde(deserialize_with = "lenient_string")]
    package_name: String,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("fence regex is valid")
    })
}

fn bounds_regex() -> &'static Regex {
    static BOUNDS: OnceLock<Regex> = OnceLock::new();
    BOUNDS.get_or_init(|| {
        Regex::new(r"^\[?\s*(-?\d+)\s*,\s*(-?\d+)\s*\]?\s*[,\[]?\s*(-?\d+)\s*,\s*(-?\d+)\s*\]?$")
            .expect("bounds regex is valid")
    })
}

/// Strips code fences and surrounding prose, leaving the outermost `{...}`.
fn extract_object(raw: &str) -> Result<&str, DecodeError> {
    let body = match fence_regex().captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw,
    };
    let start = body.find('{').ok_or(DecodeError::NoJsonObject)?;
    let end = body.rfind('}').ok_or(DecodeError::NoJsonObject)?;
    if end < start {
        return Err(DecodeError::NoJsonObject);
    }
    Ok(&body[start..=end])
}

pub fn decode_response(raw: &str) -> Result<ScreenResponse, DecodeError> {
    let object = extract_object(raw)?;
    let value: serde_json::Value =
        serde_json::from_str(object).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let map = value.as_object().ok_or(DecodeError::NoJsonObject)?;

    let kind_raw = map
        .get("responseType")
        .and_then(|v| v.as_str())
        .ok_or(DecodeError::MissingField("responseType"))?;
    let kind = ResponseKind::parse(kind_raw)
        .ok_or_else(|| DecodeError::UnknownResponseType(kind_raw.to_string()))?;
    let text = map
        .get("text")
        .and_then(|v| v.as_str())
        .ok_or(DecodeError::MissingField("text"))?
        .to_string();

    let elements = match map.get("actions") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items.clone(),
        Some(_) => return Err(DecodeError::ActionsNotArray),
    };

    let actions = if kind == ResponseKind::Action {
        elements.into_iter().map(decode_action).collect()
    } else {
        if !elements.is_empty() {
            tracing::warn!(?kind, dropped = elements.len(), "actions on a non-action response ignored");
        }
        Vec::new()
    };

    Ok(ScreenResponse { kind, text, actions })
}

fn decode_action(element: serde_json::Value) -> DeviceAction {
    let wire: WireAction = match serde_json::from_value(element.clone()) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable action element");
            return DeviceAction::new(ActionType::Unsupported(element.to_string()), ActionTarget::None);
        }
    };

    let action_type = ActionType::parse(&wire.kind);
    let navigation = if action_type == ActionType::Navigate || !wire.navigation_type.is_empty() {
        Some(NavigationType::parse(&wire.navigation_type))
    } else {
        None
    };

    DeviceAction {
        target: decode_target(&wire),
        action_type,
        argument: wire.argument,
        navigation,
        package_name: wire.package_name,
    }
}

fn decode_target(wire: &WireAction) -> ActionTarget {
    let unique_id = (!wire.unique_id.is_empty()).then(|| wire.unique_id.clone());

    if !wire.target_id.is_empty() {
        return ActionTarget::ViewId { view_id: wire.target_id.clone(), unique_id };
    }
    if !wire.traverse_direction.is_empty() {
        return match TraversalHint::parse(&wire.traverse_direction) {
            Some(hint) => ActionTarget::Traversal(hint),
            None => ActionTarget::Malformed {
                field: "traverseDirection".into(),
                value: wire.traverse_direction.clone(),
            },
        };
    }
    match &wire.bounds {
        None | Some(serde_json::Value::Null) => {}
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => {}
        Some(value) => {
            return match parse_bounds(value) {
                Some(bounds) => ActionTarget::Bounds(bounds),
                None => ActionTarget::Malformed { field: "bounds".into(), value: value.to_string() },
            };
        }
    }
    match unique_id {
        Some(id) => ActionTarget::UniqueId(id),
        None => ActionTarget::None,
    }
}

/// Accepts `{left,top,right,bottom}`, `"l,t,r,b"` and `"[l,t][r,b]"`.
fn parse_bounds(value: &serde_json::Value) -> Option<Bounds> {
    match value {
        serde_json::Value::Object(_) => serde_json::from_value(value.clone()).ok(),
        serde_json::Value::String(s) => {
            let caps = bounds_regex().captures(s.trim())?;
            let n = |i: usize| caps.get(i)?.as_str().parse::<i32>().ok();
            Some(Bounds::new(n(1)?, n(2)?, n(3)?, n(4)?))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::actions::TraversalDirection;

    #[test]
    fn summarize_without_actions_field_decodes() {
        let resp = decode_response(r#"{"responseType":"Summarize","text":"A login screen."}"#).unwrap();
        assert_eq!(resp.kind, ResponseKind::Summarize);
        assert_eq!(resp.text, "A login screen.");
        assert!(resp.actions.is_empty());
    }

    #[test]
    fn non_action_kinds_never_carry_actions() {
        for kind in ["Summarize", "Answer", "Error"] {
            let raw = format!(
                r#"{{"responseType":"{kind}","text":"t","actions":[{{"type":"click","targetId":"x"}}]}}"#
            );
            let resp = decode_response(&raw).unwrap();
            assert!(resp.actions.is_empty(), "{kind} kept actions");
        }
    }

    #[test]
    fn action_list_keeps_order_and_defaults() {
        let raw = r#"{
            "responseType": "Action",
            "text": "",
            "actions": [
                {"type": "click", "targetId": "btn.submit", "uniqueId": 12345, "extra": true},
                {"type": "set_text", "viewId": "field.name", "textToType": "Ada"},
                {"type": "navigate", "navigationType": "GLOBAL_ACTION_HOME"}
            ]
        }"#;
        let resp = decode_response(raw).unwrap();
        assert_eq!(resp.actions.len(), 3);

        let click = &resp.actions[0];
        assert_eq!(click.action_type, ActionType::Click);
        assert_eq!(
            click.target,
            ActionTarget::ViewId { view_id: "btn.submit".into(), unique_id: Some("12345".into()) }
        );
        assert_eq!(click.argument, "");
        assert_eq!(click.navigation, None);

        assert_eq!(resp.actions[1].action_type, ActionType::SetText);
        assert_eq!(resp.actions[1].argument, "Ada");

        let nav = &resp.actions[2];
        assert_eq!(nav.navigation, Some(NavigationType::Home));
        assert_eq!(nav.target, ActionTarget::None);
    }

    #[test]
    fn fenced_and_chatty_output_is_tolerated() {
        let raw = "Here you go:\n```json\n{\"responseType\":\"Answer\",\"text\":\"Yes\"}\n```\nAnything else?";
        assert_eq!(decode_response(raw).unwrap().kind, ResponseKind::Answer);

        let raw = "Sure! {\"responseType\":\"answer\",\"text\":\"It is 5pm\"} hope that helps";
        assert_eq!(decode_response(raw).unwrap().text, "It is 5pm");
    }

    #[test]
    fn structural_errors_are_reported_not_coerced() {
        assert_eq!(decode_response("no json here"), Err(DecodeError::NoJsonObject));
        assert!(matches!(decode_response("{\"responseType\": }"), Err(DecodeError::Malformed(_))));
        assert_eq!(
            decode_response(r#"{"text":"hi"}"#),
            Err(DecodeError::MissingField("responseType"))
        );
        assert_eq!(
            decode_response(r#"{"responseType":"Answer"}"#),
            Err(DecodeError::MissingField("text"))
        );
        assert_eq!(
            decode_response(r#"{"responseType":"Dance","text":""}"#),
            Err(DecodeError::UnknownResponseType("Dance".into()))
        );
        assert_eq!(
            decode_response(r#"{"responseType":"Action","text":"","actions":"click"}"#),
            Err(DecodeError::ActionsNotArray)
        );
    }

    #[test]
    fn target_variants() {
        let raw = r#"{"responseType":"Action","text":"","actions":[
            {"type":"click","traverseDirection":"parent-77"},
            {"type":"click","bounds":"[0,100][200,150]"},
            {"type":"click","bounds":{"left":1,"top":2,"right":3,"bottom":4}},
            {"type":"click","uniqueId":"9"},
            {"type":"click","traverseDirection":"diagonal"},
            {"type":"copy"},
            "not an object"
        ]}"#;
        let actions = decode_response(raw).unwrap().actions;
        assert_eq!(
            actions[0].target,
            ActionTarget::Traversal(TraversalHint { direction: TraversalDirection::Parent, node_id: "77".into() })
        );
        assert_eq!(actions[1].target, ActionTarget::Bounds(Bounds::new(0, 100, 200, 150)));
        assert_eq!(actions[2].target, ActionTarget::Bounds(Bounds::new(1, 2, 3, 4)));
        assert_eq!(actions[3].target, ActionTarget::UniqueId("9".into()));
        assert!(matches!(actions[4].target, ActionTarget::Malformed { .. }));
        assert_eq!(actions[5].target, ActionTarget::None);
        assert!(matches!(actions[6].action_type, ActionType::Unsupported(_)));
    }

    #[test]
    fn bounds_string_forms() {
        let v = |s: &str| serde_json::Value::String(s.into());
        assert_eq!(parse_bounds(&v("1,2,3,4")), Some(Bounds::new(1, 2, 3, 4)));
        assert_eq!(parse_bounds(&v("[10, 20][30, 40]")), Some(Bounds::new(10, 20, 30, 40)));
        assert_eq!(parse_bounds(&v("wide")), None);
    }
}
