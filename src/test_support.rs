//! Fakes for the pipeline's collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::executor::actions::{ActionArgument, ActionType};
use crate::executor::backend::DeviceBackend;
use crate::executor::resolver::{GlobalAction, NodeRef};
use crate::llm::provider::LlmGateway;
use crate::llm::types::{ContentPart, ConversationTurn};
use crate::perception::traits::SnapshotSource;
use crate::perception::types::{Bounds, Snapshot, UiNode};
use crate::voice::announcer::Announcer;
use crate::voice::listener::{PermissionStatus, SpeechListener};

pub fn leaf(unique_id: &str, view_id: Option<&str>, ops: &[&str]) -> UiNode {
    UiNode {
        unique_id: unique_id.into(),
        view_id: view_id.map(Into::into),
        bounds: Bounds::new(0, 0, 100, 100),
        operations: ops.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

pub fn screen(children: Vec<UiNode>) -> UiNode {
    UiNode {
        unique_id: "root".into(),
        bounds: Bounds::new(0, 0, 1080, 1920),
        children,
        ..Default::default()
    }
}

/// Hands out a fresh snapshot of the current tree on every pull.
#[derive(Default)]
pub struct FakeScreen {
    tree: Mutex<Option<UiNode>>,
    pulls: AtomicUsize,
}

impl FakeScreen {
    pub fn new(root: UiNode) -> Self {
        Self { tree: Mutex::new(Some(root)), pulls: AtomicUsize::new(0) }
    }

    pub fn set(&self, root: Option<UiNode>) {
        *self.tree.lock().unwrap() = root;
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for FakeScreen {
    fn current_snapshot(&self) -> Option<Snapshot> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.tree.lock().unwrap().clone().map(Snapshot::new)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub parts: Vec<ContentPart>,
    pub history: Vec<ConversationTurn>,
}

impl RecordedCall {
    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n")
    }
}

/// Replies from a script, each after its own latency. An empty script fails the call.
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<(Duration, PilotResult<String>)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn reply(self, latency_ms: u64, text: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back((Duration::from_millis(latency_ms), Ok(text.to_string())));
        self
    }

    pub fn fail(self, latency_ms: u64) -> Self {
        self.replies.lock().unwrap().push_back((
            Duration::from_millis(latency_ms),
            Err(PilotError::LlmProvider("503 Service Unavailable".into())),
        ));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, parts: &[ContentPart], history: &[ConversationTurn]) -> PilotResult<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            parts: parts.to_vec(),
            history: history.to_vec(),
        });
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some((latency, reply)) => {
                tokio::time::sleep(latency).await;
                reply
            }
            None => Err(PilotError::LlmProvider("no scripted reply".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Perform { unique_id: String, operation: ActionType, argument: ActionArgument },
    Global(GlobalAction),
    Launch(String),
}

/// Records every call; operations listed in `rejecting` fail, and only
/// `installed` packages launch.
#[derive(Default)]
pub struct RecordingBackend {
    pub rejecting: Vec<ActionType>,
    pub installed: Vec<String>,
    pub calls: Mutex<Vec<BackendCall>>,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceBackend for RecordingBackend {
    async fn perform(
        &self,
        node: &NodeRef,
        operation: &ActionType,
        argument: &ActionArgument,
    ) -> PilotResult<()> {
        self.calls.lock().unwrap().push(BackendCall::Perform {
            unique_id: node.unique_id.clone(),
            operation: operation.clone(),
            argument: argument.clone(),
        });
        if self.rejecting.contains(operation) {
            return Err(PilotError::Executor(format!("{operation} rejected")));
        }
        Ok(())
    }

    async fn global_action(&self, action: GlobalAction) -> PilotResult<()> {
        self.calls.lock().unwrap().push(BackendCall::Global(action));
        Ok(())
    }

    async fn launch_app(&self, package_name: &str) -> PilotResult<()> {
        self.calls.lock().unwrap().push(BackendCall::Launch(package_name.to_string()));
        if self.installed.iter().any(|p| p == package_name) {
            Ok(())
        } else {
            Err(PilotError::AppNotFound(package_name.to_string()))
        }
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    spoken: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn speak(&self, text: &str) -> PilotResult<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub struct FakeListener {
    permission: PermissionStatus,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeListener {
    pub fn new(permission: PermissionStatus) -> Self {
        Self { permission, starts: AtomicUsize::new(0), stops: AtomicUsize::new(0) }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SpeechListener for FakeListener {
    fn permission(&self) -> PermissionStatus {
        self.permission
    }

    fn start_listening(&self) -> PilotResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop_listening(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
