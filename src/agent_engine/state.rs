use serde::{Deserialize, Serialize};

use crate::agent_engine::scheduler::TriggerKind;

/// Per-turn lifecycle of the pipeline, published for the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    AwaitingModel { request_id: u64, trigger: TriggerKind },
    Decoding { request_id: u64 },
    Executing { request_id: u64, actions: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementStatus {
    Started,
    Finished,
    Failed(String),
}

/// Inputs to the pipeline from its producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The platform reported a relevant UI change.
    ScreenChanged,
    /// A completed, transcribed utterance.
    Utterance(String),
    Announcement(AnnouncementStatus),
    Shutdown,
}
