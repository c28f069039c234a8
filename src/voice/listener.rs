use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Speech-to-text source.
///
/// Implementations deliver each completed utterance to the pipeline as a
/// `PipelineEvent::Utterance`.
pub trait SpeechListener: Send + Sync {
    fn permission(&self) -> PermissionStatus;

    fn start_listening(&self) -> PilotResult<()>;

    fn stop_listening(&self);
}

/// Starts listening, or reports `PermissionDenied` without touching the microphone.
pub fn start_if_permitted(listener: &dyn SpeechListener) -> PilotResult<()> {
    match listener.permission() {
        PermissionStatus::Granted => listener.start_listening(),
        PermissionStatus::Denied => Err(PilotError::PermissionDenied("microphone".into())),
    }
}
