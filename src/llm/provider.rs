use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::llm::types::{ContentPart, ConversationTurn};

/// Request/response gateway to a hosted model.
///
/// One attempt per call, no internal retry: a failure is reported to the
/// caller and the next trigger is the retry path.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Returns the provider's identifier (matches config.toml key).
    fn name(&self) -> &str;

    /// Sends the prompt parts after the prior turns and returns the model's raw text.
    async fn send(
        &self,
        parts: &[ContentPart],
        history: &[ConversationTurn],
    ) -> PilotResult<String>;
}
