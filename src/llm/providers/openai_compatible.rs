use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::LlmGateway;
use crate::llm::types::{CallConfig, ContentPart, ConversationTurn, Role};

/// OpenAI-compatible `chat/completions` gateway (non-streaming, JSON mode).
/// `api_base` is the full completions URL.
pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    system_instructions: String,
    call: CallConfig,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        id: String,
        api_base: String,
        api_key: String,
        system_instructions: String,
        call: CallConfig,
    ) -> Self {
        Self {
            id,
            api_base,
            api_key,
            system_instructions,
            call,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, parts: &[ContentPart], history: &[ConversationTurn]) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": &self.system_instructions,
        })];
        for turn in history {
            messages.push(serde_json::json!({
                "role": match turn.role {
                    Role::User => "user",
                    Role::Model => "assistant",
                },
                "content": join_parts(&turn.parts),
            }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": join_parts(parts) }));

        serde_json::json!({
            "model": self.call.model,
            "messages": messages,
            "stream": false,
            "temperature": self.call.temperature,
            "response_format": { "type": "json_object" },
        })
    }
}

fn join_parts(parts: &[ContentPart]) -> String {
    parts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

#[async_trait]
impl LlmGateway for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn send(
        &self,
        parts: &[ContentPart],
        history: &[ConversationTurn],
    ) -> PilotResult<String> {
        let body = self.build_body(parts, history);
        tracing::debug!(
            provider = %self.id,
            model = %self.call.model,
            history = history.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        if content.is_empty() {
            return Err(PilotError::LlmProvider("empty completion".into()));
        }

        tracing::info!(provider = %self.id, content_len = content.len(), "LLM JSON response received");
        Ok(content)
    }
}
