use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::LlmGateway;
use crate::llm::types::{CallConfig, ContentPart, ConversationTurn, Role};

/// Google `generateContent` gateway. The model is asked for a JSON reply.
pub struct GeminiProvider {
    id: String,
    api_base: String,
    api_key: String,
    system_instructions: String,
    call: CallConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
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

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.call.model
        )
    }

    fn build_body(&self, parts: &[ContentPart], history: &[ConversationTurn]) -> serde_json::Value {
        let mut contents: Vec<serde_json::Value> = history
            .iter()
            .map(|turn| {
                serde_json::json!({
                    "role": match turn.role {
                        Role::User => "user",
                        Role::Model => "model",
                    },
                    "parts": &turn.parts,
                })
            })
            .collect();
        contents.push(serde_json::json!({ "role": "user", "parts": parts }));

        serde_json::json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": &self.system_instructions }] },
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": self.call.temperature,
            },
        })
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(json: &serde_json::Value) -> PilotResult<String> {
    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| PilotError::LlmProvider("response has no candidates".into()))?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        return Err(PilotError::LlmProvider("first candidate has no text".into()));
    }
    Ok(text)
}

#[async_trait]
impl LlmGateway for GeminiProvider {
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
            prompt_chars = parts.iter().map(|p| p.text.len()).sum::<usize>(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        let text = extract_text(&json)?;
        tracing::info!(provider = %self.id, content_len = text.len(), "LLM response received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(
            "gemini".into(),
            "https://example.test/v1beta/".into(),
            "key".into(),
            "be helpful".into(),
            CallConfig { model: "gemini-1.5-pro-001".into(), temperature: 0.2 },
        )
    }

    #[test]
    fn body_puts_history_before_prompt() {
        let history = vec![
            ConversationTurn::user(vec![ContentPart::text("old screen")]),
            ConversationTurn::model("{\"responseType\":\"Summarize\",\"text\":\"hi\"}"),
        ];
        let body = provider().build_body(&[ContentPart::text("a"), ContentPart::text("b")], &history);
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][1]["text"], "b");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn endpoint_joins_model() {
        assert_eq!(
            provider().endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-pro-001:generateContent"
        );
    }

    #[test]
    fn extracts_first_candidate_text() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } }]
        });
        assert_eq!(extract_text(&json).unwrap(), "{\"a\":1}");
        assert!(extract_text(&serde_json::json!({ "candidates": [] })).is_err());
    }
}
