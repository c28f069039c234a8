use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::LlmGateway;
use crate::llm::providers::gemini::GeminiProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Registry of all available gateways, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmGateway>>,
    active: String,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            active,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmGateway>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> PilotResult<Arc<dyn LlmGateway>> {
        self.providers
            .get(&self.active)
            .cloned()
            .ok_or_else(|| PilotError::Config(format!("Active provider '{}' not found in registry", self.active)))
    }

    pub fn set_active(&mut self, name: String) -> PilotResult<()> {
        if self.providers.contains_key(&name) {
            self.active = name;
            Ok(())
        } else {
            Err(PilotError::Config(format!("Provider '{name}' not registered")))
        }
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `SCREENPILOT_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig, system_instructions: &str) -> PilotResult<Self> {
        let mut registry = Self::new(config.llm.active_provider.clone());
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("SCREENPILOT_{}_API_KEY", id.to_uppercase()))
                .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default());
            if api_key.is_empty() {
                tracing::warn!(provider = %id, "no API key configured");
            }
            let call = CallConfig {
                model: entry.model.clone(),
                temperature: entry.temperature,
            };
            let provider: Arc<dyn LlmGateway> = match entry.adapter.as_deref() {
                Some("gemini") => Arc::new(GeminiProvider::new(
                    id.clone(),
                    entry.api_base.clone(),
                    api_key,
                    system_instructions.to_string(),
                    call,
                )),
                None | Some("openai") => Arc::new(OpenAiCompatibleProvider::new(
                    id.clone(),
                    entry.api_base.clone(),
                    api_key,
                    system_instructions.to_string(),
                    call,
                )),
                Some(other) => {
                    return Err(PilotError::Config(format!(
                        "provider '{id}' uses unknown adapter '{other}'"
                    )))
                }
            };
            tracing::debug!(provider = %id, display_name = %entry.display_name, "provider registered");
            registry.register(provider);
        }
        Ok(registry)
    }
}
