use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    /// Upper bound on a single gateway call; past it the request fails.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            active_provider: String::new(),
            providers: HashMap::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// "gemini" for Google generateContent, None or "openai" for OpenAI-compatible.
    pub adapter: Option<String>,
    /// Optional API key stored in config.toml (falls back to env var SCREENPILOT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_temperature() -> f64 {
    0.2
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Screen-triggered requests are suppressed for this long after the last
    /// gateway call completed.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_screen_debounce_ms")]
    pub screen_debounce_ms: u64,
    #[serde(default)]
    pub voice_debounce_ms: u64,
}

impl SchedulerConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn screen_debounce(&self) -> Duration {
        Duration::from_millis(self.screen_debounce_ms)
    }

    pub fn voice_debounce(&self) -> Duration {
        Duration::from_millis(self.voice_debounce_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            screen_debounce_ms: default_screen_debounce_ms(),
            voice_debounce_ms: 0,
        }
    }
}

fn default_min_interval_ms() -> u64 {
    3_000
}

fn default_screen_debounce_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    /// Append every turn to a JSONL transcript under the user data directory.
    #[serde(default)]
    pub persist_transcript: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            persist_transcript: false,
        }
    }
}

fn default_history_capacity() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "default_max_payload_chars")]
    pub max_payload_chars: usize,
    /// Longer text fields are clipped with a trailing ellipsis.
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            max_payload_chars: default_max_payload_chars(),
            max_field_chars: default_max_field_chars(),
        }
    }
}

fn default_max_nodes() -> usize {
    400
}

fn default_max_payload_chars() -> usize {
    60_000
}

fn default_max_field_chars() -> usize {
    1_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub apologize_on_decode_error: bool,
    #[serde(default = "default_decode_error_message")]
    pub decode_error_message: String,
    #[serde(default = "default_permission_denied_message")]
    pub permission_denied_message: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            apologize_on_decode_error: true,
            decode_error_message: default_decode_error_message(),
            permission_denied_message: default_permission_denied_message(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_decode_error_message() -> String {
    "Sorry, I could not understand the response. Please try again.".into()
}

fn default_permission_denied_message() -> String {
    "Microphone permission is needed to listen to your questions. Please grant it in settings."
        .into()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptsConfig {
    /// Replaces the embedded system instructions when set.
    #[serde(default)]
    pub system_instructions_file: Option<PathBuf>,
}

fn resolve_config_path() -> PilotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(PilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn parse_config(content: &str) -> PilotResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    if config.history.capacity == 0 {
        return Err(PilotError::Config("history.capacity must be at least 1".into()));
    }
    Ok(config)
}

/// Loads `config.toml`; a missing file yields the defaults, a malformed one is an error.
pub fn load_config() -> PilotResult<AppConfig> {
    let path = match resolve_config_path() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "using default configuration");
            return Ok(AppConfig::default());
        }
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}
