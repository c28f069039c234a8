use crate::config::PromptsConfig;
use crate::errors::PilotResult;
use crate::llm::types::ContentPart;
use crate::perception::serializer::SerializedSnapshot;

pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = include_str!("../../prompts/system_instructions.md");

const SCREEN_INSTRUCTION: &str = "\
The screen changed. Below is its accessibility view hierarchy as JSON. \
There is no user request: summarize the screen for the user.";

const VOICE_INSTRUCTION: &str = "\
The user spoke the request below. Answer it, or perform it on the current \
screen, following the response rules.";

const NO_SCREEN: &str = "No screen content is available right now.";

/// System instructions from `prompts.system_instructions_file`, or the embedded default.
pub fn load_system_instructions(config: &PromptsConfig) -> PilotResult<String> {
    match &config.system_instructions_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            tracing::info!(path = %path.display(), "system instructions loaded");
            Ok(text)
        }
        None => Ok(DEFAULT_SYSTEM_INSTRUCTIONS.to_string()),
    }
}

pub fn screen_prompt(screen: &SerializedSnapshot) -> Vec<ContentPart> {
    vec![
        ContentPart::text(SCREEN_INSTRUCTION),
        ContentPart::text(screen.payload.clone()),
    ]
}

pub fn voice_prompt(query: &str, screen: Option<&SerializedSnapshot>) -> Vec<ContentPart> {
    let screen = match screen {
        Some(s) => s.payload.clone(),
        None => NO_SCREEN.to_string(),
    };
    vec![
        ContentPart::text(VOICE_INSTRUCTION),
        ContentPart::text(format!("User request: {}", query.trim())),
        ContentPart::text(screen),
    ]
}
