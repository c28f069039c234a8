use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::PilotResult;
use crate::llm::types::{ConversationTurn, Role};

/// Bounded FIFO of prior turns; the oldest turn is evicted first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends a turn, returning the one evicted to make room, if any.
    pub fn push(&mut self, turn: ConversationTurn) -> Option<ConversationTurn> {
        self.turns.push_back(turn);
        if self.turns.len() > self.capacity {
            self.turns.pop_front()
        } else {
            None
        }
    }

    /// Owned copy handed to a request; later appends don't affect it.
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub ts: i64,
    pub role: Role,
    pub content: String,
}

/// Append-only JSONL record of every turn in a session.
pub struct TranscriptLog {
    pub session_id: String,
    file_path: PathBuf,
}

impl TranscriptLog {
    /// Opens `<data dir>/screenpilot/sessions/session_<uuid>.jsonl`.
    pub fn new() -> PilotResult<Self> {
        Self::in_dir(&sessions_dir())
    }

    pub fn in_dir(dir: &Path) -> PilotResult<Self> {
        std::fs::create_dir_all(dir)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Ok(Self { session_id, file_path })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn append(&self, turn: &ConversationTurn) -> PilotResult<()> {
        let entry = TranscriptEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            role: turn.role,
            content: turn
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        };
        let line = serde_json::to_string(&entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{line}")?;
        tracing::debug!(path = %self.file_path.display(), "transcript entry flushed");
        Ok(())
    }
}

/// Platform data dir (`~/.local/share`, `%LOCALAPPDATA%`), falling back to the
/// working directory.
fn sessions_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
        .join("screenpilot")
        .join("sessions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ContentPart;

    fn user(text: &str) -> ConversationTurn {
        ConversationTurn::user(vec![ContentPart::text(text)])
    }

    #[test]
    fn fifth_turn_evicts_the_oldest() {
        let mut history = ConversationHistory::new(4);
        for text in ["t1", "t2", "t3", "t4"] {
            assert!(history.push(user(text)).is_none());
        }
        let evicted = history.push(user("t5")).unwrap();
        assert_eq!(evicted.parts[0].text, "t1");

        let kept: Vec<String> = history.snapshot().into_iter().map(|t| t.parts[0].text.clone()).collect();
        assert_eq!(kept, ["t2", "t3", "t4", "t5"]);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut history = ConversationHistory::new(2);
        history.push(user("a"));
        let snap = history.snapshot();
        history.push(ConversationTurn::model("b"));
        assert_eq!(snap.len(), 1);
        assert_eq!(history.snapshot().len(), 2);
    }

    #[test]
    fn transcript_appends_json_lines() {
        let dir = std::env::temp_dir().join(format!("screenpilot_transcript_{}", uuid::Uuid::new_v4()));
        let log = TranscriptLog::in_dir(&dir).unwrap();
        log.append(&ConversationTurn::user(vec![ContentPart::text("q"), ContentPart::text("screen")])).unwrap();
        log.append(&ConversationTurn::model("{}")).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let entries: Vec<TranscriptEntry> =
            content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].content, "q\nscreen");
        assert_eq!(entries[1].role, Role::Model);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
