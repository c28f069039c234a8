//! Console harness: `screenpilot <snapshot.json>`.
//!
//! The snapshot file stands in for the accessibility tree and is re-read on
//! every pull. Each stdin line is an utterance; `:screen` reports a screen
//! change and `:quit` exits. Device actions are logged, announcements printed.
//! `SCREENPILOT_PROVIDER` overrides the configured active provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use screenpilot::agent_engine::prompt::load_system_instructions;
use screenpilot::config::load_config;
use screenpilot::executor::backend::LoggingBackend;
use screenpilot::llm::registry::ProviderRegistry;
use screenpilot::perception::file_source::FileSnapshotSource;
use screenpilot::voice::announcer::ConsoleAnnouncer;
use screenpilot::voice::listener::{PermissionStatus, SpeechListener};
use screenpilot::{Collaborators, PilotError, PilotResult, Pipeline, PipelineEvent};

/// Stdin is always "permitted"; lines typed while an announcement is
/// playing are refused.
struct StdinListener {
    listening: Arc<AtomicBool>,
}

impl SpeechListener for StdinListener {
    fn permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn start_listening(&self) -> PilotResult<()> {
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_listening(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }
}

#[tokio::main]
async fn main() -> PilotResult<()> {
    screenpilot::init_tracing();
    let _ = dotenvy::dotenv();

    let snapshot_path = std::env::args()
        .nth(1)
        .ok_or_else(|| PilotError::Config("usage: screenpilot <snapshot.json>".into()))?;

    let config = load_config()?;
    let instructions = load_system_instructions(&config.prompts)?;
    let mut registry = ProviderRegistry::from_config(&config, &instructions)?;
    if let Ok(name) = std::env::var("SCREENPILOT_PROVIDER") {
        registry.set_active(name)?;
    }
    tracing::info!(providers = ?registry.list_names(), "providers registered");
    let gateway = registry.get_active()?;

    let (tx, rx) = mpsc::channel::<PipelineEvent>(32);
    let listening = Arc::new(AtomicBool::new(false));
    let collaborators = Collaborators {
        snapshots: Arc::new(FileSnapshotSource::new(snapshot_path)),
        gateway,
        backend: Arc::new(LoggingBackend),
        announcer: Arc::new(ConsoleAnnouncer::new(tx.clone())),
        listener: Some(Arc::new(StdinListener { listening: listening.clone() })),
    };

    let mut pipeline = Pipeline::new(&config, collaborators, rx);
    let mut state_rx = pipeline.subscribe_state();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            tracing::debug!(state = ?*state_rx.borrow(), "state changed");
        }
    });
    let engine = tokio::spawn(async move { pipeline.run().await });

    if tx.send(PipelineEvent::ScreenChanged).await.is_err() {
        return Err(PilotError::Config("pipeline exited before start".into()));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let event = match line.trim() {
            "" => continue,
            ":quit" => break,
            ":screen" => PipelineEvent::ScreenChanged,
            text => {
                if !listening.load(Ordering::SeqCst) {
                    println!("(not listening right now, try again)");
                    continue;
                }
                PipelineEvent::Utterance(text.to_string())
            }
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }

    let _ = tx.send(PipelineEvent::Shutdown).await;
    if let Err(e) = engine.await {
        tracing::error!(error = %e, "pipeline task failed");
    }
    Ok(())
}
