use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::agent_engine::history::{ConversationHistory, TranscriptLog};
use crate::agent_engine::prompt;
use crate::agent_engine::scheduler::{DispatchTicket, RequestScheduler, TriggerKind};
use crate::agent_engine::state::{AnnouncementStatus, PipelineEvent, PipelineState};
use crate::config::{AppConfig, SchedulerConfig, VoiceConfig};
use crate::errors::{PilotError, PilotResult};
use crate::executor::backend::DeviceBackend;
use crate::executor::dispatcher::ActionExecutor;
use crate::llm::decoder::{decode_response, ScreenResponse};
use crate::llm::provider::LlmGateway;
use crate::llm::types::{ContentPart, ConversationTurn};
use crate::perception::serializer::{SerializedSnapshot, SnapshotSerializer};
use crate::perception::traits::SnapshotSource;
use crate::voice::announcer::{Announcer, TurnTaking};
use crate::voice::listener::{self, SpeechListener};

/// External collaborators the pipeline drives.
pub struct Collaborators {
    pub snapshots: Arc<dyn SnapshotSource>,
    pub gateway: Arc<dyn LlmGateway>,
    pub backend: Arc<dyn DeviceBackend>,
    pub announcer: Arc<dyn Announcer>,
    pub listener: Option<Arc<dyn SpeechListener>>,
}

/// Result of one gateway call, sent back to the pipeline task.
struct GatewayCompletion {
    id: u64,
    kind: TriggerKind,
    parts: Vec<ContentPart>,
    result: PilotResult<String>,
}

/// The screen-event pipeline.
///
/// One task owns all mutable state (scheduler slot, history, turn-taking) and
/// reacts to producer events and gateway completions in turn. Gateway calls
/// run in spawned tasks that report back over a channel; the action list of a
/// response is executed inline, so two action lists never interleave.
pub struct Pipeline {
    snapshots: Arc<dyn SnapshotSource>,
    gateway: Arc<dyn LlmGateway>,
    backend: Arc<dyn DeviceBackend>,
    announcer: Arc<dyn Announcer>,
    listener: Option<Arc<dyn SpeechListener>>,

    serializer: SnapshotSerializer,
    scheduler: RequestScheduler,
    history: ConversationHistory,
    transcript: Option<TranscriptLog>,
    executor: ActionExecutor,
    turns: TurnTaking,

    scheduler_config: SchedulerConfig,
    voice: VoiceConfig,
    request_timeout: Duration,
    permission_announced: bool,

    events: mpsc::Receiver<PipelineEvent>,
    completion_tx: mpsc::UnboundedSender<GatewayCompletion>,
    completion_rx: mpsc::UnboundedReceiver<GatewayCompletion>,
    state_tx: watch::Sender<PipelineState>,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        collaborators: Collaborators,
        events: mpsc::Receiver<PipelineEvent>,
    ) -> Self {
        let transcript = if config.history.persist_transcript {
            match TranscriptLog::new() {
                Ok(log) => {
                    tracing::info!(path = %log.path().display(), "transcript enabled");
                    Some(log)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "transcript disabled: cannot open session file");
                    None
                }
            }
        } else {
            None
        };

        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(PipelineState::Idle);

        Self {
            snapshots: collaborators.snapshots,
            gateway: collaborators.gateway,
            backend: collaborators.backend,
            announcer: collaborators.announcer,
            listener: collaborators.listener,
            serializer: SnapshotSerializer::new(&config.snapshot),
            scheduler: RequestScheduler::from_config(&config.scheduler),
            history: ConversationHistory::new(config.history.capacity),
            transcript,
            executor: ActionExecutor::new(),
            turns: TurnTaking::default(),
            scheduler_config: config.scheduler.clone(),
            voice: config.voice.clone(),
            request_timeout: Duration::from_millis(config.llm.request_timeout_ms),
            permission_announced: false,
            events,
            completion_tx,
            completion_rx,
            state_tx,
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Runs until `PipelineEvent::Shutdown` or until every event sender is dropped.
    pub async fn run(&mut self) {
        tracing::info!(provider = %self.gateway.name(), "pipeline started");
        self.resume_listening().await;

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(PipelineEvent::Shutdown) | None => break,
                    Some(event) => self.handle_event(event).await,
                },
                Some(done) = self.completion_rx.recv() => self.handle_completion(done).await,
            }
        }

        self.scheduler.cancel_all();
        if self.turns.is_listening() {
            if let Some(listener) = &self.listener {
                listener.stop_listening();
            }
            self.turns.listening_stopped();
        }
        self.set_state(PipelineState::Idle);
        tracing::info!("pipeline stopped");
    }

    async fn handle_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::ScreenChanged => self.on_trigger(TriggerKind::Screen, None),
            PipelineEvent::Utterance(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::debug!("empty utterance ignored");
                    return;
                }
                tracing::info!(utterance = %text, "user spoke");
                self.on_trigger(TriggerKind::Voice, Some(text.to_string()));
            }
            PipelineEvent::Announcement(status) => self.on_announcement(status).await,
            PipelineEvent::Shutdown => {}
        }
    }

    // ── Triggers ──────────────────────────────────────────────────────────

    fn on_trigger(&mut self, kind: TriggerKind, query: Option<String>) {
        let now = Instant::now();
        if !self.scheduler.request_allowed(kind, now) {
            tracing::debug!(trigger = ?kind, "trigger dropped by scheduler");
            return;
        }

        let screen = self.capture();
        let parts = match (&query, &screen) {
            (Some(query), screen) => prompt::voice_prompt(query, screen.as_ref()),
            (None, Some(screen)) => prompt::screen_prompt(screen),
            (None, None) => {
                tracing::debug!("screen change without a capturable screen");
                return;
            }
        };

        let debounce = match kind {
            TriggerKind::Screen => self.scheduler_config.screen_debounce(),
            TriggerKind::Voice => self.scheduler_config.voice_debounce(),
        };
        let Some(ticket) = self.scheduler.schedule(kind, parts, debounce, now) else {
            return;
        };
        tracing::info!(
            request_id = ticket.id,
            trigger = ?kind,
            debounce_ms = debounce.as_millis() as u64,
            "request scheduled"
        );
        self.set_state(PipelineState::AwaitingModel { request_id: ticket.id, trigger: kind });
        self.dispatch(ticket);
    }

    fn capture(&self) -> Option<SerializedSnapshot> {
        let snapshot = self.snapshots.current_snapshot()?;
        match self.serializer.serialize(&snapshot) {
            Ok(serialized) => {
                tracing::debug!(
                    snapshot_id = %snapshot.id,
                    nodes = serialized.node_count,
                    emitted = serialized.emitted,
                    "snapshot serialized"
                );
                Some(serialized)
            }
            Err(e) => {
                tracing::warn!(error = %e, "snapshot serialization failed");
                None
            }
        }
    }

    /// Waits out the debounce, then calls the gateway, unless the ticket is
    /// cancelled first. A cancelled ticket reports nothing.
    fn dispatch(&self, ticket: DispatchTicket) {
        let gateway = Arc::clone(&self.gateway);
        let history = self.history.snapshot();
        let completions = self.completion_tx.clone();
        let limit = self.request_timeout;

        tokio::spawn(async move {
            let DispatchTicket { id, kind, token, delay, parts } = ticket;
            let call = async {
                tokio::time::sleep(delay).await;
                tracing::debug!(request_id = id, history = history.len(), "request dispatched");
                match tokio::time::timeout(limit, gateway.send(&parts, &history)).await {
                    Ok(result) => result,
                    Err(_) => Err(PilotError::GatewayTimeout(limit.as_millis() as u64)),
                }
            };
            let result = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(request_id = id, "superseded request abandoned");
                    return;
                }
                result = call => result,
            };
            if completions.send(GatewayCompletion { id, kind, parts, result }).is_err() {
                tracing::debug!(request_id = id, "pipeline gone, response discarded");
            }
        });
    }

    // ── Responses ─────────────────────────────────────────────────────────

    async fn handle_completion(&mut self, done: GatewayCompletion) {
        let GatewayCompletion { id, kind, parts, result } = done;
        if !self.scheduler.complete(id, Instant::now()) {
            tracing::debug!(request_id = id, "stale response dropped");
            return;
        }

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(request_id = id, trigger = ?kind, error = %e, "gateway call failed, waiting for next trigger");
                self.set_state(PipelineState::Idle);
                return;
            }
        };

        self.record_exchange(parts, &raw);
        self.set_state(PipelineState::Decoding { request_id: id });

        match decode_response(&raw) {
            Ok(response) => self.apply(id, response).await,
            Err(e) => {
                tracing::warn!(request_id = id, error = %e, "model reply could not be decoded");
                if self.voice.apologize_on_decode_error {
                    let apology = self.voice.decode_error_message.clone();
                    self.announce(&apology).await;
                }
            }
        }
        self.set_state(PipelineState::Idle);
    }

    async fn apply(&mut self, id: u64, response: ScreenResponse) {
        tracing::info!(
            request_id = id,
            kind = ?response.kind,
            actions = response.actions.len(),
            "model reply decoded"
        );
        if !response.text.trim().is_empty() {
            self.announce(&response.text).await;
        }
        if response.actions.is_empty() {
            return;
        }

        self.set_state(PipelineState::Executing { request_id: id, actions: response.actions.len() });
        let report = self
            .executor
            .execute(&response.actions, self.snapshots.as_ref(), self.backend.as_ref())
            .await;
        tracing::info!(
            request_id = id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "actions executed"
        );
    }

    fn record_exchange(&mut self, parts: Vec<ContentPart>, raw: &str) {
        for turn in [ConversationTurn::user(parts), ConversationTurn::model(raw)] {
            if let Some(log) = &self.transcript {
                if let Err(e) = log.append(&turn) {
                    tracing::warn!(error = %e, "transcript append failed");
                }
            }
            if let Some(evicted) = self.history.push(turn) {
                tracing::debug!(
                    role = ?evicted.role,
                    capacity = self.history.capacity(),
                    "oldest history turn evicted"
                );
            }
        }
    }

    // ── Voice ─────────────────────────────────────────────────────────────

    async fn announce(&mut self, text: &str) {
        if let Err(e) = self.announcer.speak(text).await {
            tracing::warn!(error = %e, "announcement failed");
        }
    }

    async fn on_announcement(&mut self, status: AnnouncementStatus) {
        match status {
            AnnouncementStatus::Started => {
                if self.turns.announcement_started() {
                    if let Some(listener) = &self.listener {
                        listener.stop_listening();
                    }
                    tracing::debug!("listening paused for announcement");
                }
            }
            AnnouncementStatus::Finished => {
                if self.turns.announcement_ended() {
                    self.resume_listening().await;
                }
            }
            AnnouncementStatus::Failed(reason) => {
                tracing::warn!(reason = %reason, "announcement failed");
                if self.turns.announcement_ended() {
                    self.resume_listening().await;
                }
            }
        }
    }

    async fn resume_listening(&mut self) {
        if !self.voice.enabled || !self.turns.may_listen() {
            return;
        }
        let Some(listener) = self.listener.clone() else {
            return;
        };
        match listener::start_if_permitted(listener.as_ref()) {
            Ok(()) => {
                self.turns.listening_started();
                tracing::debug!("listening");
            }
            Err(PilotError::PermissionDenied(what)) => {
                if !self.permission_announced {
                    self.permission_announced = true;
                    tracing::warn!(permission = %what, "listening not started: permission denied");
                    let message = self.voice.permission_denied_message.clone();
                    self.announce(&message).await;
                }
            }
            Err(e) => tracing::warn!(error = %e, "listener failed to start"),
        }
    }

    fn set_state(&self, state: PipelineState) {
        tracing::debug!(state = ?state, "pipeline state");
        self.state_tx.send_replace(state);
    }
}
