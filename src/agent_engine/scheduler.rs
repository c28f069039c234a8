use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::llm::types::ContentPart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Screen,
    Voice,
}

/// A scheduled request, handed to the task that waits out the debounce and
/// calls the gateway. Cancelling `token` means the request was superseded.
#[derive(Debug)]
pub struct DispatchTicket {
    pub id: u64,
    pub kind: TriggerKind,
    pub token: CancellationToken,
    pub delay: Duration,
    pub parts: Vec<ContentPart>,
}

#[derive(Debug)]
struct CurrentRequest {
    id: u64,
    kind: TriggerKind,
    token: CancellationToken,
    dispatch_at: Instant,
}

/// Debounce and rate-limit policy over a single "current request" slot.
///
/// * Screen triggers are refused within `min_interval` of the last completed
///   call, while a request is already dispatched, and while a voice request
///   is pending. Otherwise they replace a pending screen request.
/// * Voice triggers are never refused and replace whatever is current.
///
/// Replacing cancels the previous token; `complete` only accepts the id in
/// the slot, so a late response from a replaced request is refused.
#[derive(Debug)]
pub struct RequestScheduler {
    min_interval: Duration,
    next_id: u64,
    current: Option<CurrentRequest>,
    last_completed: Option<Instant>,
}

impl RequestScheduler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_id: 0,
            current: None,
            last_completed: None,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.min_interval())
    }

    pub fn request_allowed(&self, kind: TriggerKind, now: Instant) -> bool {
        if kind == TriggerKind::Voice {
            return true;
        }
        if let Some(last) = self.last_completed {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        match &self.current {
            Some(current) => current.kind == TriggerKind::Screen && now < current.dispatch_at,
            None => true,
        }
    }

    pub fn schedule(
        &mut self,
        kind: TriggerKind,
        parts: Vec<ContentPart>,
        debounce: Duration,
        now: Instant,
    ) -> Option<DispatchTicket> {
        if !self.request_allowed(kind, now) {
            tracing::debug!(trigger = ?kind, "trigger suppressed");
            return None;
        }
        if let Some(previous) = self.current.take() {
            previous.token.cancel();
            tracing::debug!(request_id = previous.id, trigger = ?previous.kind, "request superseded");
        }

        self.next_id += 1;
        let token = CancellationToken::new();
        self.current = Some(CurrentRequest {
            id: self.next_id,
            kind,
            token: token.clone(),
            dispatch_at: now + debounce,
        });
        Some(DispatchTicket {
            id: self.next_id,
            kind,
            token,
            delay: debounce,
            parts,
        })
    }

    /// Clears the slot if `id` is current and starts the minimum interval.
    /// Returns false for a superseded request, whose result must be dropped.
    pub fn complete(&mut self, id: u64, now: Instant) -> bool {
        match &self.current {
            Some(current) if current.id == id => {
                self.current = None;
                self.last_completed = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.current.as_ref().is_some_and(|c| c.id == id)
    }

    pub fn in_flight(&self, now: Instant) -> bool {
        self.current.as_ref().is_some_and(|c| now >= c.dispatch_at)
    }

    pub fn cancel_all(&mut self) {
        if let Some(current) = self.current.take() {
            current.token.cancel();
        }
    }
}
