use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::agent_engine::state::{AnnouncementStatus, PipelineEvent};
use crate::errors::PilotResult;

/// Text-to-speech sink.
///
/// `speak` hands the text over and returns; progress comes back to the
/// pipeline as `PipelineEvent::Announcement` events.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn speak(&self, text: &str) -> PilotResult<()>;
}

/// Turn-taking handshake between the announcement and listening channels.
///
/// Listening is never (re)started while an announcement is in progress.
#[derive(Debug, Default)]
pub struct TurnTaking {
    speaking: bool,
    listening: bool,
}

impl TurnTaking {
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn may_listen(&self) -> bool {
        !self.speaking && !self.listening
    }

    /// Returns true when listening must be stopped for the announcement.
    pub fn announcement_started(&mut self) -> bool {
        self.speaking = true;
        std::mem::take(&mut self.listening)
    }

    /// Returns true when listening may resume.
    pub fn announcement_ended(&mut self) -> bool {
        self.speaking = false;
        !self.listening
    }

    pub fn listening_started(&mut self) {
        self.listening = true;
    }

    pub fn listening_stopped(&mut self) {
        self.listening = false;
    }
}

/// Prints announcements to stdout and reports them finished at once.
pub struct ConsoleAnnouncer {
    events: mpsc::Sender<PipelineEvent>,
}

impl ConsoleAnnouncer {
    pub fn new(events: mpsc::Sender<PipelineEvent>) -> Self {
        Self { events }
    }

    fn report(&self, status: AnnouncementStatus) {
        // try_send: the pipeline task itself is the caller
        if let Err(e) = self.events.try_send(PipelineEvent::Announcement(status)) {
            tracing::warn!(error = %e, "announcement status not delivered");
        }
    }
}

#[async_trait]
impl Announcer for ConsoleAnnouncer {
    async fn speak(&self, text: &str) -> PilotResult<()> {
        self.report(AnnouncementStatus::Started);
        println!("[speak] {text}");
        self.report(AnnouncementStatus::Finished);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listening_pauses_for_announcements() {
        let mut turns = TurnTaking::default();
        assert!(turns.may_listen());
        turns.listening_started();
        assert!(!turns.may_listen());

        assert!(turns.announcement_started());
        assert!(!turns.is_listening());
        assert!(!turns.may_listen());

        assert!(turns.announcement_ended());
        assert!(turns.may_listen());
    }

    #[test]
    fn announcement_without_listener_needs_no_stop() {
        let mut turns = TurnTaking::default();
        assert!(!turns.announcement_started());
        assert!(turns.announcement_ended());
    }

    #[tokio::test]
    async fn console_announcer_reports_progress() {
        let (tx, mut rx) = mpsc::channel(4);
        ConsoleAnnouncer::new(tx).speak("Two unread messages.").await.unwrap();
        assert_eq!(rx.recv().await, Some(PipelineEvent::Announcement(AnnouncementStatus::Started)));
        assert_eq!(rx.recv().await, Some(PipelineEvent::Announcement(AnnouncementStatus::Finished)));
    }
}
