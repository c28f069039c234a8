use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::executor::actions::{ActionArgument, ActionType};
use crate::executor::resolver::{GlobalAction, NodeRef};

/// Live device surface the executor drives.
///
/// Implementations report platform rejection as an error; the executor
/// records it against the single action and carries on.
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    async fn perform(
        &self,
        node: &NodeRef,
        operation: &ActionType,
        argument: &ActionArgument,
    ) -> PilotResult<()>;

    async fn global_action(&self, action: GlobalAction) -> PilotResult<()>;

    /// Fails with `PilotError::AppNotFound` when no launchable app has the package.
    async fn launch_app(&self, package_name: &str) -> PilotResult<()>;
}

/// Backend that only logs what it would do. Used by the console harness.
///
/// It has no screen to capture, so `TakeScreenshot` is rejected.
#[derive(Debug, Default)]
pub struct LoggingBackend;

#[async_trait]
impl DeviceBackend for LoggingBackend {
    async fn perform(
        &self,
        node: &NodeRef,
        operation: &ActionType,
        argument: &ActionArgument,
    ) -> PilotResult<()> {
        tracing::info!(
            operation = %operation,
            unique_id = %node.unique_id,
            view_id = ?node.view_id,
            argument = ?argument,
            "device action"
        );
        Ok(())
    }

    async fn global_action(&self, action: GlobalAction) -> PilotResult<()> {
        if action == GlobalAction::TakeScreenshot {
            return Err(PilotError::Executor("no screen to capture".into()));
        }
        tracing::info!(action = ?action, "global action");
        Ok(())
    }

    async fn launch_app(&self, package_name: &str) -> PilotResult<()> {
        tracing::info!(package = package_name, "launch app");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_backend_rejects_screenshots_only() {
        let backend = LoggingBackend;
        assert!(backend.global_action(GlobalAction::Back).await.is_ok());
        assert!(matches!(
            backend.global_action(GlobalAction::TakeScreenshot).await,
            Err(PilotError::Executor(_))
        ));
        assert!(backend.launch_app("com.example.mail").await.is_ok());
    }
}
