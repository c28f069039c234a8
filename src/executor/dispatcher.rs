use thiserror::Error;

use crate::errors::PilotError;
use crate::executor::actions::{ActionType, DeviceAction};
use crate::executor::backend::DeviceBackend;
use crate::executor::resolver::{ActionResolver, ResolveError, ResolvedAction};
use crate::perception::traits::SnapshotSource;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("execution failed: {0}")]
    Execution(#[from] PilotError),
}

#[derive(Debug)]
pub struct ActionOutcome {
    pub index: usize,
    pub action_type: ActionType,
    pub result: Result<(), ActionError>,
}

#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Runs an action list in order against the live device.
///
/// Every action is resolved against a snapshot pulled right before it runs,
/// since earlier actions in the list usually change the screen. A failing
/// action is recorded and the rest still run.
#[derive(Debug, Default)]
pub struct ActionExecutor {
    resolver: ActionResolver,
}

impl ActionExecutor {
    pub fn new() -> Self {
        Self { resolver: ActionResolver::new() }
    }

    pub async fn execute(
        &self,
        actions: &[DeviceAction],
        snapshots: &dyn SnapshotSource,
        backend: &dyn DeviceBackend,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        for (index, action) in actions.iter().enumerate() {
            let result = self.execute_one(action, snapshots, backend).await;
            match &result {
                Ok(()) => tracing::info!(index, action = %action.action_type, "action done"),
                Err(e) => tracing::warn!(index, action = %action.action_type, error = %e, "action skipped"),
            }
            report.outcomes.push(ActionOutcome {
                index,
                action_type: action.action_type.clone(),
                result,
            });
        }
        tracing::info!(
            total = report.outcomes.len(),
            failed = report.failed(),
            "action list drained"
        );
        report
    }

    async fn execute_one(
        &self,
        action: &DeviceAction,
        snapshots: &dyn SnapshotSource,
        backend: &dyn DeviceBackend,
    ) -> Result<(), ActionError> {
        let snapshot = match action.action_type {
            ActionType::Navigate => None,
            _ => snapshots.current_snapshot(),
        };
        match self.resolver.resolve(action, snapshot.as_ref())? {
            ResolvedAction::Node { node, operation, argument } => {
                backend.perform(&node, &operation, &argument).await?
            }
            ResolvedAction::Global(global) => backend.global_action(global).await?,
            ResolvedAction::LaunchApp { package_name } => backend.launch_app(&package_name).await?,
        }
        Ok(())
    }
}
