use std::path::PathBuf;

use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::SnapshotSource;
use crate::perception::types::{Snapshot, UiNode};

/// Reads the screen tree from a JSON file on every pull, so edits to the file
/// show up as a new screen.
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> PilotResult<Snapshot> {
        let content = std::fs::read_to_string(&self.path)?;
        let root: UiNode = serde_json::from_str(&content).map_err(|e| {
            PilotError::Snapshot(format!("{}: {e}", self.path.display()))
        })?;
        Ok(Snapshot::new(root))
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn current_snapshot(&self) -> Option<Snapshot> {
        match self.load() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "snapshot file unavailable");
                None
            }
        }
    }
}
