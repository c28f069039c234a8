use crate::perception::types::Snapshot;

/// Supplies the current screen tree on demand.
///
/// Returns `None` when there is nothing to capture (e.g. no active window).
/// Every call must produce a fresh, independently owned snapshot.
pub trait SnapshotSource: Send + Sync {
    fn current_snapshot(&self) -> Option<Snapshot>;
}
