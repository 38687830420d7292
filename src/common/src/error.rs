use std::time::Duration;

/// Error taxonomy for the reconciliation subsystem.
///
/// Partial bulk-delete failures are not represented here: they are carried in
/// [`crate::model::BulkDeleteResult`] so the successful partition is never
/// lost behind an error.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Storage or database transport failure; the affected snapshot is stale
    /// and must be re-fetched, never partially applied.
    #[error("storage transport failure: {0}")]
    Transport(String),
    /// Read target absent. Deletes map absence to success instead.
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),
    /// Degraded-mode notice, not a failure: the visible set is too large for
    /// per-key reference detail; membership classification remains available.
    #[error("reference check skipped: {visible} visible keys exceed the {limit}-key limit")]
    ReferenceCheckSkipped { visible: usize, limit: usize },
    /// A reconciled render was requested before both snapshots were loaded.
    #[error("snapshot missing; refresh required")]
    SnapshotMissing,
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("invalid reference source identifier: {0}")]
    InvalidIdentifier(String),
}

impl From<object_store::Error> for AdminError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => AdminError::NotFound(path),
            other => AdminError::Transport(other.to_string()),
        }
    }
}
