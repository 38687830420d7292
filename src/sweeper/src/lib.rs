//! Bulk deletion against the upload bucket.
//!
//! Deletions are idempotent at the key level and never abort a batch on the
//! first failure: every key is attempted and the full success/failure
//! partition is returned once all fan-out branches complete. Reference status
//! never blocks a delete; warning the operator is the caller's concern.

use std::sync::Arc;
use std::time::Duration;

use catalog::ObjectCatalog;
use common::error::AdminError;
use common::model::BulkDeleteResult;
use futures::stream::{self, StreamExt};
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;

/// Executor for single, multi-key, and whole-folder deletions.
pub struct Sweeper {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
    timeout: Duration,
}

impl Sweeper {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Delete a single key. Deleting an already-absent key is a success.
    pub async fn delete_one(&self, key: &str) -> Result<(), AdminError> {
        let path = ObjectPath::from(key);
        let result = tokio::time::timeout(self.timeout, self.store.delete(&path))
            .await
            .map_err(|_| AdminError::Timeout {
                operation: "object delete",
                timeout: self.timeout,
            })?;

        match result {
            Ok(()) => {
                tracing::info!(key, "Deleted object");
                Ok(())
            }
            Err(object_store::Error::NotFound { .. }) => {
                tracing::debug!(key, "Delete target already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every key with bounded fan-out.
    ///
    /// The aggregated result is only produced after every branch has
    /// completed; `deleted_count` counts keys that were genuinely present,
    /// while absent or failing keys land in `failed_files`.
    pub async fn delete_many(&self, keys: Vec<String>) -> BulkDeleteResult {
        if keys.is_empty() {
            return BulkDeleteResult::default();
        }

        let attempted = keys.len();
        let outcomes = stream::iter(keys)
            .map(|key| {
                let store = Arc::clone(&self.store);
                let timeout = self.timeout;
                async move {
                    let path = ObjectPath::from(key.as_str());
                    let outcome = match tokio::time::timeout(timeout, store.delete(&path)).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!("timed out after {timeout:?}")),
                    };
                    (key, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut result = BulkDeleteResult::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(()) => result.deleted_count += 1,
                Err(reason) => {
                    tracing::warn!(key = %key, reason = %reason, "Failed to delete object");
                    result.failed_files.push(key);
                }
            }
        }
        result.failed_files.sort();

        tracing::info!(
            attempted,
            deleted = result.deleted_count,
            failed = result.failed_files.len(),
            "Bulk delete complete"
        );

        result
    }

    /// Delete every object whose folder equals `folder` at call time.
    ///
    /// The key set is resolved from a fresh listing; a failed listing aborts
    /// before anything is deleted.
    pub async fn delete_folder(
        &self,
        catalog: &ObjectCatalog,
        folder: &str,
    ) -> Result<BulkDeleteResult, AdminError> {
        let keys = catalog.folder_keys(folder).await?;
        tracing::info!(folder, keys = keys.len(), "Resolved folder for deletion");
        Ok(self.delete_many(keys).await)
    }
}
