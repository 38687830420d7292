//! Flat listing of the upload bucket with per-top-level-folder aggregates.
//!
//! The catalog groups every object by its first path segment only; nested
//! aggregation is derived on demand by the explorer. A failed listing is
//! surfaced whole and never partially applied.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::error::AdminError;
use common::model::{FolderStats, ROOT_FOLDER, StorageObject, top_level_folder};
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use tokio_stream::StreamExt;

/// Point-in-time listing of the bucket.
///
/// `folder_stats` covers top-level prefixes only, with keys that carry no
/// prefix grouped under the `"root"` pseudo-folder.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub objects: Vec<StorageObject>,
    pub folder_stats: HashMap<String, FolderStats>,
    pub total_count: usize,
    pub fetched_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Keys whose top-level folder equals `folder` at snapshot time.
    pub fn folder_keys(&self, folder: &str) -> Vec<String> {
        self.objects
            .iter()
            .filter(|object| object.folder == folder)
            .map(|object| object.key.clone())
            .collect()
    }

    /// Invariant: the global object count equals the sum of per-folder counts
    /// across all folders including the root pseudo-folder.
    pub fn is_consistent(&self) -> bool {
        self.total_count == self.folder_stats.values().map(|stats| stats.count).sum::<usize>()
            && self.total_count == self.objects.len()
    }
}

/// Catalog of the upload bucket, backed by an [`ObjectStore`].
pub struct ObjectCatalog {
    store: Arc<dyn ObjectStore>,
    public_url: Option<String>,
    timeout: Duration,
}

impl ObjectCatalog {
    pub fn new(store: Arc<dyn ObjectStore>, public_url: Option<String>, timeout: Duration) -> Self {
        Self {
            store,
            public_url,
            timeout,
        }
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// List every object under `prefix` (all objects when omitted), grouped
    /// into top-level folder statistics.
    pub async fn list_all(&self, prefix: Option<&str>) -> Result<CatalogSnapshot, AdminError> {
        let prefix = prefix
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ObjectPath::from);

        let objects = tokio::time::timeout(self.timeout, self.collect_objects(prefix.as_ref()))
            .await
            .map_err(|_| AdminError::Timeout {
                operation: "catalog listing",
                timeout: self.timeout,
            })??;

        let mut folder_stats: HashMap<String, FolderStats> = HashMap::new();
        for object in &objects {
            folder_stats
                .entry(object.folder.clone())
                .or_default()
                .add(object.size);
        }

        let snapshot = CatalogSnapshot {
            total_count: objects.len(),
            objects,
            folder_stats,
            fetched_at: Utc::now(),
        };

        tracing::info!(
            objects = snapshot.total_count,
            folders = snapshot.folder_stats.len(),
            "Listed upload bucket"
        );

        Ok(snapshot)
    }

    /// List one top-level folder, including the `"root"` pseudo-folder.
    pub async fn list_folder(&self, folder: &str) -> Result<CatalogSnapshot, AdminError> {
        if folder == ROOT_FOLDER {
            let full = self.list_all(None).await?;
            let objects: Vec<StorageObject> = full
                .objects
                .into_iter()
                .filter(|object| object.folder == ROOT_FOLDER)
                .collect();
            let mut folder_stats = HashMap::new();
            if let Some(stats) = full.folder_stats.get(ROOT_FOLDER) {
                folder_stats.insert(ROOT_FOLDER.to_string(), *stats);
            }
            return Ok(CatalogSnapshot {
                total_count: objects.len(),
                objects,
                folder_stats,
                fetched_at: full.fetched_at,
            });
        }

        self.list_all(Some(folder)).await
    }

    /// Resolve the set of keys belonging to `folder` at call time.
    pub async fn folder_keys(&self, folder: &str) -> Result<Vec<String>, AdminError> {
        let snapshot = self.list_folder(folder).await?;
        Ok(snapshot.folder_keys(folder))
    }

    async fn collect_objects(
        &self,
        prefix: Option<&ObjectPath>,
    ) -> Result<Vec<StorageObject>, AdminError> {
        let mut objects = Vec::new();
        let mut stream = self.store.list(prefix);

        while let Some(meta) = stream.next().await {
            let meta = meta?;
            let key = meta.location.to_string();
            let folder = top_level_folder(&key).to_string();
            let url = self.object_url(&key);
            objects.push(StorageObject {
                size: meta.size,
                last_modified: meta.last_modified,
                folder,
                url,
                key,
            });
        }

        Ok(objects)
    }

    fn object_url(&self, key: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("/{key}"),
        }
    }
}
