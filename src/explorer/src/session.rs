//! Operator session owning the two snapshots and the selection.
//!
//! The catalog listing and the referenced-key set are fetched concurrently
//! and joined before any reconciled render; neither is ever partially
//! applied. Navigation bumps an epoch so that reference detail resolved for
//! an abandoned path is discarded instead of applied (last navigation wins).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use catalog::{CatalogSnapshot, ObjectCatalog};
use common::error::AdminError;
use common::model::{BulkDeleteResult, ReferenceDetail};
use oracle::ReferenceOracle;
use sweeper::Sweeper;

use crate::reconcile::{self, FolderReconciliation, GlobalStats, ReconciledItem};
use crate::tree;

/// Keys marked for bulk action. Lives only for the duration of a session;
/// cleared by navigation and by a successful bulk delete.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    keys: HashSet<String>,
}

impl SelectionSet {
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.keys.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.keys.iter().cloned().collect();
        keys.sort();
        keys
    }
}

/// Epoch-tagged batch of visible keys to check, produced before the oracle
/// call and validated again when the result is applied.
#[derive(Debug, Clone)]
pub struct ReferenceCheckRequest {
    pub epoch: u64,
    pub keys: Vec<String>,
}

/// One operator's view of the bucket: snapshots, path, selection.
pub struct Session {
    catalog: ObjectCatalog,
    oracle: Arc<dyn ReferenceOracle>,
    check_limit: usize,
    snapshot: Option<CatalogSnapshot>,
    referenced: Option<HashSet<String>>,
    details: HashMap<String, ReferenceDetail>,
    current_path: Vec<String>,
    epoch: u64,
    selection: SelectionSet,
}

impl Session {
    pub fn new(catalog: ObjectCatalog, oracle: Arc<dyn ReferenceOracle>, check_limit: usize) -> Self {
        Self {
            catalog,
            oracle,
            check_limit,
            snapshot: None,
            referenced: None,
            details: HashMap::new(),
            current_path: Vec::new(),
            epoch: 0,
            selection: SelectionSet::default(),
        }
    }

    /// Fetch both snapshots concurrently. On any failure the previous state
    /// is dropped entirely so a stale reconciliation can never render.
    pub async fn refresh(&mut self) -> Result<(), AdminError> {
        self.invalidate();
        let (snapshot, referenced) = tokio::try_join!(
            self.catalog.list_all(None),
            self.oracle.referenced_key_set()
        )?;

        tracing::info!(
            objects = snapshot.total_count,
            referenced_keys = referenced.len(),
            "Session snapshots refreshed"
        );

        self.snapshot = Some(snapshot);
        self.referenced = Some(referenced);
        Ok(())
    }

    /// Drop both snapshots and any reference detail; the next render
    /// requires a refresh.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
        self.referenced = None;
        self.details.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some() && self.referenced.is_some()
    }

    pub fn snapshot(&self) -> Option<&CatalogSnapshot> {
        self.snapshot.as_ref()
    }

    /// Change the current path. Bumps the epoch, clears the selection and any
    /// reference detail fetched for the previous path.
    pub fn navigate(&mut self, path: Vec<String>) -> u64 {
        self.current_path = path;
        self.epoch += 1;
        self.selection.clear();
        self.details.clear();
        self.epoch
    }

    pub fn current_path(&self) -> &[String] {
        &self.current_path
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn loaded(&self) -> Result<(&CatalogSnapshot, &HashSet<String>), AdminError> {
        match (&self.snapshot, &self.referenced) {
            (Some(snapshot), Some(referenced)) => Ok((snapshot, referenced)),
            _ => Err(AdminError::SnapshotMissing),
        }
    }

    /// Reconciled items and file statistics at the current path.
    pub fn view(&self) -> Result<(Vec<ReconciledItem>, FolderReconciliation), AdminError> {
        let (snapshot, referenced) = self.loaded()?;
        let items = tree::build_view(&snapshot.objects, &snapshot.folder_stats, &self.current_path);
        Ok(reconcile::reconcile(items, referenced))
    }

    /// Referenced/orphaned split over the entire catalog snapshot.
    pub fn global_stats(&self) -> Result<GlobalStats, AdminError> {
        let (snapshot, referenced) = self.loaded()?;
        Ok(reconcile::global_stats(&snapshot.objects, referenced))
    }

    fn visible_file_keys(&self) -> Result<Vec<String>, AdminError> {
        let (items, _) = self.view()?;
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                ReconciledItem::File(file) => Some(file.object.key),
                ReconciledItem::Folder { .. } => None,
            })
            .collect())
    }

    /// Prepare an epoch-tagged reference check for the visible files.
    ///
    /// Fails with [`AdminError::ReferenceCheckSkipped`] when the visible set
    /// exceeds the configured limit; membership classification from the
    /// referenced-key set remains available in that degraded mode.
    pub fn reference_check_request(&self) -> Result<ReferenceCheckRequest, AdminError> {
        let keys = self.visible_file_keys()?;
        if keys.len() > self.check_limit {
            return Err(AdminError::ReferenceCheckSkipped {
                visible: keys.len(),
                limit: self.check_limit,
            });
        }
        Ok(ReferenceCheckRequest {
            epoch: self.epoch,
            keys,
        })
    }

    /// Apply resolved reference detail. Returns false (and applies nothing)
    /// when the session has navigated since the request was issued.
    pub fn apply_reference_detail(
        &mut self,
        epoch: u64,
        details: HashMap<String, ReferenceDetail>,
    ) -> bool {
        if epoch != self.epoch {
            tracing::debug!(
                stale_epoch = epoch,
                current_epoch = self.epoch,
                "Discarding reference detail for abandoned path"
            );
            return false;
        }
        self.details.extend(details);
        true
    }

    /// Convenience path: issue the check and apply it in one step. Returns
    /// whether detail was applied; a skipped check is not an error.
    pub async fn load_reference_detail(&mut self) -> Result<bool, AdminError> {
        let request = match self.reference_check_request() {
            Ok(request) => request,
            Err(AdminError::ReferenceCheckSkipped { visible, limit }) => {
                tracing::info!(visible, limit, "Reference detail skipped for large folder");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let details = self.oracle.check_references(&request.keys).await?;
        Ok(self.apply_reference_detail(request.epoch, details))
    }

    pub fn reference_detail(&self, key: &str) -> Option<&ReferenceDetail> {
        self.details.get(key)
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn select(&mut self, key: impl Into<String>) {
        self.selection.insert(key);
    }

    pub fn deselect(&mut self, key: &str) {
        self.selection.remove(key);
    }

    /// Delete the selected keys. Even a partially successful delete clears
    /// the selection and invalidates the catalog snapshot; the next render
    /// must re-list so the folder totals cannot drift.
    pub async fn delete_selected(&mut self, sweeper: &Sweeper) -> BulkDeleteResult {
        let keys = self.selection.keys();
        if keys.is_empty() {
            return BulkDeleteResult::default();
        }

        let result = sweeper.delete_many(keys).await;
        self.selection.clear();
        self.invalidate();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::ObjectStore;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use oracle::testing::StaticOracle;
    use std::time::Duration;

    async fn seeded_store() -> Arc<dyn ObjectStore> {
        let store = InMemory::new();
        for (key, size) in [("a/x.png", 10usize), ("a/y.png", 20), ("b/z.png", 5)] {
            store
                .put(&ObjectPath::from(key), vec![0u8; size].into())
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    fn session_with(
        store: Arc<dyn ObjectStore>,
        oracle: StaticOracle,
        check_limit: usize,
    ) -> Session {
        let catalog = ObjectCatalog::new(store, None, Duration::from_secs(5));
        Session::new(catalog, Arc::new(oracle), check_limit)
    }

    #[tokio::test]
    async fn test_refresh_then_view_root() {
        let mut session = session_with(
            seeded_store().await,
            StaticOracle::with_referenced_keys(["a/x.png"]),
            100,
        );
        session.refresh().await.unwrap();

        let (items, summary) = session.view().unwrap();
        assert_eq!(items.len(), 2); // folders a and b, no root files
        assert!(items
            .iter()
            .all(|item| matches!(item, ReconciledItem::Folder { .. })));
        assert_eq!(summary.total, 0);

        let global = session.global_stats().unwrap();
        assert_eq!(global.referenced_count, 1);
        assert_eq!(global.orphaned_count, 2);
        assert_eq!(
            global.referenced_count + global.orphaned_count,
            session.snapshot().unwrap().total_count
        );
    }

    #[tokio::test]
    async fn test_view_before_refresh_is_refused() {
        let session = session_with(seeded_store().await, StaticOracle::default(), 100);
        assert!(matches!(session.view(), Err(AdminError::SnapshotMissing)));
    }

    #[tokio::test]
    async fn test_failed_oracle_leaves_no_stale_state() {
        let mut session = session_with(seeded_store().await, StaticOracle::failing(), 100);

        assert!(session.refresh().await.is_err());
        assert!(!session.is_loaded());
        assert!(matches!(session.view(), Err(AdminError::SnapshotMissing)));
    }

    #[tokio::test]
    async fn test_navigation_reclassifies_files() {
        let mut session = session_with(
            seeded_store().await,
            StaticOracle::with_referenced_keys(["a/x.png"]),
            100,
        );
        session.refresh().await.unwrap();
        session.navigate(vec!["a".to_string()]);

        let (items, summary) = session.view().unwrap();
        let flags: Vec<(&str, bool)> = items
            .iter()
            .filter_map(|item| match item {
                ReconciledItem::File(file) => {
                    Some((file.object.key.as_str(), file.is_referenced))
                }
                ReconciledItem::Folder { .. } => None,
            })
            .collect();
        assert_eq!(flags, vec![("a/x.png", true), ("a/y.png", false)]);
        assert_eq!(summary.referenced, 1);
        assert_eq!(summary.orphaned, 1);
    }

    #[tokio::test]
    async fn test_reference_detail_round_trip() {
        let oracle = StaticOracle::default().with_record(
            "a/x.png",
            common::model::ReferenceRecord {
                collection: "pets".to_string(),
                field: "photo_key".to_string(),
                count: 2,
            },
        );
        let mut session = session_with(seeded_store().await, oracle, 100);
        session.refresh().await.unwrap();
        session.navigate(vec!["a".to_string()]);

        assert!(session.load_reference_detail().await.unwrap());
        let detail = session.reference_detail("a/x.png").unwrap();
        assert!(detail.is_referenced);
        assert_eq!(detail.references[0].collection, "pets");
        assert!(!session.reference_detail("a/y.png").unwrap().is_referenced);
    }

    #[tokio::test]
    async fn test_large_folder_skips_reference_detail() {
        // Two visible files against a limit of one: degraded mode
        let mut session = session_with(
            seeded_store().await,
            StaticOracle::with_referenced_keys(["a/x.png"]),
            1,
        );
        session.refresh().await.unwrap();
        session.navigate(vec!["a".to_string()]);

        assert!(matches!(
            session.reference_check_request(),
            Err(AdminError::ReferenceCheckSkipped {
                visible: 2,
                limit: 1
            })
        ));
        assert!(!session.load_reference_detail().await.unwrap());
        assert!(session.reference_detail("a/x.png").is_none());

        // Membership classification still works
        let (_, summary) = session.view().unwrap();
        assert_eq!(summary.referenced, 1);
        assert_eq!(summary.orphaned, 1);
    }

    #[tokio::test]
    async fn test_stale_reference_detail_is_discarded() {
        let mut session = session_with(
            seeded_store().await,
            StaticOracle::with_referenced_keys(["a/x.png"]),
            100,
        );
        session.refresh().await.unwrap();
        session.navigate(vec!["a".to_string()]);

        let request = session.reference_check_request().unwrap();
        let details = session.oracle.check_references(&request.keys).await.unwrap();

        // Operator navigates away before the response lands
        session.navigate(vec!["b".to_string()]);

        assert!(!session.apply_reference_detail(request.epoch, details));
        assert!(session.reference_detail("a/x.png").is_none());
    }

    #[tokio::test]
    async fn test_navigation_clears_selection() {
        let mut session = session_with(seeded_store().await, StaticOracle::default(), 100);
        session.refresh().await.unwrap();
        session.select("a/x.png");
        session.select("a/y.png");
        assert_eq!(session.selection().len(), 2);

        session.navigate(vec!["b".to_string()]);
        assert!(session.selection().is_empty());
    }

    #[tokio::test]
    async fn test_delete_selected_invalidates_catalog() {
        let store = seeded_store().await;
        let mut session = session_with(
            Arc::clone(&store),
            StaticOracle::with_referenced_keys(["a/x.png"]),
            100,
        );
        let sweeper = Sweeper::new(Arc::clone(&store), 4, Duration::from_secs(5));

        session.refresh().await.unwrap();
        session.select("a/x.png");
        session.select("a/y.png");

        let result = session.delete_selected(&sweeper).await;
        assert_eq!(result.deleted_count, 2);
        assert!(session.selection().is_empty());
        assert!(!session.is_loaded());

        session.refresh().await.unwrap();
        let snapshot = session.snapshot().unwrap();
        assert_eq!(snapshot.total_count, 1);
        assert!(snapshot.is_consistent());
        assert!(!snapshot.folder_stats.contains_key("a"));
    }

    #[tokio::test]
    async fn test_delete_with_empty_selection_is_a_noop() {
        let store = seeded_store().await;
        let mut session = session_with(Arc::clone(&store), StaticOracle::default(), 100);
        let sweeper = Sweeper::new(store, 4, Duration::from_secs(5));

        session.refresh().await.unwrap();
        let result = session.delete_selected(&sweeper).await;
        assert_eq!(result, BulkDeleteResult::default());
        // Nothing was deleted, so the snapshot stays valid
        assert!(session.is_loaded());
    }
}
