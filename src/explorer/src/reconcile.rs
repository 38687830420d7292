//! Pure join of a tree slice with the referenced-key snapshot.
//!
//! The two inputs are independently-fetched, possibly mutually-stale
//! snapshots; classification is O(n) set membership, never a network call.

use std::collections::HashSet;

use common::model::StorageObject;

use crate::tree::ExplorerItem;

/// A file at the current level with its reference classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledFile {
    pub object: StorageObject,
    pub is_referenced: bool,
}

/// Tree-level entry after reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciledItem {
    Folder {
        name: String,
        stats: common::model::FolderStats,
    },
    File(ReconciledFile),
}

/// Statistics over the files visible at the current level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderReconciliation {
    pub total: usize,
    pub referenced: usize,
    pub orphaned: usize,
    pub total_size_bytes: u64,
}

/// Referenced/orphaned split over the entire catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub referenced_count: usize,
    pub orphaned_count: usize,
}

/// Classify every file item against the referenced-key set and aggregate the
/// per-level statistics.
pub fn reconcile(
    items: Vec<ExplorerItem>,
    referenced: &HashSet<String>,
) -> (Vec<ReconciledItem>, FolderReconciliation) {
    let mut summary = FolderReconciliation::default();

    let reconciled = items
        .into_iter()
        .map(|item| match item {
            ExplorerItem::Folder { name, stats } => ReconciledItem::Folder { name, stats },
            ExplorerItem::File(object) => {
                let is_referenced = referenced.contains(&object.key);
                summary.total += 1;
                summary.total_size_bytes += object.size;
                if is_referenced {
                    summary.referenced += 1;
                } else {
                    summary.orphaned += 1;
                }
                ReconciledItem::File(ReconciledFile {
                    object,
                    is_referenced,
                })
            }
        })
        .collect();

    (reconciled, summary)
}

/// Classify the whole catalog once per refresh.
///
/// Invariant: `referenced_count + orphaned_count` equals the catalog's total
/// file count.
pub fn global_stats(objects: &[StorageObject], referenced: &HashSet<String>) -> GlobalStats {
    let referenced_count = objects
        .iter()
        .filter(|object| referenced.contains(&object.key))
        .count();
    GlobalStats {
        referenced_count,
        orphaned_count: objects.len() - referenced_count,
    }
}
