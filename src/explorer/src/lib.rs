//! Virtual-filesystem view over the flat upload bucket.
//!
//! `tree` derives folder/file slices from the flat listing, `reconcile` joins
//! a slice with the referenced-key set, and `session` owns the two snapshots
//! plus the operator's navigation and selection state.

pub mod reconcile;
pub mod session;
pub mod tree;

pub use reconcile::{FolderReconciliation, GlobalStats, ReconciledFile, ReconciledItem};
pub use session::{ReferenceCheckRequest, SelectionSet, Session};
pub use tree::ExplorerItem;
