use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pseudo-folder for keys that carry no `/` prefix.
pub const ROOT_FOLDER: &str = "root";

/// One object in the upload bucket, as reported by the storage backend.
///
/// The `folder` is the top-level logical prefix derived from the key; `url`
/// is derived from the configured public base URL and is not authoritative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub folder: String,
    pub url: String,
}

/// Return the top-level folder segment of a key, or [`ROOT_FOLDER`] when the
/// key has no prefix.
pub fn top_level_folder(key: &str) -> &str {
    match key.split_once('/') {
        Some((folder, rest)) if !folder.is_empty() && !rest.is_empty() => folder,
        _ => ROOT_FOLDER,
    }
}

/// Aggregate statistics for one top-level folder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderStats {
    pub count: usize,
    pub total_size: u64,
}

impl FolderStats {
    pub fn add(&mut self, size: u64) {
        self.count += 1;
        self.total_size += size;
    }
}

/// One place in the system of record pointing at a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRecord {
    pub collection: String,
    pub field: String,
    pub count: i64,
}

/// Per-key reference classification with the entity locations that hold it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDetail {
    pub is_referenced: bool,
    pub references: Vec<ReferenceRecord>,
}

/// Full partition of a bulk deletion: keys removed and keys that could not be.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResult {
    pub deleted_count: usize,
    pub failed_files: Vec<String>,
}

impl BulkDeleteResult {
    pub fn is_partial_failure(&self) -> bool {
        !self.failed_files.is_empty()
    }
}

/// Wire envelope shared by every endpoint response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: u16,
    pub data: Option<T>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::ok_with_message(data, "ok")
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: 200,
            data: Some(data),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            data: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
