use crate::RouterState;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use common::error::AdminError;
use common::model::{ApiResponse, BulkDeleteResult, FolderStats, ReferenceRecord, StorageObject};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Create the upload-admin file management routes
pub fn router<S: RouterState>() -> Router<S> {
    Router::new()
        .route("/files", get(list_files::<S>).delete(delete_files::<S>))
        .route("/files/folder/:folder", get(list_folder::<S>))
        .route("/files/check-references", post(check_references::<S>))
        .route("/files/referenced", get(referenced_keys::<S>))
        .route("/file", delete(delete_file::<S>))
        .route("/folder", delete(delete_folder::<S>))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListing {
    pub files: Vec<StorageObject>,
    pub total_files: usize,
    pub folder_stats: HashMap<String, FolderStats>,
    pub is_truncated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileQuery {
    pub file_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFilesRequest {
    pub file_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFolderQuery {
    pub folder: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReferencesRequest {
    pub file_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReferenceStatus {
    pub file_key: String,
    pub is_referenced: bool,
    pub references: Vec<ReferenceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReferencesResponse {
    pub files: Vec<FileReferenceStatus>,
    pub referenced_count: usize,
    pub orphaned_count: usize,
}

/// GET /upload-admin/files[?prefix=]
///
/// Full flat listing with per-top-level-folder statistics
#[tracing::instrument]
pub async fn list_files<S: RouterState>(
    state: State<S>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.catalog().list_all(query.prefix.as_deref()).await {
        Ok(snapshot) => {
            let listing = FileListing {
                total_files: snapshot.total_count,
                files: snapshot.objects,
                folder_stats: snapshot.folder_stats,
                is_truncated: false,
            };
            (StatusCode::OK, Json(ApiResponse::ok(listing))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /upload-admin/files/folder/:folder
///
/// Listing scoped to one top-level folder (or the "root" pseudo-folder)
#[tracing::instrument]
pub async fn list_folder<S: RouterState>(
    state: State<S>,
    Path(folder): Path<String>,
) -> Response {
    match state.catalog().list_folder(&folder).await {
        Ok(snapshot) => {
            let listing = FileListing {
                total_files: snapshot.total_count,
                files: snapshot.objects,
                folder_stats: snapshot.folder_stats,
                is_truncated: false,
            };
            (StatusCode::OK, Json(ApiResponse::ok(listing))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// DELETE /upload-admin/file?fileName=
///
/// Single-key delete; an already-absent key is a success
#[tracing::instrument]
pub async fn delete_file<S: RouterState>(
    state: State<S>,
    Query(query): Query<DeleteFileQuery>,
) -> Response {
    match state.sweeper().delete_one(&query.file_name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /upload-admin/files
///
/// Multi-key delete; every key is attempted and the full partition returned
#[tracing::instrument]
pub async fn delete_files<S: RouterState>(
    state: State<S>,
    Json(request): Json<DeleteFilesRequest>,
) -> Response {
    let result = state.sweeper().delete_many(request.file_names).await;
    bulk_delete_response(result)
}

/// DELETE /upload-admin/folder?folder=
///
/// Whole-folder delete; the key set is resolved at call time
#[tracing::instrument]
pub async fn delete_folder<S: RouterState>(
    state: State<S>,
    Query(query): Query<DeleteFolderQuery>,
) -> Response {
    match state
        .sweeper()
        .delete_folder(state.catalog(), &query.folder)
        .await
    {
        Ok(result) => bulk_delete_response(result),
        Err(e) => error_response(e),
    }
}

/// POST /upload-admin/files/check-references
///
/// Per-key reference detail for a bounded batch. Above the configured limit
/// the response degrades to membership-only classification with a notice;
/// that is not an error.
#[tracing::instrument]
pub async fn check_references<S: RouterState>(
    state: State<S>,
    Json(request): Json<CheckReferencesRequest>,
) -> Response {
    let limit = state.config().admin.reference_check_limit;
    let keys = request.file_keys;

    if keys.len() > limit {
        let notice = AdminError::ReferenceCheckSkipped {
            visible: keys.len(),
            limit,
        };
        let referenced = match state.oracle().referenced_key_set().await {
            Ok(set) => set,
            Err(e) => return error_response(e),
        };
        let files: Vec<FileReferenceStatus> = keys
            .into_iter()
            .map(|file_key| FileReferenceStatus {
                is_referenced: referenced.contains(&file_key),
                references: Vec::new(),
                file_key,
            })
            .collect();
        let response = summarize(files);
        return (
            StatusCode::OK,
            Json(ApiResponse::ok_with_message(response, notice.to_string())),
        )
            .into_response();
    }

    match state.oracle().check_references(&keys).await {
        Ok(mut details) => {
            let files: Vec<FileReferenceStatus> = keys
                .into_iter()
                .map(|file_key| {
                    let detail = details.remove(&file_key).unwrap_or_default();
                    FileReferenceStatus {
                        is_referenced: detail.is_referenced,
                        references: detail.references,
                        file_key,
                    }
                })
                .collect();
            (StatusCode::OK, Json(ApiResponse::ok(summarize(files)))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /upload-admin/files/referenced
///
/// The global referenced-key set as a sorted list
#[tracing::instrument]
pub async fn referenced_keys<S: RouterState>(state: State<S>) -> Response {
    match state.oracle().referenced_key_set().await {
        Ok(set) => {
            let mut keys: Vec<String> = set.into_iter().collect();
            keys.sort();
            (StatusCode::OK, Json(ApiResponse::ok(keys))).into_response()
        }
        Err(e) => error_response(e),
    }
}

fn summarize(files: Vec<FileReferenceStatus>) -> CheckReferencesResponse {
    let referenced_count = files.iter().filter(|file| file.is_referenced).count();
    let orphaned_count = files.len() - referenced_count;
    CheckReferencesResponse {
        files,
        referenced_count,
        orphaned_count,
    }
}

fn bulk_delete_response(result: BulkDeleteResult) -> Response {
    let response = if result.is_partial_failure() {
        let message = format!(
            "{} of {} objects could not be deleted",
            result.failed_files.len(),
            result.deleted_count + result.failed_files.len()
        );
        ApiResponse::ok_with_message(result, message)
    } else {
        ApiResponse::ok(result)
    };
    (StatusCode::OK, Json(response)).into_response()
}

fn error_response(err: AdminError) -> Response {
    let status = match &err {
        AdminError::NotFound(_) => StatusCode::NOT_FOUND,
        AdminError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AdminError::Transport(_) | AdminError::Database(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiResponse::<serde_json::Value>::error(
            status.as_u16(),
            err.to_string(),
        )),
    )
        .into_response()
}
