// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File endpoints: list, upload, download, delete.
//!
//! Handlers hold no logic of their own beyond request parsing and mapping
//! each [`StoreError`] to a status code and user-facing message. Store
//! calls are blocking filesystem I/O and run on tokio's blocking pool.

use std::io;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
        StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    Json,
};

use crate::{
    error::{ApiError, ErrorBody},
    models::{FileListResponse, MessageResponse, UploadForm, UploadResponse},
    state::AppState,
    storage::{StoreError, StoreResult},
};

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Copy)]
enum Access {
    Download,
    Delete,
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Files",
    responses(
        (status = 200, body = FileListResponse),
        (status = 500, body = ErrorBody)
    )
)]
pub async fn list_files(
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, ApiError> {
    let store = state.store.clone();
    let files = run_blocking(move || store.list()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list storage root");
        ApiError::internal(format!("Error listing files: {}", failure_cause(&e)))
    })?;
    Ok(Json(FileListResponse { files }))
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    tag = "Files",
    responses(
        (status = 201, body = UploadResponse),
        (status = 400, description = "Missing file part or filename", body = ErrorBody),
        (status = 413, description = "File exceeds the upload limit", body = ErrorBody),
        (status = 415, description = "File type not allowed", body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let limit = state.config.max_upload_size;
    let mut multipart =
        multipart.map_err(|_| ApiError::bad_request("No file part in the request"))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::bad_request("No file part in the request"))?;

    let store = state.store.clone();
    let saved = run_blocking(move || store.save(&filename, &data, limit))
        .await
        .map_err(|e| upload_error(e, limit))?;

    Ok((StatusCode::CREATED, Json(UploadResponse::new(saved))))
}

/// Non-POST upload requests go back to the listing.
pub async fn upload_redirect() -> Redirect {
    Redirect::to("/")
}

#[utoipa::path(
    get,
    path = "/download/{filename}",
    params(
        ("filename" = String, Path, description = "Name of the file to download")
    ),
    tag = "Files",
    responses(
        (status = 200, description = "Raw file bytes sent as an attachment"),
        (status = 400, description = "Invalid filename", body = ErrorBody),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 415, description = "File type not allowed", body = ErrorBody)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let file = run_blocking(move || store.read(&filename))
        .await
        .map_err(|e| access_error(e, Access::Download))?;

    let headers = [
        (CONTENT_TYPE, content_type_for(&file.name)),
        (CONTENT_DISPOSITION, attachment_disposition(&file.name)),
        (X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
    ];
    Ok((headers, file.content).into_response())
}

#[utoipa::path(
    method(get, post),
    path = "/delete/{filename}",
    params(
        ("filename" = String, Path, description = "Name of the file to delete")
    ),
    tag = "Files",
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, description = "Invalid filename", body = ErrorBody),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 415, description = "File type not allowed", body = ErrorBody)
    )
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let store = state.store.clone();
    let name = filename.clone();
    run_blocking(move || store.delete(&name))
        .await
        .map_err(|e| access_error(e, Access::Delete))?;

    Ok(Json(MessageResponse::deleted(&filename)))
}

/// Run a blocking store call on the blocking thread pool.
async fn run_blocking<T, F>(op: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .unwrap_or_else(|e| Err(StoreError::Io(io::Error::other(e.to_string()))))
}

/// Text safe to show a client: the I/O error kind, never a path.
fn failure_cause(err: &StoreError) -> String {
    match err {
        StoreError::Io(e) => e.kind().to_string(),
        other => other.to_string(),
    }
}

fn too_large(limit: usize) -> ApiError {
    ApiError::payload_too_large(format!(
        "File exceeds the maximum upload size of {limit} bytes"
    ))
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(limit)
    } else {
        tracing::debug!(error = %err, "Malformed multipart body");
        ApiError::bad_request("Invalid multipart body")
    }
}

fn upload_error(err: StoreError, limit: usize) -> ApiError {
    match err {
        StoreError::EmptyName => ApiError::bad_request("No selected file"),
        StoreError::DisallowedType => ApiError::unsupported_media_type("File type not allowed"),
        StoreError::PathEscape => ApiError::bad_request("Invalid filename"),
        StoreError::PayloadTooLarge { .. } => too_large(limit),
        StoreError::NotFound(_) | StoreError::Io(_) => {
            tracing::error!(error = %err, "Failed to save upload");
            ApiError::internal(format!("Error saving file: {}", failure_cause(&err)))
        }
    }
}

fn access_error(err: StoreError, access: Access) -> ApiError {
    match err {
        StoreError::EmptyName | StoreError::PathEscape => ApiError::bad_request("Invalid filename"),
        StoreError::DisallowedType => ApiError::unsupported_media_type(match access {
            Access::Download => "File type not allowed for download",
            Access::Delete => "File type not allowed for deletion",
        }),
        StoreError::NotFound(_) => ApiError::not_found("File not found"),
        StoreError::PayloadTooLarge { .. } | StoreError::Io(_) => {
            tracing::error!(error = %err, ?access, "File access failed");
            let verb = match access {
                Access::Download => "downloading",
                Access::Delete => "deleting",
            };
            ApiError::internal(format!("Error {verb} file: {}", failure_cause(&err)))
        }
    }
}

/// Media type guessed from the extension. Text types are served as UTF-8.
fn content_type_for(name: &str) -> String {
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    if mime.type_() == mime_guess::mime::TEXT
        && mime.get_param(mime_guess::mime::CHARSET).is_none()
    {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

/// `attachment` disposition with an ASCII fallback name and, when the real
/// name is not plain ASCII, an RFC 5987 `filename*` parameter.
fn attachment_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();

    if fallback == name {
        format!("attachment; filename=\"{name}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(name)
        )
    }
}
