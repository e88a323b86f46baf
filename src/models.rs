// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies used by the REST API. Response types derive
//! `Serialize` and `ToSchema` for JSON handling and OpenAPI documentation.
//! File contents themselves are never wrapped in JSON: downloads are raw
//! bytes and uploads are `multipart/form-data`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Current contents of the storage root.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FileListResponse {
    /// Filenames in filesystem order (not sorted).
    pub files: Vec<String>,
}

/// Acknowledgement of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UploadResponse {
    /// Name the file was stored under. May differ from the submitted name.
    pub filename: String,
    pub message: String,
}

/// Plain acknowledgement message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

/// Multipart form accepted by `POST /upload`. Documentation only; the
/// handler reads the multipart stream directly.
#[derive(ToSchema)]
pub struct UploadForm {
    /// File to store. Its client-side filename is sanitized before use.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

impl UploadResponse {
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            message: format!("File \"{filename}\" uploaded successfully"),
            filename,
        }
    }
}

impl MessageResponse {
    pub fn deleted(filename: &str) -> Self {
        Self {
            message: format!("File \"{filename}\" deleted successfully"),
        }
    }
}
