// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filedrop - Single-Directory File Management Service
//!
//! An HTTP endpoint that lists, uploads, downloads and deletes files in one
//! storage root. The safety-relevant core is the filename policy: an
//! extension allow-list, upload-name sanitization, and containment of every
//! resolved path inside the root.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `config` - Environment-derived runtime configuration
//! - `logging` - Tracing subscriber setup
//! - `storage` - Filename policy and file store

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
pub mod storage;
