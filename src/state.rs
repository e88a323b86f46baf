// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::{config::Config, storage::FileStore};

/// Shared handler state. Cloning is cheap; nothing inside is mutable.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: FileStore, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }
}
