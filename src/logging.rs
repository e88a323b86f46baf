// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence when set. Otherwise the filter follows the
//! `DEBUG` flag. `LOG_FORMAT=json` switches to one JSON object per line.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    // axum logs extractor rejections under `axum::rejection` at TRACE.
    let rejections = if debug { ",axum::rejection=trace" } else { "" };
    format!(
        "{crate_name}={level},tower_http={level}{rejections}",
        crate_name = env!("CARGO_CRATE_NAME")
    )
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.debug)));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).init(),
    }
}
