// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into a
//! [`Config`] value, which is then handed to the store and the router.
//! Nothing reads the environment after that point.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `UPLOAD_DIR` | Storage root for managed files | `uploads` |
//! | `MAX_CONTENT_LENGTH` | Maximum upload size in bytes | `16777216` |
//! | `CORS_ORIGINS` | Comma-separated trusted origins | none |
//! | `DEBUG` | Verbose logging (`1`, `true`, `yes`, `on`) | `false` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter, overrides `DEBUG` | unset |

use std::{env, net::SocketAddr, path::PathBuf};

/// Environment variable name for the storage root.
pub const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";
pub const MAX_CONTENT_LENGTH_ENV: &str = "MAX_CONTENT_LENGTH";
pub const CORS_ORIGINS_ENV: &str = "CORS_ORIGINS";
pub const DEBUG_ENV: &str = "DEBUG";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
/// 16 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {name} value {value:?}: expected {expected}")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Process-wide settings, constructed once in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding every managed file. Created at startup if absent.
    pub upload_dir: PathBuf,
    /// Upper bound on the size of a single uploaded file, in bytes.
    pub max_upload_size: usize,
    /// Origins allowed to make cross-origin requests. Empty disables CORS.
    pub cors_origins: Vec<String>,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            cors_origins: Vec::new(),
            debug: false,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Unset and blank variables fall back to their defaults; values that
    /// are present but unparseable are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Config::default();

        if let Some(dir) = get(UPLOAD_DIR_ENV) {
            config.upload_dir = PathBuf::from(dir);
        }

        if let Some(raw) = get(MAX_CONTENT_LENGTH_ENV) {
            config.max_upload_size = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: MAX_CONTENT_LENGTH_ENV,
                value: raw.clone(),
                expected: "a size in bytes",
            })?;
        }

        if let Some(raw) = get(CORS_ORIGINS_ENV) {
            config.cors_origins = parse_origins(&raw);
        }

        if let Some(raw) = get(DEBUG_ENV) {
            config.debug = parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                name: DEBUG_ENV,
                value: raw.clone(),
                expected: "a boolean flag",
            })?;
        }

        if let Some(host) = get(HOST_ENV) {
            config.host = host;
        }

        if let Some(raw) = get(PORT_ENV) {
            config.port = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: PORT_ENV,
                value: raw.clone(),
                expected: "a port number",
            })?;
        }

        if let Some(raw) = get(LOG_FORMAT_ENV) {
            config.log_format = match raw.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: LOG_FORMAT_ENV,
                        value: raw,
                        expected: "`json` or `pretty`",
                    })
                }
            };
        }

        Ok(config)
    }

    /// Socket address the server binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse()
            .map_err(|_| ConfigError::InvalidBindAddress(raw))
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
