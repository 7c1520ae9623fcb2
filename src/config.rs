// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Server and client configuration
//!
//! Both sides default to `127.0.0.1:65432`. The server can additionally be
//! configured from a TOML file; command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{MonitorError, Result};

/// Default bind/connect host
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default bind/connect port
pub const DEFAULT_PORT: u16 = 65432;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    /// Filter string understood by `env_logger`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory roots `listdir` may look inside, relative to `base_dir`
    pub allowed_dirs: Vec<PathBuf>,
    /// Base that relative `listdir` arguments and allow-list entries resolve against
    pub base_dir: PathBuf,
    /// Sampling window for per-core CPU utilisation
    pub cpu_sample_interval_ms: u64,
    pub log_level: LogLevel,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            allowed_dirs: vec![PathBuf::from("./shared"), PathBuf::from("./downloads")],
            base_dir: PathBuf::from("."),
            cpu_sample_interval_ms: 1000,
            log_level: LogLevel::Info,
        }
    }
}

impl ServerConfig {
    /// Load from TOML file
    pub fn from_toml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::Configuration(format!("Cannot read {}: {}", path, e)))?;
        Self::from_toml(&content)
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MonitorError::Configuration(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.allowed_dirs.is_empty() {
            return Err(MonitorError::Configuration(
                "allowed_dirs must name at least one directory".into(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(MonitorError::Configuration("host must not be empty".into()));
        }
        Ok(())
    }

    /// Get listen address
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Generate sample config
    pub fn sample_toml() -> String {
        r#"# Remote Monitor Server Configuration
host = "127.0.0.1"
port = 65432
# Directories listdir may access (created at startup if missing)
allowed_dirs = ["./shared", "./downloads"]
base_dir = "."
cpu_sample_interval_ms = 1000
log_level = "Info"
"#
        .into()
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

impl ClientConfig {
    /// Get server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
