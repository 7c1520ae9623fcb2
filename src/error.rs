// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Error types for Remote Monitor

use std::io;
use thiserror::Error;

/// Result type alias for Remote Monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Main error type for Remote Monitor
///
/// Per-command failures (`AccessDenied`, `UnknownCommand`, `Handler`) never
/// leave a request/response cycle: they are turned into a plain-text response
/// for the peer. Only `Connection` and socket-level `Io` failures end a session.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bind, listen, accept or connect failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Path resolved outside every allow-listed root
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Keyword not in the command registry
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Introspection call failed inside a handler
    #[error("Handler error: {0}")]
    Handler(String),

    /// Response could not be decoded as structured data
    #[error("Decode error: {0}")]
    Decode(String),

    /// Parse error (procfs contents, numbers, ...)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unsupported platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Nix error (Unix)
    #[cfg(unix)]
    #[error("Nix error: {0}")]
    Nix(#[from] nix::Error),
}

impl MonitorError {
    /// Whether this error must terminate the current session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MonitorError::Connection(_) | MonitorError::Io(_))
    }
}
