// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Remote Monitor: single-client TCP remote monitoring
//!
//! A server accepts exactly one TCP connection and answers short text
//! commands (`sysinfo`, `cpu`, `memory`, `processes`, `listdir`, ...) with
//! either plain text or pretty-printed JSON. Directory listings are confined
//! to an allow-list of directories. An interactive client sends typed lines
//! and renders each response.
//!
//! # Modules
//!
//! - [`protocol`]: command parsing, response encoding and decoding
//! - [`handlers`]: command registry and the per-command handlers
//! - [`path_guard`]: allow-list enforcement for `listdir`
//! - [`provider`]: host metrics behind the [`provider::SystemProvider`] trait
//! - [`server`]: single-connection server session
//! - [`client`]: interactive client session
//! - [`render`]: terminal rendering of responses
//! - [`config`]: server and client configuration
//!
//! # Examples
//!
//! ```no_run
//! use rmonlib::client::ClientSession;
//! use rmonlib::config::ClientConfig;
//!
//! let mut session = ClientSession::connect(&ClientConfig::default())?;
//! if let Some(response) = session.send_command("time")? {
//!     println!("{}", response);
//! }
//! # Ok::<(), rmonlib::MonitorError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod path_guard;
pub mod protocol;
pub mod provider;
pub mod render;
pub mod server;

pub use error::{MonitorError, Result};
