// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Wire protocol: command parsing and response encoding
//!
//! A command is one UTF-8 line, `<keyword>[ <argument>]`, sent in a single
//! write. The keyword is case-insensitive; the argument is free text up to the
//! end of the line. A response is either a structured payload serialized as
//! JSON with 2-space indentation, or literal plain text. There is no framing:
//! each side performs one bounded read per exchange, so anything larger than
//! the receive buffer arrives truncated.

use serde::Serialize;
use serde_json::Value;

use crate::error::{MonitorError, Result};

/// Largest command the server reads in one exchange
pub const COMMAND_BUFFER_SIZE: usize = 1024;
/// Largest response the client reads in one exchange
pub const RESPONSE_BUFFER_SIZE: usize = 4096;

pub const INVALID_COMMAND_MESSAGE: &str =
    "Invalid command. Use 'help' to see available commands.";
pub const EXIT_MESSAGE: &str = "Server shutting down...";
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied. Path not in allowed directories.";

/// Every keyword the server understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    SysInfo,
    Time,
    Echo,
    Exit,
    Cpu,
    Memory,
    Processes,
    Netstat,
    ListDir,
    DiskSpace,
}

impl CommandKind {
    /// Look up a normalized (lowercase) keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "sysinfo" => Some(Self::SysInfo),
            "time" => Some(Self::Time),
            "echo" => Some(Self::Echo),
            "exit" => Some(Self::Exit),
            "cpu" => Some(Self::Cpu),
            "memory" => Some(Self::Memory),
            "processes" => Some(Self::Processes),
            "netstat" => Some(Self::Netstat),
            "listdir" => Some(Self::ListDir),
            "diskspace" => Some(Self::DiskSpace),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::SysInfo => "sysinfo",
            Self::Time => "time",
            Self::Echo => "echo",
            Self::Exit => "exit",
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Processes => "processes",
            Self::Netstat => "netstat",
            Self::ListDir => "listdir",
            Self::DiskSpace => "diskspace",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lowercased keyword, never contains whitespace
    pub keyword: String,
    /// Raw remainder after the first whitespace run (may be empty)
    pub argument: String,
}

impl Command {
    /// Split a received line into keyword and argument.
    ///
    /// Surrounding whitespace (including a trailing newline) is ignored. The
    /// keyword is lowercased; the argument keeps its case.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.find(char::is_whitespace) {
            Some(idx) => Self {
                keyword: line[..idx].to_lowercase(),
                argument: line[idx..].trim_start().to_string(),
            },
            None => Self {
                keyword: line.to_lowercase(),
                argument: String::new(),
            },
        }
    }

    /// Registered kind, or `None` for an unknown keyword
    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_keyword(&self.keyword)
    }

    pub fn is_exit(&self) -> bool {
        self.kind() == Some(CommandKind::Exit)
    }
}

/// Exactly one of these is produced per handled command
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Structured(Value),
    PlainText(String),
}

impl Response {
    /// Build a structured response from any serializable payload
    pub fn structured<T: Serialize>(payload: &T) -> Result<Self> {
        Ok(Response::Structured(serde_json::to_value(payload)?))
    }

    pub fn text(message: impl Into<String>) -> Self {
        Response::PlainText(message.into())
    }

    /// Serialize for the wire: pretty JSON (2-space indent) or the literal text
    pub fn encode(&self) -> Result<String> {
        match self {
            Response::Structured(value) => Ok(serde_json::to_string_pretty(value)?),
            Response::PlainText(text) => Ok(text.clone()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Response::PlainText(text) => Some(text),
            Response::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Response::Structured(value) => Some(value),
            Response::PlainText(_) => None,
        }
    }
}

/// Client-side decode: structured if the payload parses as JSON, otherwise text.
pub fn decode_response(raw: &str) -> Response {
    match try_decode_structured(raw) {
        Ok(value) => Response::Structured(value),
        Err(_) => Response::PlainText(raw.to_string()),
    }
}

/// Attempt a structured decode, reporting why it failed
pub fn try_decode_structured(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| MonitorError::Decode(e.to_string()))
}
