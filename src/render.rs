// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Response Renderer
//!
//! Rendering is chosen by the command the client sent, never by sniffing the
//! payload beyond one structured-decode attempt. Text that does not decode is
//! printed as-is.

use serde_json::Value;

use crate::protocol::{decode_response, Command, CommandKind, Response};

const RESPONSE_HEADER: &str = "Server response:";

/// Turns raw response text into terminal output
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Header printed above every response
    pub fn header(&self) -> String {
        if !self.color {
            return RESPONSE_HEADER.to_string();
        }
        #[cfg(feature = "cli")]
        {
            use colored::Colorize;
            RESPONSE_HEADER.cyan().bold().to_string()
        }
        #[cfg(not(feature = "cli"))]
        {
            RESPONSE_HEADER.to_string()
        }
    }

    /// Render `raw`, the response to `command_line`
    pub fn render(&self, command_line: &str, raw: &str) -> String {
        let value = match decode_response(raw) {
            Response::Structured(value) => value,
            Response::PlainText(text) => return text,
        };

        match Command::parse(command_line).kind() {
            Some(CommandKind::Processes) => {
                render_process_table(&value).unwrap_or_else(|| pretty(&value, raw))
            }
            Some(CommandKind::ListDir) => {
                render_listing(&value).unwrap_or_else(|| pretty(&value, raw))
            }
            Some(CommandKind::Cpu)
            | Some(CommandKind::Memory)
            | Some(CommandKind::Netstat)
            | Some(CommandKind::DiskSpace) => pretty(&value, raw),
            _ => pretty(&value, raw),
        }
    }
}

fn pretty(value: &Value, raw: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| raw.to_string())
}

/// Grid table with PID, Name and Memory% columns
fn render_process_table(value: &Value) -> Option<String> {
    let entries = value.as_array()?;
    let headers = ["PID", "Name", "Memory%"];

    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry = entry.as_object()?;
        let pid = match entry.get("pid") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => "-".to_string(),
        };
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let memory = entry
            .get("memory_percent")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        rows.push([pid, name, format!("{:.1}%", memory)]);
    }

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule = |fill: char| {
        let mut line = String::from("+");
        for width in &widths {
            line.extend(std::iter::repeat(fill).take(width + 2));
            line.push('+');
        }
        line
    };
    // PID and Memory% are numeric: right-aligned
    let format_row = |cells: [&str; 3]| {
        format!(
            "| {:>w0$} | {:<w1$} | {:>w2$} |",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        )
    };

    let mut lines = vec![rule('-'), format_row(headers), rule('=')];
    for row in &rows {
        lines.push(format_row([&row[0], &row[1], &row[2]]));
        lines.push(rule('-'));
    }
    if rows.is_empty() {
        lines.push(rule('-'));
    }
    Some(lines.join("\n"))
}

/// `Contents of <path>:` followed by one indented line per entry
fn render_listing(value: &Value) -> Option<String> {
    let path = value.get("path")?.as_str()?;
    let contents = value.get("contents")?.as_array()?;

    let mut lines = vec![format!("Contents of {}:", path)];
    for item in contents {
        match item.as_str() {
            Some(name) => lines.push(format!("  {}", name)),
            None => lines.push(format!("  {}", item)),
        }
    }
    Some(lines.join("\n"))
}
