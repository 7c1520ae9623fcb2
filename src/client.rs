// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Client Session: connect once, send command lines, render responses
//!
//! The interactive loop consumes [`InputEvent`]s rather than reading stdin
//! directly, so an interrupt can be delivered on the same channel as typed
//! lines and the loop can be driven from tests.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::config::ClientConfig;
use crate::error::{MonitorError, Result};
use crate::protocol::{Command, RESPONSE_BUFFER_SIZE};
use crate::render::Renderer;

pub const PROMPT: &str = "\nEnter command: ";

pub const HELP_TEXT: &str = "
Available Commands:
-----------------
System Information:
  sysinfo        - Get detailed system information
  cpu            - Get CPU usage and information
  memory         - Get memory usage statistics
  diskspace      - Get disk space information

Process Management:
  processes      - List top 10 processes by memory usage

Network:
  netstat        - Get network statistics
  time           - Get server time

File Operations:
  listdir [path] - List contents of allowed directories

Other:
  echo <message> - Echo a message
  help           - Show this help
  exit           - Close connection
";

/// What the interactive loop receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// One line typed by the user
    Line(String),
    /// User-initiated cancellation (Ctrl+C)
    Interrupted,
    /// Input stream closed
    EndOfInput,
}

/// Why the interactive loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEnd {
    /// `exit` was sent and acknowledged
    Exited,
    Interrupted,
    EndOfInput,
    /// Zero-length read: the server went away
    ServerClosed,
    /// Send or receive failed
    Failed(String),
}

/// Connection to a monitoring server
pub struct ClientSession {
    stream: Option<TcpStream>,
    address: String,
}

impl ClientSession {
    /// Single connection attempt, no retry
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let address = config.server_address();
        match TcpStream::connect(&address) {
            Ok(stream) => {
                log::info!("Connected to server at {}", address);
                Ok(Self {
                    stream: Some(stream),
                    address,
                })
            }
            Err(e) => {
                log::error!("Connection failed: {}", e);
                Err(MonitorError::Connection(format!(
                    "Failed to connect to {}: {}",
                    address, e
                )))
            }
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one raw command line and block for exactly one response read.
    ///
    /// `Ok(None)` means the server closed the connection.
    pub fn send_command(&mut self, command: &str) -> Result<Option<String>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| MonitorError::Connection("not connected".to_string()))?;

        stream.write_all(command.as_bytes())?;
        stream.flush()?;

        let mut buf = [0u8; RESPONSE_BUFFER_SIZE];
        let n = loop {
            match stream.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned()))
    }

    /// Interactive loop. Always closes the connection before returning.
    pub fn run<I, W>(&mut self, events: I, renderer: &Renderer, out: &mut W) -> Result<LoopEnd>
    where
        I: IntoIterator<Item = InputEvent>,
        W: Write,
    {
        let result = self.run_loop(events.into_iter(), renderer, out);
        self.close();
        result
    }

    fn run_loop<I, W>(&mut self, mut events: I, renderer: &Renderer, out: &mut W) -> Result<LoopEnd>
    where
        I: Iterator<Item = InputEvent>,
        W: Write,
    {
        writeln!(out, "{}", HELP_TEXT)?;
        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            let line = match events.next() {
                Some(InputEvent::Line(line)) => line,
                Some(InputEvent::Interrupted) => {
                    writeln!(out, "\nClient shutting down...")?;
                    return Ok(LoopEnd::Interrupted);
                }
                Some(InputEvent::EndOfInput) | None => {
                    writeln!(out)?;
                    return Ok(LoopEnd::EndOfInput);
                }
            };

            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if command.eq_ignore_ascii_case("help") {
                writeln!(out, "{}", HELP_TEXT)?;
                continue;
            }

            let response = match self.send_command(command) {
                Ok(Some(response)) => response,
                Ok(None) => {
                    writeln!(out, "\nServer closed the connection.")?;
                    return Ok(LoopEnd::ServerClosed);
                }
                Err(err) => {
                    log::error!("Error sending command: {}", err);
                    writeln!(out, "\nError sending command: {}", err)?;
                    return Ok(LoopEnd::Failed(err.to_string()));
                }
            };

            writeln!(out, "\n{}", renderer.header())?;
            writeln!(out, "{}", renderer.render(command, &response))?;

            if Command::parse(command).is_exit() {
                return Ok(LoopEnd::Exited);
            }
        }
    }

    /// Close the socket. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            log::info!("Client cleaned up and shut down");
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{registry_in, FakeProvider};
    use crate::protocol::{ACCESS_DENIED_MESSAGE, EXIT_MESSAGE};
    use crate::server::{MonitorServer, SessionEnd};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::TempDir;

    fn spawn_server(tmp: &TempDir) -> (ClientConfig, thread::JoinHandle<Result<SessionEnd>>) {
        let server =
            MonitorServer::bind("127.0.0.1:0", registry_in(tmp, FakeProvider::default())).unwrap();
        let addr = server.local_addr().unwrap();
        let config = ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
        };
        (config, thread::spawn(move || server.serve_once()))
    }

    fn lines(items: &[&str]) -> Vec<InputEvent> {
        items.iter().map(|s| InputEvent::Line(s.to_string())).collect()
    }

    #[test]
    fn test_connect_failure_reported() {
        // grab a free port, then release it so nothing is listening
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let config = ClientConfig {
            host: "127.0.0.1".into(),
            port,
        };
        let err = ClientSession::connect(&config).err().unwrap();
        assert!(matches!(err, MonitorError::Connection(_)));
    }

    #[test]
    fn test_full_session_until_exit() {
        let tmp = TempDir::new().unwrap();
        let (config, handle) = spawn_server(&tmp);
        let mut client = ClientSession::connect(&config).unwrap();

        let mut out = Vec::new();
        let end = client
            .run(
                lines(&[
                    "",
                    "   ",
                    "echo hello world",
                    "listdir ../../etc",
                    "memory",
                    "exit",
                    "time",
                ]),
                &Renderer::new(false),
                &mut out,
            )
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(end, LoopEnd::Exited);
        assert!(client.send_command("echo after exit").is_err());
        assert!(out.contains("Echo: hello world"));
        assert!(out.contains(ACCESS_DENIED_MESSAGE));
        assert!(out.contains("\"percent_used\": \"50.0%\""));
        assert!(out.contains(EXIT_MESSAGE));
        assert!(!out.contains("Server time:"));
        // one response header per command actually sent
        assert_eq!(out.matches("Server response:").count(), 4);
        assert_eq!(handle.join().unwrap().unwrap(), SessionEnd::ExitRequested);
    }

    #[test]
    fn test_processes_rendered_as_table() {
        let tmp = TempDir::new().unwrap();
        let (config, handle) = spawn_server(&tmp);
        let mut client = ClientSession::connect(&config).unwrap();

        let mut out = Vec::new();
        client
            .run(lines(&["processes", "exit"]), &Renderer::default(), &mut out)
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("| PID | Name | Memory% |"));
        assert!(out.contains("|   2 | db   |   39.1% |"));
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_help_and_empty_lines_stay_local() {
        let tmp = TempDir::new().unwrap();
        let (config, handle) = spawn_server(&tmp);
        let mut client = ClientSession::connect(&config).unwrap();

        let mut out = Vec::new();
        let end = client
            .run(lines(&["", "help"]), &Renderer::default(), &mut out)
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(end, LoopEnd::EndOfInput);
        assert_eq!(out.matches("Available Commands:").count(), 2);
        assert!(!out.contains("Server response:"));
        // closing the client is a disconnect from the server's point of view
        assert_eq!(handle.join().unwrap().unwrap(), SessionEnd::PeerDisconnected);
    }

    #[test]
    fn test_interrupt_breaks_loop_and_closes() {
        let tmp = TempDir::new().unwrap();
        let (config, handle) = spawn_server(&tmp);
        let mut client = ClientSession::connect(&config).unwrap();

        let mut events = lines(&["echo one"]);
        events.push(InputEvent::Interrupted);
        events.extend(lines(&["echo never sent"]));

        let mut out = Vec::new();
        let end = client.run(events, &Renderer::default(), &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(end, LoopEnd::Interrupted);
        assert!(out.contains("Client shutting down..."));
        assert!(!out.contains("never sent"));

        client.close();
        client.close();
        assert!(client.send_command("echo x").is_err());
        assert_eq!(handle.join().unwrap().unwrap(), SessionEnd::PeerDisconnected);
    }
}
