// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Server Session
//!
//! The server binds, accepts exactly one connection, serves it until the peer
//! sends `exit` or disconnects, then releases both sockets. It never
//! re-accepts.
//!
//! ```text
//! Listening --accept--> Connected --exit / EOF / socket error--> Closed
//! ```
//!
//! All I/O is blocking and unbounded in time: a stalled peer stalls the
//! server.
//!
//! # Examples
//!
//! ```no_run
//! use rmonlib::config::ServerConfig;
//! use rmonlib::server::MonitorServer;
//!
//! let server = MonitorServer::from_config(&ServerConfig::default()).unwrap();
//! let outcome = server.serve_once().unwrap();
//! println!("session ended: {}", outcome);
//! ```

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::{MonitorError, Result};
use crate::handlers::CommandRegistry;
use crate::path_guard::PathGuard;
use crate::protocol::{Command, COMMAND_BUFFER_SIZE};
use crate::provider::{HostProvider, SystemProvider};

/// Server lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Listening,
    Connected,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listening => write!(f, "Listening"),
            Self::Connected => write!(f, "Connected"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Why a session reached `Closed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer sent `exit`; the acknowledgment was written first
    ExitRequested,
    /// Zero-length read
    PeerDisconnected,
    /// Unrecoverable socket error while serving
    Failed(String),
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExitRequested => write!(f, "exit requested"),
            Self::PeerDisconnected => write!(f, "peer disconnected"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Single-connection monitoring server
pub struct MonitorServer<P: SystemProvider> {
    listener: TcpListener,
    registry: CommandRegistry<P>,
    state: SessionState,
}

impl MonitorServer<HostProvider> {
    /// Prepare the allow-list, bind and listen as configured
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        let guard = PathGuard::new(&config.base_dir, &config.allowed_dirs)?;
        for root in guard.allow_list().roots() {
            log::info!("listdir allowed under {}", root.display());
        }
        let provider = HostProvider::new(Duration::from_millis(config.cpu_sample_interval_ms));
        Self::bind(&config.listen_address(), CommandRegistry::new(guard, provider))
    }
}

impl<P: SystemProvider> MonitorServer<P> {
    /// Bind and listen on `address`. Failure here is fatal for the process.
    pub fn bind(address: &str, registry: CommandRegistry<P>) -> Result<Self> {
        let listener = TcpListener::bind(address).map_err(|e| {
            MonitorError::Connection(format!("Failed to bind to {}: {}", address, e))
        })?;
        let server = Self {
            listener,
            registry,
            state: SessionState::Listening,
        };
        match server.local_addr() {
            Ok(addr) => log::info!("Server listening on {}", addr),
            Err(_) => log::info!("Server listening on {}", address),
        }
        Ok(server)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one connection, serve it to completion, and close everything.
    pub fn serve_once(mut self) -> Result<SessionEnd> {
        let (stream, peer) = self
            .listener
            .accept()
            .map_err(|e| MonitorError::Connection(format!("Accept failed: {}", e)))?;
        self.transition(SessionState::Connected);
        log::info!("Connection from {}", peer);

        let outcome = ServerSession::new(stream, peer, &self.registry).run();
        match &outcome {
            SessionEnd::Failed(reason) => log::error!("Session with {} failed: {}", peer, reason),
            other => log::info!("Session with {} ended: {}", peer, other),
        }

        self.transition(SessionState::Closed);
        drop(self.listener);
        log::info!("Server cleaned up and shut down");
        Ok(outcome)
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("session state {} -> {}", self.state, next);
        self.state = next;
    }
}

/// One accepted connection
pub struct ServerSession<'a, P: SystemProvider> {
    stream: TcpStream,
    peer: SocketAddr,
    registry: &'a CommandRegistry<P>,
}

impl<'a, P: SystemProvider> ServerSession<'a, P> {
    pub fn new(stream: TcpStream, peer: SocketAddr, registry: &'a CommandRegistry<P>) -> Self {
        Self {
            stream,
            peer,
            registry,
        }
    }

    /// Serve commands until a terminating condition; the socket is closed on return.
    pub fn run(mut self) -> SessionEnd {
        let outcome = loop {
            let result = self.exchange();
            if let Some(end) = session_end(result) {
                break end;
            }
        };
        let _ = self.stream.shutdown(Shutdown::Both);
        outcome
    }

    /// One read-dispatch-write cycle. `Some` ends the session.
    fn exchange(&mut self) -> Result<Option<SessionEnd>> {
        let mut buf = [0u8; COMMAND_BUFFER_SIZE];
        let n = loop {
            match self.stream.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    log::error!("Client {} disconnected unexpectedly", self.peer);
                    return Ok(Some(SessionEnd::PeerDisconnected));
                }
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            return Ok(Some(SessionEnd::PeerDisconnected));
        }

        let line = String::from_utf8_lossy(&buf[..n]);
        let command = Command::parse(&line);
        let dispatch = self.registry.dispatch(&command);

        match dispatch.response.encode() {
            Ok(payload) => self.send(&payload)?,
            Err(err) => {
                self.send(&format!("Error encoding response: {}", err))?;
                return Err(err);
            }
        }

        if dispatch.terminate {
            Ok(Some(SessionEnd::ExitRequested))
        } else {
            Ok(None)
        }
    }

    fn send(&mut self, payload: &str) -> Result<()> {
        self.stream.write_all(payload.as_bytes())?;
        self.stream.flush()?;
        Ok(())
    }
}

/// Decide whether one exchange ended the session.
///
/// Fatal errors close the session as [`SessionEnd::Failed`]; anything else
/// was already answered and the session keeps reading.
fn session_end(result: Result<Option<SessionEnd>>) -> Option<SessionEnd> {
    match result {
        Ok(end) => end,
        Err(err) if err.is_fatal() => Some(SessionEnd::Failed(err.to_string())),
        Err(err) => {
            log::warn!("Command failed: {}", err);
            None
        }
    }
}
