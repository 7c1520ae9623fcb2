// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Introspection Provider: raw OS metrics for the command handlers
//!
//! Handlers are written against [`SystemProvider`] so they can be driven by
//! the host implementation or by a deterministic fake in tests.
//!
//! # Platform Support
//!
//! - **Linux**: procfs/sysfs (`/proc/stat`, `/proc/meminfo`, `/proc/<pid>/*`,
//!   `/proc/net/dev`, `/proc/mounts` + `statvfs`, `/etc/os-release`)
//! - **Other**: every query returns [`MonitorError::UnsupportedPlatform`]
//!
//! # Examples
//!
//! ```no_run
//! use rmonlib::provider::{HostProvider, SystemProvider};
//! use std::time::Duration;
//!
//! let provider = HostProvider::new(Duration::from_millis(200));
//! let mem = provider.memory().unwrap();
//! println!("RAM: {} of {} bytes available", mem.available_bytes, mem.total_bytes);
//! ```

pub mod procfs;

#[cfg(target_os = "linux")]
mod linux;

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(not(target_os = "linux"))]
use crate::error::MonitorError;
use crate::error::Result;

/// CPU frequency in MHz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuFrequency {
    pub current: f64,
    pub min: f64,
    pub max: f64,
}

/// Per-core utilisation and topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub per_core_percent: Vec<f64>,
    /// `None` when the platform exposes no frequency information
    pub frequency: Option<CpuFrequency>,
    pub physical_cores: usize,
    pub logical_cores: usize,
}

/// RAM and swap in bytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub total_bytes: u64,
    pub available_bytes: u64,
    /// (total - available) / total, one decimal
    pub percent_used: f64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
}

/// One process as seen during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    /// Resident set size
    pub rss_bytes: u64,
}

/// Cumulative counters summed over all interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

/// Usage of one mounted filesystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub mount_point: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    /// used / (used + free), one decimal
    pub percent: f64,
}

/// Identification for the `sysinfo` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsSummary {
    pub os_name: String,
    pub os_version: String,
    pub machine: String,
    pub processor: String,
}

/// Source of host metrics.
///
/// Process and disk queries are split into an enumeration step and a per-item
/// step so callers can skip items that vanish or fail without losing the rest.
pub trait SystemProvider {
    fn cpu(&self) -> Result<CpuSnapshot>;
    fn memory(&self) -> Result<MemorySnapshot>;
    /// PIDs in the platform's iteration order
    fn process_ids(&self) -> Result<Vec<u32>>;
    fn process(&self, pid: u32) -> Result<ProcessSample>;
    fn network(&self) -> Result<NetworkCounters>;
    /// Mount points of device-backed filesystems, in mount order
    fn mount_points(&self) -> Result<Vec<String>>;
    fn disk_usage(&self, mount_point: &str) -> Result<DiskUsage>;
    fn os(&self) -> Result<OsSummary>;
}

/// Provider backed by the running host
#[derive(Debug, Clone)]
pub struct HostProvider {
    cpu_sample_interval: Duration,
}

impl HostProvider {
    pub fn new(cpu_sample_interval: Duration) -> Self {
        Self {
            cpu_sample_interval,
        }
    }
}

impl Default for HostProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(target_os = "linux")]
impl SystemProvider for HostProvider {
    fn cpu(&self) -> Result<CpuSnapshot> {
        linux::cpu(self.cpu_sample_interval)
    }

    fn memory(&self) -> Result<MemorySnapshot> {
        linux::memory()
    }

    fn process_ids(&self) -> Result<Vec<u32>> {
        linux::process_ids()
    }

    fn process(&self, pid: u32) -> Result<ProcessSample> {
        linux::process(pid)
    }

    fn network(&self) -> Result<NetworkCounters> {
        linux::network()
    }

    fn mount_points(&self) -> Result<Vec<String>> {
        linux::mount_points()
    }

    fn disk_usage(&self, mount_point: &str) -> Result<DiskUsage> {
        linux::disk_usage(mount_point)
    }

    fn os(&self) -> Result<OsSummary> {
        linux::os()
    }
}

#[cfg(not(target_os = "linux"))]
fn unsupported<T>() -> Result<T> {
    Err(MonitorError::UnsupportedPlatform(
        std::env::consts::OS.to_string(),
    ))
}

#[cfg(not(target_os = "linux"))]
impl SystemProvider for HostProvider {
    fn cpu(&self) -> Result<CpuSnapshot> {
        let _ = self.cpu_sample_interval;
        unsupported()
    }

    fn memory(&self) -> Result<MemorySnapshot> {
        unsupported()
    }

    fn process_ids(&self) -> Result<Vec<u32>> {
        unsupported()
    }

    fn process(&self, _pid: u32) -> Result<ProcessSample> {
        unsupported()
    }

    fn network(&self) -> Result<NetworkCounters> {
        unsupported()
    }

    fn mount_points(&self) -> Result<Vec<String>> {
        unsupported()
    }

    fn disk_usage(&self, _mount_point: &str) -> Result<DiskUsage> {
        unsupported()
    }

    fn os(&self) -> Result<OsSummary> {
        unsupported()
    }
}
