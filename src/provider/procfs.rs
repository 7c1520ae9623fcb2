// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Parsers for procfs text formats (documented in proc(5))
//!
//! Kept free of filesystem access so they can be exercised with fixtures on
//! any platform.

use std::collections::{HashMap, HashSet};

use crate::error::{MonitorError, Result};

/// Cumulative jiffies for one CPU line of `/proc/stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    /// idle + iowait
    pub idle: u64,
    /// user through steal
    pub total: u64,
}

impl CpuTimes {
    /// Busy percentage between two samples of the same core, one decimal
    pub fn busy_percent_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let idle = self.idle.saturating_sub(earlier.idle).min(total);
        round1((total - idle) as f64 / total as f64 * 100.0)
    }
}

/// Per-core lines (`cpu0`, `cpu1`, ...) of `/proc/stat`, aggregate line excluded
pub fn parse_per_core_times(stat: &str) -> Vec<CpuTimes> {
    let mut cores = Vec::new();
    for line in stat.lines() {
        let mut fields = line.split_whitespace();
        let label = match fields.next() {
            Some(label) => label,
            None => continue,
        };
        let is_core = label
            .strip_prefix("cpu")
            .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        if !is_core {
            continue;
        }

        // user nice system idle iowait irq softirq steal (guest is already in user)
        let values: Vec<u64> = fields.take(8).map(|v| v.parse().unwrap_or(0)).collect();
        let idle = values.get(3).copied().unwrap_or(0) + values.get(4).copied().unwrap_or(0);
        cores.push(CpuTimes {
            idle,
            total: values.iter().sum(),
        });
    }
    cores
}

/// `/proc/meminfo` as a map of field name to bytes
pub fn parse_meminfo(content: &str) -> HashMap<String, u64> {
    let mut fields = HashMap::new();
    for line in content.lines() {
        if let Some((key, rest)) = line.split_once(':') {
            let mut parts = rest.split_whitespace();
            if let Some(Ok(value)) = parts.next().map(str::parse::<u64>) {
                let bytes = match parts.next() {
                    Some("kB") => value * 1024,
                    _ => value,
                };
                fields.insert(key.trim().to_string(), bytes);
            }
        }
    }
    fields
}

/// Totals across every interface in `/proc/net/dev`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetDevTotals {
    pub bytes_recv: u64,
    pub packets_recv: u64,
    pub bytes_sent: u64,
    pub packets_sent: u64,
}

pub fn parse_net_dev(content: &str) -> NetDevTotals {
    let mut totals = NetDevTotals::default();
    // two header lines, then "iface: rx(8 fields) tx(8 fields)"
    for line in content.lines().skip(2) {
        let Some((_, counters)) = line.split_once(':') else {
            continue;
        };
        let values: Vec<u64> = counters
            .split_whitespace()
            .map(|v| v.parse().unwrap_or(0))
            .collect();
        if values.len() < 10 {
            continue;
        }
        totals.bytes_recv += values[0];
        totals.packets_recv += values[1];
        totals.bytes_sent += values[8];
        totals.packets_sent += values[9];
    }
    totals
}

/// Filesystem types backed by a device (no `nodev` marker in `/proc/filesystems`)
pub fn parse_physical_fstypes(content: &str) -> HashSet<String> {
    let mut types: HashSet<String> = content
        .lines()
        .filter(|line| !line.starts_with("nodev"))
        .map(|line| line.trim().to_string())
        .filter(|fstype| !fstype.is_empty())
        .collect();
    // zfs registers as nodev but is disk-backed
    types.insert("zfs".to_string());
    types
}

/// Mount points from `/proc/mounts` whose type is in `physical`, in mount order
pub fn parse_mount_points(content: &str, physical: &HashSet<String>) -> Vec<String> {
    let mut mounts = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        if physical.contains(fields[2]) {
            mounts.push(unescape_mount_field(fields[1]));
        }
    }
    mounts
}

/// Undo the octal escaping (`\040` for space) used in `/proc/mounts`
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or("");
            if let Ok(value) = u8::from_str_radix(digits, 8) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Split `/proc/<pid>/stat` into the command name and the fields after it.
///
/// The name can contain spaces and parentheses, so the last `)` ends it.
pub fn parse_stat_line(stat: &str) -> Result<(String, Vec<String>)> {
    let start = stat
        .find('(')
        .ok_or_else(|| MonitorError::Parse("No opening parenthesis in stat".to_string()))?;
    let end = stat
        .rfind(')')
        .ok_or_else(|| MonitorError::Parse("No closing parenthesis in stat".to_string()))?;
    if end < start {
        return Err(MonitorError::Parse("Malformed stat line".to_string()));
    }

    let name = stat[start + 1..end].to_string();
    let rest = stat.get(end + 1..).unwrap_or("");
    let fields = rest.split_whitespace().map(|s| s.to_string()).collect();
    Ok((name, fields))
}

/// Resident pages (second field) of `/proc/<pid>/statm`
pub fn parse_statm_resident(statm: &str) -> Result<u64> {
    statm
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| MonitorError::Parse("Insufficient fields in statm".to_string()))?
        .parse()
        .map_err(|e| MonitorError::Parse(format!("Failed to parse statm: {}", e)))
}

/// Processor identifier from `/proc/cpuinfo`
pub fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    for key in ["model name", "Hardware", "Processor", "cpu model"] {
        for line in cpuinfo.lines() {
            if let Some((k, v)) = line.split_once(':') {
                if k.trim() == key && !v.trim().is_empty() {
                    return Some(v.trim().to_string());
                }
            }
        }
    }
    None
}

/// Average of every `cpu MHz` line in `/proc/cpuinfo`
pub fn parse_cpuinfo_mhz(cpuinfo: &str) -> Option<f64> {
    let values: Vec<f64> = cpuinfo
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(k, _)| k.trim() == "cpu MHz")
        .filter_map(|(_, v)| v.trim().parse().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// `PRETTY_NAME` from `/etc/os-release`
pub fn parse_os_release_name(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|val| val.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
