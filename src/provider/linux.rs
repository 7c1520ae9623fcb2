// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Linux host metrics from procfs and sysfs

use std::fs;
use std::path::Path;
use std::time::Duration;

use super::procfs::{self, round1};
use super::{
    CpuFrequency, CpuSnapshot, DiskUsage, MemorySnapshot, NetworkCounters, OsSummary,
    ProcessSample,
};
use crate::error::{MonitorError, Result};

const CPU_SYSFS: &str = "/sys/devices/system/cpu";
const FALLBACK_PAGE_SIZE: u64 = 4096;

pub fn cpu(sample_interval: Duration) -> Result<CpuSnapshot> {
    let before = procfs::parse_per_core_times(&fs::read_to_string("/proc/stat")?);
    std::thread::sleep(sample_interval);
    let after = procfs::parse_per_core_times(&fs::read_to_string("/proc/stat")?);

    if after.is_empty() {
        return Err(MonitorError::Parse("no per-core lines in /proc/stat".to_string()));
    }

    let per_core_percent = after
        .iter()
        .zip(before.iter())
        .map(|(now, then)| now.busy_percent_since(then))
        .collect();

    Ok(CpuSnapshot {
        per_core_percent,
        frequency: cpu_frequency(),
        physical_cores: num_cpus::get_physical(),
        logical_cores: num_cpus::get(),
    })
}

/// Averaged over every core exposing cpufreq, else `cpu MHz` from cpuinfo
fn cpu_frequency() -> Option<CpuFrequency> {
    let read_khz = |path: &Path| -> Option<f64> {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
    };

    let mut current = Vec::new();
    let mut min = Vec::new();
    let mut max = Vec::new();

    if let Ok(entries) = fs::read_dir(CPU_SYSFS) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let is_core = name
                .strip_prefix("cpu")
                .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false);
            if !is_core {
                continue;
            }
            let freq_dir = entry.path().join("cpufreq");
            if let Some(cur) = read_khz(&freq_dir.join("scaling_cur_freq")) {
                current.push(cur / 1000.0);
                if let Some(lo) = read_khz(&freq_dir.join("scaling_min_freq")) {
                    min.push(lo / 1000.0);
                }
                if let Some(hi) = read_khz(&freq_dir.join("scaling_max_freq")) {
                    max.push(hi / 1000.0);
                }
            }
        }
    }

    let average = |values: &[f64]| {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    if !current.is_empty() {
        return Some(CpuFrequency {
            current: average(&current),
            min: average(&min),
            max: average(&max),
        });
    }

    let cpuinfo = fs::read_to_string("/proc/cpuinfo").ok()?;
    procfs::parse_cpuinfo_mhz(&cpuinfo).map(|current| CpuFrequency {
        current,
        min: 0.0,
        max: 0.0,
    })
}

pub fn memory() -> Result<MemorySnapshot> {
    let info = procfs::parse_meminfo(&fs::read_to_string("/proc/meminfo")?);
    let field = |name: &str| info.get(name).copied().unwrap_or(0);

    let total = info
        .get("MemTotal")
        .copied()
        .ok_or_else(|| MonitorError::Parse("MemTotal missing from /proc/meminfo".to_string()))?;
    // kernels before 3.14 lack MemAvailable
    let available = info
        .get("MemAvailable")
        .copied()
        .unwrap_or_else(|| field("MemFree") + field("Buffers") + field("Cached"));

    let percent_used = if total > 0 {
        round1(total.saturating_sub(available) as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    let swap_total = field("SwapTotal");
    Ok(MemorySnapshot {
        total_bytes: total,
        available_bytes: available,
        percent_used,
        swap_total_bytes: swap_total,
        swap_used_bytes: swap_total.saturating_sub(field("SwapFree")),
    })
}

pub fn process_ids() -> Result<Vec<u32>> {
    let proc_dir = Path::new("/proc");
    if !proc_dir.exists() {
        return Err(MonitorError::UnsupportedPlatform(
            "/proc filesystem not available".to_string(),
        ));
    }

    let mut pids = Vec::new();
    for entry in fs::read_dir(proc_dir)? {
        let entry = entry?;
        if let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() {
            pids.push(pid);
        }
    }
    Ok(pids)
}

pub fn process(pid: u32) -> Result<ProcessSample> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid))?;
    let (name, _) = procfs::parse_stat_line(&stat)?;
    let statm = fs::read_to_string(format!("/proc/{}/statm", pid))?;
    let resident_pages = procfs::parse_statm_resident(&statm)?;

    Ok(ProcessSample {
        pid,
        name,
        rss_bytes: resident_pages * page_size(),
    })
}

fn page_size() -> u64 {
    nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE)
        .ok()
        .flatten()
        .and_then(|size| u64::try_from(size).ok())
        .unwrap_or(FALLBACK_PAGE_SIZE)
}

pub fn network() -> Result<NetworkCounters> {
    let totals = procfs::parse_net_dev(&fs::read_to_string("/proc/net/dev")?);
    Ok(NetworkCounters {
        bytes_sent: totals.bytes_sent,
        bytes_recv: totals.bytes_recv,
        packets_sent: totals.packets_sent,
        packets_recv: totals.packets_recv,
    })
}

pub fn mount_points() -> Result<Vec<String>> {
    let physical = procfs::parse_physical_fstypes(&fs::read_to_string("/proc/filesystems")?);
    let mounts = fs::read_to_string("/proc/self/mounts")
        .or_else(|_| fs::read_to_string("/proc/mounts"))?;
    Ok(procfs::parse_mount_points(&mounts, &physical))
}

pub fn disk_usage(mount_point: &str) -> Result<DiskUsage> {
    let stat = nix::sys::statvfs::statvfs(mount_point)?;
    let fragment = stat.fragment_size() as u64;
    let total = stat.blocks() as u64 * fragment;
    let free = stat.blocks_available() as u64 * fragment;
    let used = (stat.blocks() as u64).saturating_sub(stat.blocks_free() as u64) * fragment;

    let denominator = used + free;
    let percent = if denominator > 0 {
        round1(used as f64 / denominator as f64 * 100.0)
    } else {
        0.0
    };

    Ok(DiskUsage {
        mount_point: mount_point.to_string(),
        total_bytes: total,
        used_bytes: used,
        free_bytes: free,
        percent,
    })
}

pub fn os() -> Result<OsSummary> {
    let os_name = fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|content| procfs::parse_os_release_name(&content))
        .unwrap_or_else(|| "Linux".to_string());

    let os_version = fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|s| s.trim().to_string())
        .or_else(|_| {
            // "Linux version 6.8.0-51-generic ..."
            fs::read_to_string("/proc/version").map(|content| {
                content
                    .split_whitespace()
                    .nth(2)
                    .unwrap_or_default()
                    .to_string()
            })
        })
        .unwrap_or_default();

    let machine = std::env::consts::ARCH.to_string();
    let processor = fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|content| procfs::parse_cpu_model(&content))
        .unwrap_or_else(|| machine.clone());

    Ok(OsSummary {
        os_name,
        os_version,
        machine,
        processor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_snapshot_consistent() {
        let mem = memory().unwrap();
        assert!(mem.total_bytes > 0);
        assert!(mem.available_bytes <= mem.total_bytes);
        assert!((0.0..=100.0).contains(&mem.percent_used));
        assert!(mem.swap_used_bytes <= mem.swap_total_bytes);
    }

    #[test]
    fn test_own_process_visible() {
        let pid = std::process::id();
        assert!(process_ids().unwrap().contains(&pid));
        let sample = process(pid).unwrap();
        assert_eq!(sample.pid, pid);
        assert!(sample.rss_bytes > 0);
    }

    #[test]
    fn test_vanished_process_is_an_error() {
        assert!(process(u32::MAX).is_err());
    }

    #[test]
    fn test_cpu_sample_covers_every_core() {
        let cpu = cpu(Duration::from_millis(50)).unwrap();
        assert!(!cpu.per_core_percent.is_empty());
        assert!(cpu.logical_cores >= 1);
        assert!(cpu
            .per_core_percent
            .iter()
            .all(|p| (0.0..=100.0).contains(p)));
    }

    #[test]
    fn test_root_disk_usage() {
        let usage = disk_usage("/").unwrap();
        assert!(usage.used_bytes <= usage.total_bytes);
        assert!((0.0..=100.0).contains(&usage.percent));
        assert!(disk_usage("/definitely/not/mounted").is_err());
    }

    #[test]
    fn test_os_summary_has_machine() {
        let summary = os().unwrap();
        assert_eq!(summary.machine, std::env::consts::ARCH);
        assert!(!summary.os_name.is_empty());
    }
}
