// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Command Registry and command handlers
//!
//! Every registered keyword maps to exactly one handler through an exhaustive
//! match on [`CommandKind`]. Handlers return one [`Response`] per invocation;
//! failures inside a handler are contained and reported to the peer as plain
//! text, so a bad command never ends the session.
//!
//! Metric payloads carry pre-formatted display strings (`"7.81 GB"`,
//! `"42.5%"`) so the client needs no unit conversion.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{MonitorError, Result};
use crate::path_guard::{list_entries, PathGuard};
use crate::protocol::{
    Command, CommandKind, Response, ACCESS_DENIED_MESSAGE, EXIT_MESSAGE, INVALID_COMMAND_MESSAGE,
};
use crate::provider::{ProcessSample, SystemProvider};

/// Number of entries returned by `processes`
pub const TOP_PROCESS_COUNT: usize = 10;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// `cpu` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuReport {
    pub cpu_percent: Vec<f64>,
    /// `{current, min, max}` in MHz, or `{}` when unavailable
    pub cpu_freq: Value,
    pub cpu_count_physical: usize,
    pub cpu_count_logical: usize,
}

/// `memory` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryReport {
    pub total: String,
    pub available: String,
    pub percent_used: String,
    pub swap_total: String,
    pub swap_used: String,
}

/// One `processes` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub pid: u32,
    pub name: String,
    pub memory_percent: f64,
}

/// `netstat` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetstatReport {
    pub bytes_sent: String,
    pub bytes_recv: String,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

/// Per-mount `diskspace` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskReport {
    pub total: String,
    pub used: String,
    pub free: String,
    pub percent: String,
}

/// `listdir` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingReport {
    pub path: String,
    pub contents: Vec<String>,
}

/// Result of dispatching one command
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub response: Response,
    /// Close the session once the response has been written
    pub terminate: bool,
}

impl Dispatch {
    fn reply(response: Response) -> Self {
        Self {
            response,
            terminate: false,
        }
    }
}

/// Maps keywords to handlers; owns the state handlers read
pub struct CommandRegistry<P: SystemProvider> {
    guard: PathGuard,
    provider: P,
}

impl<P: SystemProvider> CommandRegistry<P> {
    pub fn new(guard: PathGuard, provider: P) -> Self {
        Self { guard, provider }
    }

    /// Run the handler bound to `command`, or answer with the invalid-command
    /// message for an unknown keyword.
    pub fn dispatch(&self, command: &Command) -> Dispatch {
        let kind = match command.kind() {
            Some(kind) => kind,
            None => {
                let err = MonitorError::UnknownCommand(command.keyword.clone());
                log::info!("{}", err);
                return Dispatch::reply(Response::text(INVALID_COMMAND_MESSAGE));
            }
        };

        log::debug!("dispatching {} ({} byte argument)", kind, command.argument.len());
        let arg = command.argument.as_str();

        let result = match kind {
            CommandKind::SysInfo => self.system_info(),
            CommandKind::Time => Ok(server_time()),
            CommandKind::Echo => Ok(echo(arg)),
            CommandKind::Exit => {
                return Dispatch {
                    response: Response::text(EXIT_MESSAGE),
                    terminate: true,
                }
            }
            CommandKind::Cpu => self.cpu_info(),
            CommandKind::Memory => self.memory_info(),
            CommandKind::Processes => self.running_processes(),
            CommandKind::Netstat => self.network_stats(),
            CommandKind::ListDir => Ok(self.list_directory(arg)),
            CommandKind::DiskSpace => self.disk_space(),
        };

        match result {
            Ok(response) => Dispatch::reply(response),
            Err(err) => {
                log::warn!("{} handler failed: {}", kind, err);
                Dispatch::reply(Response::text(format!(
                    "Error retrieving {} information: {}",
                    kind, err
                )))
            }
        }
    }

    fn system_info(&self) -> Result<Response> {
        let os = self.provider.os()?;
        Ok(Response::text(format!(
            "\nSystem Information:\nOS: {} {}\nMachine: {}\nProcessor: {}\n",
            os.os_name, os.os_version, os.machine, os.processor
        )))
    }

    fn cpu_info(&self) -> Result<Response> {
        let cpu = self.provider.cpu()?;
        let cpu_freq = match cpu.frequency {
            Some(freq) => json!({
                "current": freq.current,
                "min": freq.min,
                "max": freq.max,
            }),
            None => json!({}),
        };
        Response::structured(&CpuReport {
            cpu_percent: cpu.per_core_percent,
            cpu_freq,
            cpu_count_physical: cpu.physical_cores,
            cpu_count_logical: cpu.logical_cores,
        })
    }

    fn memory_info(&self) -> Result<Response> {
        let mem = self.provider.memory()?;
        Response::structured(&MemoryReport {
            total: format_gib(mem.total_bytes),
            available: format_gib(mem.available_bytes),
            percent_used: format_percent(mem.percent_used),
            swap_total: format_gib(mem.swap_total_bytes),
            swap_used: format_gib(mem.swap_used_bytes),
        })
    }

    fn running_processes(&self) -> Result<Response> {
        let total_memory = self.provider.memory()?.total_bytes;
        let mut samples = Vec::new();
        for pid in self.provider.process_ids()? {
            match self.provider.process(pid) {
                Ok(sample) => samples.push(sample),
                // exited or inaccessible since enumeration
                Err(err) => log::debug!("skipping pid {}: {}", pid, err),
            }
        }
        Response::structured(&top_by_memory(samples, total_memory, TOP_PROCESS_COUNT))
    }

    fn network_stats(&self) -> Result<Response> {
        let net = self.provider.network()?;
        Response::structured(&NetstatReport {
            bytes_sent: format_mib(net.bytes_sent),
            bytes_recv: format_mib(net.bytes_recv),
            packets_sent: net.packets_sent,
            packets_recv: net.packets_recv,
        })
    }

    fn disk_space(&self) -> Result<Response> {
        let mut disks = BTreeMap::new();
        for mount in self.provider.mount_points()? {
            match self.provider.disk_usage(&mount) {
                Ok(usage) => {
                    disks.insert(
                        mount,
                        DiskReport {
                            total: format_gib(usage.total_bytes),
                            used: format_gib(usage.used_bytes),
                            free: format_gib(usage.free_bytes),
                            percent: format_percent(usage.percent),
                        },
                    );
                }
                Err(err) => log::debug!("skipping mount {}: {}", mount, err),
            }
        }
        Response::structured(&disks)
    }

    fn list_directory(&self, requested: &str) -> Response {
        let path = match self.guard.resolve(requested) {
            Ok(path) => path,
            Err(_) => return Response::text(ACCESS_DENIED_MESSAGE),
        };

        let listing = list_entries(&path).map_err(MonitorError::from).and_then(|contents| {
            Response::structured(&ListingReport {
                path: path.display().to_string(),
                contents,
            })
        });
        match listing {
            Ok(response) => response,
            Err(err) => Response::text(format!("Error listing directory: {}", err)),
        }
    }
}

fn server_time() -> Response {
    Response::text(format!(
        "Server time: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ))
}

fn echo(message: &str) -> Response {
    Response::text(format!("Echo: {}", message))
}

/// Highest memory share first, ties kept in scan order, at most `limit`
pub fn top_by_memory(
    samples: Vec<ProcessSample>,
    total_memory: u64,
    limit: usize,
) -> Vec<ProcessReport> {
    let mut reports: Vec<ProcessReport> = samples
        .into_iter()
        .map(|sample| ProcessReport {
            memory_percent: if total_memory > 0 {
                sample.rss_bytes as f64 / total_memory as f64 * 100.0
            } else {
                0.0
            },
            pid: sample.pid,
            name: sample.name,
        })
        .collect();
    // sort_by is stable
    reports.sort_by(|a, b| {
        b.memory_percent
            .partial_cmp(&a.memory_percent)
            .unwrap_or(Ordering::Equal)
    });
    reports.truncate(limit);
    reports
}

pub fn format_gib(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB)
}

pub fn format_mib(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MIB)
}

pub fn format_percent(percent: f64) -> String {
    format!("{:.1}%", percent)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::provider::{
        CpuFrequency, CpuSnapshot, DiskUsage, MemorySnapshot, NetworkCounters, OsSummary,
    };
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Deterministic provider for handler and session tests
    pub(crate) struct FakeProvider {
        pub processes: Vec<ProcessSample>,
        pub broken_pids: Vec<u32>,
        pub mounts: Vec<&'static str>,
        pub broken_mounts: Vec<&'static str>,
        pub frequency: Option<CpuFrequency>,
        pub fail_network: bool,
    }

    impl Default for FakeProvider {
        fn default() -> Self {
            Self {
                processes: vec![
                    ProcessSample {
                        pid: 1,
                        name: "init".into(),
                        rss_bytes: 10 * 1024 * 1024,
                    },
                    ProcessSample {
                        pid: 2,
                        name: "db".into(),
                        rss_bytes: 400 * 1024 * 1024,
                    },
                ],
                broken_pids: vec![],
                mounts: vec!["/", "/home"],
                broken_mounts: vec![],
                frequency: Some(CpuFrequency {
                    current: 2400.0,
                    min: 800.0,
                    max: 4200.0,
                }),
                fail_network: false,
            }
        }
    }

    impl SystemProvider for FakeProvider {
        fn cpu(&self) -> Result<CpuSnapshot> {
            Ok(CpuSnapshot {
                per_core_percent: vec![12.5, 3.0],
                frequency: self.frequency,
                physical_cores: 1,
                logical_cores: 2,
            })
        }

        fn memory(&self) -> Result<MemorySnapshot> {
            Ok(MemorySnapshot {
                total_bytes: 1024 * 1024 * 1024,
                available_bytes: 512 * 1024 * 1024,
                percent_used: 50.0,
                swap_total_bytes: 2 * 1024 * 1024 * 1024,
                swap_used_bytes: 0,
            })
        }

        fn process_ids(&self) -> Result<Vec<u32>> {
            let mut pids: Vec<u32> = self.processes.iter().map(|p| p.pid).collect();
            pids.extend(&self.broken_pids);
            Ok(pids)
        }

        fn process(&self, pid: u32) -> Result<ProcessSample> {
            self.processes
                .iter()
                .find(|p| p.pid == pid)
                .cloned()
                .ok_or_else(|| MonitorError::Handler(format!("pid {} vanished", pid)))
        }

        fn network(&self) -> Result<NetworkCounters> {
            if self.fail_network {
                return Err(MonitorError::Handler("permission denied".into()));
            }
            Ok(NetworkCounters {
                bytes_sent: 3 * 1024 * 1024,
                bytes_recv: 1536 * 1024,
                packets_sent: 30,
                packets_recv: 15,
            })
        }

        fn mount_points(&self) -> Result<Vec<String>> {
            Ok(self
                .mounts
                .iter()
                .chain(self.broken_mounts.iter())
                .map(|m| m.to_string())
                .collect())
        }

        fn disk_usage(&self, mount_point: &str) -> Result<DiskUsage> {
            if self.broken_mounts.iter().any(|m| *m == mount_point) {
                return Err(MonitorError::Handler("not mounted".into()));
            }
            Ok(DiskUsage {
                mount_point: mount_point.to_string(),
                total_bytes: 100 * 1024 * 1024 * 1024,
                used_bytes: 25 * 1024 * 1024 * 1024,
                free_bytes: 75 * 1024 * 1024 * 1024,
                percent: 25.0,
            })
        }

        fn os(&self) -> Result<OsSummary> {
            Ok(OsSummary {
                os_name: "TestOS".into(),
                os_version: "1.0".into(),
                machine: "x86_64".into(),
                processor: "Test CPU".into(),
            })
        }
    }

    pub(crate) fn registry_in(
        tmp: &TempDir,
        provider: FakeProvider,
    ) -> CommandRegistry<FakeProvider> {
        let guard = PathGuard::new(
            tmp.path(),
            &[PathBuf::from("./shared"), PathBuf::from("./downloads")],
        )
        .unwrap();
        CommandRegistry::new(guard, provider)
    }

    fn run(registry: &CommandRegistry<FakeProvider>, line: &str) -> Dispatch {
        registry.dispatch(&Command::parse(line))
    }

    fn keys(value: &Value) -> Vec<String> {
        let mut keys: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_echo_verbatim() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        for (line, expected) in [
            ("echo hello", "Echo: hello"),
            ("echo", "Echo: "),
            ("ECHO Mixed Case  text", "Echo: Mixed Case  text"),
            ("echo {\"a\": 1}", "Echo: {\"a\": 1}"),
        ] {
            let dispatch = run(&registry, line);
            assert_eq!(dispatch.response, Response::text(expected));
            assert!(!dispatch.terminate);
        }
    }

    #[test]
    fn test_unknown_command_keeps_session() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let dispatch = run(&registry, "reboot now");
        assert_eq!(dispatch.response, Response::text(INVALID_COMMAND_MESSAGE));
        assert!(!dispatch.terminate);
    }

    #[test]
    fn test_exit_terminates_with_ack() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let dispatch = run(&registry, "Exit");
        assert_eq!(dispatch.response, Response::text(EXIT_MESSAGE));
        assert!(dispatch.terminate);
    }

    #[test]
    fn test_time_format() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let response = run(&registry, "time").response;
        let text = response.as_text().unwrap();
        let stamp = text.strip_prefix("Server time: ").unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[test]
    fn test_sysinfo_block() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let response = run(&registry, "sysinfo").response;
        let text = response.as_text().unwrap();
        assert!(text.contains("System Information:"));
        assert!(text.contains("OS: TestOS 1.0"));
        assert!(text.contains("Machine: x86_64"));
        assert!(text.contains("Processor: Test CPU"));
    }

    #[test]
    fn test_cpu_schema() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let response = run(&registry, "cpu").response;
        let decoded = crate::protocol::decode_response(&response.encode().unwrap());
        let value = decoded.as_structured().unwrap();
        assert_eq!(
            keys(value),
            vec!["cpu_count_logical", "cpu_count_physical", "cpu_freq", "cpu_percent"]
        );
        assert_eq!(value["cpu_percent"], json!([12.5, 3.0]));
        assert_eq!(value["cpu_freq"]["max"], json!(4200.0));
        assert_eq!(value["cpu_count_logical"], json!(2));
    }

    #[test]
    fn test_cpu_without_frequency_is_empty_map() {
        let tmp = TempDir::new().unwrap();
        let provider = FakeProvider {
            frequency: None,
            ..Default::default()
        };
        let registry = registry_in(&tmp, provider);
        let response = run(&registry, "cpu").response;
        assert_eq!(response.as_structured().unwrap()["cpu_freq"], json!({}));
    }

    #[test]
    fn test_memory_schema_and_units() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let response = run(&registry, "memory").response;
        let value = crate::protocol::decode_response(&response.encode().unwrap());
        let value = value.as_structured().unwrap();
        assert_eq!(
            keys(value),
            vec!["available", "percent_used", "swap_total", "swap_used", "total"]
        );
        assert_eq!(value["total"], "1.00 GB");
        assert_eq!(value["available"], "0.50 GB");
        assert_eq!(value["percent_used"], "50.0%");
        assert_eq!(value["swap_total"], "2.00 GB");
    }

    #[test]
    fn test_netstat_schema() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let response = run(&registry, "netstat").response;
        let value = response.as_structured().unwrap();
        assert_eq!(
            keys(value),
            vec!["bytes_recv", "bytes_sent", "packets_recv", "packets_sent"]
        );
        assert_eq!(value["bytes_sent"], "3.00 MB");
        assert_eq!(value["bytes_recv"], "1.50 MB");
        assert_eq!(value["packets_sent"], 30);
    }

    #[test]
    fn test_handler_failure_is_contained() {
        let tmp = TempDir::new().unwrap();
        let provider = FakeProvider {
            fail_network: true,
            ..Default::default()
        };
        let registry = registry_in(&tmp, provider);
        let dispatch = run(&registry, "netstat");
        assert!(!dispatch.terminate);
        let text = dispatch.response.as_text().unwrap().to_string();
        assert!(text.starts_with("Error retrieving netstat information"));
        assert!(text.contains("permission denied"));
    }

    #[test]
    fn test_diskspace_skips_failing_mounts() {
        let tmp = TempDir::new().unwrap();
        let provider = FakeProvider {
            broken_mounts: vec!["/mnt/gone"],
            ..Default::default()
        };
        let registry = registry_in(&tmp, provider);
        let response = run(&registry, "diskspace").response;
        let value = response.as_structured().unwrap();
        assert_eq!(keys(value), vec!["/", "/home"]);
        assert_eq!(keys(&value["/"]), vec!["free", "percent", "total", "used"]);
        assert_eq!(value["/"]["total"], "100.00 GB");
        assert_eq!(value["/"]["percent"], "25.0%");
    }

    #[test]
    fn test_processes_skip_vanished_and_sort() {
        let tmp = TempDir::new().unwrap();
        let provider = FakeProvider {
            broken_pids: vec![99],
            ..Default::default()
        };
        let registry = registry_in(&tmp, provider);
        let response = run(&registry, "processes").response;
        let entries = response.as_structured().unwrap().as_array().unwrap().clone();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "db");
        for entry in &entries {
            assert_eq!(keys(entry), vec!["memory_percent", "name", "pid"]);
        }
    }

    #[test]
    fn test_top_by_memory_limit_and_stable_ties() {
        let samples: Vec<ProcessSample> = (1..=15)
            .map(|pid| ProcessSample {
                pid,
                name: format!("p{}", pid),
                rss_bytes: if pid % 2 == 0 { 200 } else { 100 },
            })
            .collect();
        let top = top_by_memory(samples, 1000, TOP_PROCESS_COUNT);
        assert_eq!(top.len(), 10);
        assert!(top.windows(2).all(|w| w[0].memory_percent >= w[1].memory_percent));
        let pids: Vec<u32> = top.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![2, 4, 6, 8, 10, 12, 14, 1, 3, 5]);
        assert_eq!(top[0].memory_percent, 20.0);
    }

    #[test]
    fn test_top_by_memory_zero_total() {
        let samples = vec![ProcessSample {
            pid: 7,
            name: "x".into(),
            rss_bytes: 5,
        }];
        let top = top_by_memory(samples, 0, TOP_PROCESS_COUNT);
        assert_eq!(top[0].memory_percent, 0.0);
    }

    #[test]
    fn test_listdir_allowed() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let shared = tmp.path().join("shared");
        fs::write(shared.join("report.txt"), b"x").unwrap();
        fs::create_dir(shared.join("nested")).unwrap();

        let response = run(&registry, "listdir shared").response;
        let listing: ListingReport =
            serde_json::from_value(response.as_structured().unwrap().clone()).unwrap();
        assert_eq!(PathBuf::from(&listing.path), shared.canonicalize().unwrap());
        let expected = list_entries(&shared).unwrap();
        assert_eq!(listing.contents, expected);
    }

    #[test]
    fn test_listdir_denied() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        for line in ["listdir ../../etc", "listdir", "listdir /", "listdir shared/../.."] {
            let dispatch = run(&registry, line);
            assert_eq!(dispatch.response, Response::text(ACCESS_DENIED_MESSAGE), "{line}");
            assert!(!dispatch.terminate);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_listdir_through_symlink_escape_always_denied() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let outside = TempDir::new().unwrap();
        fs::create_dir(outside.path().join("secret")).unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("shared/escape")).unwrap();

        for line in ["listdir shared/escape/secret", "listdir shared/escape/nope"] {
            let dispatch = run(&registry, line);
            assert_eq!(dispatch.response, Response::text(ACCESS_DENIED_MESSAGE), "{line}");
        }
    }

    #[test]
    fn test_listdir_missing_directory_reports_error() {
        let tmp = TempDir::new().unwrap();
        let registry = registry_in(&tmp, FakeProvider::default());
        let response = run(&registry, "listdir shared/absent").response;
        assert!(response
            .as_text()
            .unwrap()
            .starts_with("Error listing directory:"));
    }

    #[test]
    fn test_formatters() {
        assert_eq!(format_gib(3 * 1024 * 1024 * 1024 / 2), "1.50 GB");
        assert_eq!(format_mib(0), "0.00 MB");
        assert_eq!(format_percent(7.26), "7.3%");
    }
}
