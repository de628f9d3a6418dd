use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};

use sysinfo::{
    Disks, Networks, Pid, ProcessRefreshKind, ProcessesToUpdate, System, ThreadKind, Uid,
    UpdateKind, Users,
};

use super::platform;
use super::process::{Field, ProcessMetrics};
use super::snapshot::{InterfaceCounters, SystemCounters};
use crate::error::{ProbeError, TelemetryError};

/// OS process-information interface.
pub trait ProcessSource: Send + 'static {
    /// Pids visible this cycle. May omit entries.
    fn list_processes(&mut self) -> Result<Vec<u32>, TelemetryError>;

    fn read_process_metrics(&mut self, pid: u32) -> Result<ProcessMetrics, ProbeError>;

    fn total_memory(&self) -> u64;
}

/// OS system-information interface.
pub trait SystemSource: Send + 'static {
    fn read_system_counters(&mut self) -> Result<SystemCounters, TelemetryError>;
}

/// `sysinfo`-backed source. Each sampler owns its own instance.
pub struct SysinfoSource {
    sys: System,
    users: Users,
    users_refreshed: bool,
    disk_mount: Option<PathBuf>,
    track_disk_io: bool,
}

impl SysinfoSource {
    pub fn for_processes() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_usage();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        SysinfoSource {
            sys,
            users: Users::new_with_refreshed_list(),
            users_refreshed: false,
            disk_mount: None,
            track_disk_io: false,
        }
    }

    pub fn for_system(disk_mount: impl Into<PathBuf>) -> Self {
        let mut source = Self::bare();
        source.disk_mount = Some(disk_mount.into());
        source
    }

    pub fn for_rates() -> Self {
        let mut source = Self::bare();
        source.track_disk_io = true;
        source
    }

    fn bare() -> Self {
        let mut sys = System::new();
        // Primes the CPU counters so the first windowed reading has a baseline.
        sys.refresh_cpu_usage();
        SysinfoSource {
            sys,
            users: Users::new(),
            users_refreshed: false,
            disk_mount: None,
            track_disk_io: false,
        }
    }

    fn logical_cores(&self) -> usize {
        self.sys.cpus().len().max(1)
    }

    fn user_name(&mut self, uid: &Uid) -> Field<String> {
        // New accounts show up at most once per cycle.
        if self.users.get_user_by_id(uid).is_none() && !self.users_refreshed {
            self.users = Users::new_with_refreshed_list();
            self.users_refreshed = true;
        }
        self.users
            .get_user_by_id(uid)
            .map(|user| user.name().to_string())
            .into()
    }
}

impl ProcessSource for SysinfoSource {
    fn list_processes(&mut self) -> Result<Vec<u32>, TelemetryError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(TelemetryError::Unavailable(
                "process information is not supported on this platform".to_string(),
            ));
        }
        platform::check_process_table().map_err(TelemetryError::Enumeration)?;

        self.users_refreshed = false;
        self.sys.refresh_memory();
        self.sys.refresh_cpu_usage();
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_memory()
                .with_cpu()
                .with_exe(UpdateKind::OnlyIfNotSet)
                .with_cmd(UpdateKind::OnlyIfNotSet)
                .with_user(UpdateKind::OnlyIfNotSet),
        );

        Ok(self
            .sys
            .processes()
            .iter()
            .filter(|(_, process)| !matches!(process.thread_kind(), Some(ThreadKind::Userland)))
            .map(|(pid, _)| pid.as_u32())
            .collect())
    }

    fn read_process_metrics(&mut self, pid: u32) -> Result<ProcessMetrics, ProbeError> {
        let cores = self.logical_cores() as f32;
        let process = self
            .sys
            .process(Pid::from_u32(pid))
            .ok_or(ProbeError::NotFound)?;

        let command_line = match platform::process_cmdline(pid) {
            Some(Ok(args)) => Field::Available(args.join(" ")),
            Some(Err(ProbeError::NotFound)) => return Err(ProbeError::NotFound),
            Some(Err(ProbeError::PermissionDenied)) => Field::Unavailable,
            None if process.cmd().is_empty() => Field::Unavailable,
            None => Field::Available(
                process
                    .cmd()
                    .iter()
                    .map(|s| s.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
        };

        let thread_count = platform::process_thread_count(pid)
            .or_else(|| process.tasks().map(|tasks| tasks.len() as u32));

        let uid = process.user_id().cloned();
        let mut metrics = ProcessMetrics {
            pid,
            parent_pid: process.parent().map(|p| p.as_u32()),
            name: process.name().to_string_lossy().into_owned(),
            owner_user: Field::Unavailable,
            cpu_percent: process.cpu_usage() / cores,
            memory_resident_bytes: process.memory(),
            thread_count: thread_count.into(),
            status: process.status().into(),
            nice: platform::process_priority(pid).into(),
            executable_path: process.exe().map(|p| p.display().to_string()).into(),
            command_line,
            start_time: UNIX_EPOCH + Duration::from_secs(process.start_time()),
        };

        if let Some(uid) = uid {
            metrics.owner_user = self.user_name(&uid);
        }
        Ok(metrics)
    }

    fn total_memory(&self) -> u64 {
        self.sys.total_memory()
    }
}

impl SystemSource for SysinfoSource {
    fn read_system_counters(&mut self) -> Result<SystemCounters, TelemetryError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(TelemetryError::Unavailable(
                "system information is not supported on this platform".to_string(),
            ));
        }

        self.sys.refresh_memory();
        self.sys.refresh_cpu_usage();

        let networks = Networks::new_with_refreshed_list();
        let net_interfaces: BTreeMap<String, InterfaceCounters> = networks
            .list()
            .iter()
            .map(|(name, data)| {
                (
                    name.clone(),
                    InterfaceCounters {
                        sent: data.total_transmitted(),
                        received: data.total_received(),
                    },
                )
            })
            .collect();
        let (net_bytes_sent, net_bytes_received) = net_interfaces.values().fold(
            (0u64, 0u64),
            |(sent, received), iface| {
                (
                    sent.saturating_add(iface.sent),
                    received.saturating_add(iface.received),
                )
            },
        );

        let disk_space = self.disk_mount.as_ref().and_then(|mount| {
            let disks = Disks::new_with_refreshed_list();
            disks
                .list()
                .iter()
                .find(|disk| disk.mount_point() == mount.as_path())
                .map(|disk| {
                    let total = disk.total_space();
                    (total, total.saturating_sub(disk.available_space()))
                })
        });

        let disk_io = if self.track_disk_io {
            platform::disk_io_counters().map(|io| (io.read_bytes, io.write_bytes))
        } else {
            None
        };

        Ok(SystemCounters {
            cpu_percent: self.sys.global_cpu_usage(),
            per_core_percent: self.sys.cpus().iter().map(|cpu| cpu.cpu_usage()).collect(),
            memory_total: self.sys.total_memory(),
            memory_used: self.sys.used_memory(),
            swap_total: self.sys.total_swap(),
            swap_used: self.sys.used_swap(),
            disk_space,
            net_bytes_sent,
            net_bytes_received,
            net_interfaces,
            disk_io,
        })
    }
}
