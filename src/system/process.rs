use std::cmp::Ordering;
use std::time::SystemTime;

use serde::Serialize;

/// A value the OS may refuse to disclose. `Unavailable` is distinct from an
/// available-but-empty value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Field<T> {
    Available(T),
    Unavailable,
}

impl<T> Field<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Field::Available(_))
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Field::Available(value) => Some(value),
            Field::Unavailable => None,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Field::Available(value),
            None => Field::Unavailable,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessStatus {
    Running,
    Sleeping,
    DiskSleep,
    Idle,
    Stopped,
    Tracing,
    Zombie,
    Dead,
    Other,
}

impl ProcessStatus {
    pub fn label(self) -> &'static str {
        match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Sleeping => "sleeping",
            ProcessStatus::DiskSleep => "disk-sleep",
            ProcessStatus::Idle => "idle",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Tracing => "tracing",
            ProcessStatus::Zombie => "zombie",
            ProcessStatus::Dead => "dead",
            ProcessStatus::Other => "other",
        }
    }
}

impl From<sysinfo::ProcessStatus> for ProcessStatus {
    fn from(status: sysinfo::ProcessStatus) -> Self {
        match status {
            sysinfo::ProcessStatus::Run => ProcessStatus::Running,
            sysinfo::ProcessStatus::Sleep => ProcessStatus::Sleeping,
            sysinfo::ProcessStatus::UninterruptibleDiskSleep => ProcessStatus::DiskSleep,
            sysinfo::ProcessStatus::Idle => ProcessStatus::Idle,
            sysinfo::ProcessStatus::Stop => ProcessStatus::Stopped,
            sysinfo::ProcessStatus::Tracing => ProcessStatus::Tracing,
            sysinfo::ProcessStatus::Zombie => ProcessStatus::Zombie,
            sysinfo::ProcessStatus::Dead => ProcessStatus::Dead,
            _ => ProcessStatus::Other,
        }
    }
}

/// Raw per-process fields as read from the OS.
///
/// `cpu_percent` is already normalized to the whole machine (0-100).
#[derive(Clone, Debug)]
pub struct ProcessMetrics {
    pub pid: u32,
    pub parent_pid: Option<u32>,
    pub name: String,
    pub owner_user: Field<String>,
    pub cpu_percent: f32,
    pub memory_resident_bytes: u64,
    pub thread_count: Field<u32>,
    pub status: ProcessStatus,
    pub nice: Field<i32>,
    pub executable_path: Field<String>,
    pub command_line: Field<String>,
    pub start_time: SystemTime,
}

/// One live process at sample time. Records are plain data: nothing here
/// reaches back into the OS.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub parent_pid: Option<u32>,
    pub name: String,
    pub owner_user: Field<String>,
    pub cpu_percent: f32,
    pub memory_resident_bytes: u64,
    pub memory_percent: f32,
    pub thread_count: Field<u32>,
    pub status: ProcessStatus,
    pub nice: Field<i32>,
    pub executable_path: Field<String>,
    pub command_line: Field<String>,
    pub start_time: SystemTime,
}

impl ProcessRecord {
    pub fn from_metrics(metrics: ProcessMetrics, total_memory: u64) -> Self {
        let memory_percent = if total_memory == 0 {
            0.0
        } else {
            (metrics.memory_resident_bytes as f64 / total_memory as f64 * 100.0) as f32
        };

        let cpu_percent = if metrics.cpu_percent.is_finite() {
            metrics.cpu_percent.max(0.0)
        } else {
            0.0
        };

        ProcessRecord {
            pid: metrics.pid,
            parent_pid: metrics.parent_pid,
            name: metrics.name,
            owner_user: metrics.owner_user,
            cpu_percent,
            memory_resident_bytes: metrics.memory_resident_bytes,
            memory_percent,
            thread_count: metrics.thread_count,
            status: metrics.status,
            nice: metrics.nice,
            executable_path: metrics.executable_path,
            command_line: metrics.command_line,
            start_time: metrics.start_time,
        }
    }
}

/// Processes ordered by descending CPU, captured in one pass.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessSnapshot {
    pub captured_at: SystemTime,
    pub processes: Vec<ProcessRecord>,
}

impl ProcessSnapshot {
    pub fn new(mut processes: Vec<ProcessRecord>, captured_at: SystemTime) -> Self {
        sort_records(&mut processes);
        ProcessSnapshot {
            captured_at,
            processes,
        }
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.processes.iter().find(|p| p.pid == pid)
    }
}

/// CPU descending, ties by ascending pid.
pub fn compare_records(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    b.cpu_percent
        .total_cmp(&a.cpu_percent)
        .then_with(|| a.pid.cmp(&b.pid))
}

pub fn sort_records(records: &mut [ProcessRecord]) {
    records.sort_unstable_by(compare_records);
}
