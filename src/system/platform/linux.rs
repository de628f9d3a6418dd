use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use super::{IoStats, PlatformExtensions, unix};
use crate::error::{ControlError, ProbeError};
use crate::system::command::{PriorityLevel, SignalKind};

const SECTOR_SIZE: u64 = 512;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn process_cmdline(pid: u32) -> Option<Result<Vec<String>, ProbeError>> {
        let path = format!("/proc/{pid}/cmdline");
        let result = match std::fs::read(path) {
            Ok(bytes) => Ok(parse_cmdline(&bytes)),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                Err(ProbeError::PermissionDenied)
            }
            // ENOENT or ESRCH: the process is gone.
            Err(_) => Err(ProbeError::NotFound),
        };
        Some(result)
    }

    fn process_thread_count(pid: u32) -> Option<u32> {
        let path = format!("/proc/{pid}/status");
        let contents = std::fs::read_to_string(path).ok()?;
        contents
            .lines()
            .find_map(|line| line.strip_prefix("Threads:"))
            .and_then(|val| val.trim().parse().ok())
    }

    fn process_priority(pid: u32) -> Option<i32> {
        let path = format!("/proc/{pid}/stat");
        let contents = std::fs::read_to_string(path).ok()?;
        parse_stat_nice(&contents)
    }

    fn check_process_table() -> Result<(), String> {
        std::fs::read_dir("/proc")
            .map(|_| ())
            .map_err(|err| format!("cannot read /proc: {err}"))
    }

    fn disk_io_counters() -> Option<IoStats> {
        let contents = std::fs::read_to_string("/proc/diskstats").ok()?;
        parse_diskstats(&contents, |name| {
            !name.starts_with("loop")
                && !name.starts_with("ram")
                && Path::new("/sys/block").join(name).exists()
        })
    }

    fn send_signal(pid: u32, kind: SignalKind) -> Result<(), ControlError> {
        unix::send_signal(pid, kind)
    }

    fn set_priority(pid: u32, level: PriorityLevel) -> Result<(), ControlError> {
        unix::set_priority(pid, level)
    }

    fn detach(command: &mut Command) {
        unix::detach(command)
    }
}

fn parse_cmdline(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

fn parse_stat_nice(contents: &str) -> Option<i32> {
    // comm may contain spaces and parens, so start after the last ')'
    let after_comm = contents.rfind(')')? + 1;
    let fields: Vec<&str> = contents[after_comm..].split_whitespace().collect();
    // state(0) ppid(1) ... priority(15) nice(16)
    fields.get(16)?.parse().ok()
}

/// Sum sectors read/written over the devices `include` accepts.
fn parse_diskstats(contents: &str, include: impl Fn(&str) -> bool) -> Option<IoStats> {
    let mut stats = IoStats {
        read_bytes: 0,
        write_bytes: 0,
    };
    let mut seen = false;
    for line in contents.lines() {
        // major minor name reads merged sectors_read ms writes merged sectors_written ...
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || !include(fields[2]) {
            continue;
        }
        let (Ok(read), Ok(written)) = (fields[5].parse::<u64>(), fields[9].parse::<u64>()) else {
            continue;
        };
        stats.read_bytes = stats.read_bytes.saturating_add(read * SECTOR_SIZE);
        stats.write_bytes = stats.write_bytes.saturating_add(written * SECTOR_SIZE);
        seen = true;
    }
    seen.then_some(stats)
}
