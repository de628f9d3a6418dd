use std::process::Command;

use crate::error::{ControlError, ProbeError};
use crate::system::command::{PriorityLevel, SignalKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IoStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// What `sysinfo` does not expose, per OS.
pub trait PlatformExtensions {
    /// `None` when this OS has no direct command-line source.
    fn process_cmdline(pid: u32) -> Option<Result<Vec<String>, ProbeError>>;
    fn process_thread_count(pid: u32) -> Option<u32>;
    fn process_priority(pid: u32) -> Option<i32>;
    fn check_process_table() -> Result<(), String>;
    fn disk_io_counters() -> Option<IoStats>;

    fn send_signal(pid: u32, kind: SignalKind) -> Result<(), ControlError>;
    fn set_priority(pid: u32, level: PriorityLevel) -> Result<(), ControlError>;
    /// Detach a to-be-spawned command from the caller's session.
    fn detach(command: &mut Command);
}

#[cfg(unix)]
mod unix;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

use platform_impl::Platform;

pub fn process_cmdline(pid: u32) -> Option<Result<Vec<String>, ProbeError>> {
    Platform::process_cmdline(pid)
}

pub fn process_thread_count(pid: u32) -> Option<u32> {
    Platform::process_thread_count(pid)
}

pub fn process_priority(pid: u32) -> Option<i32> {
    Platform::process_priority(pid)
}

pub fn check_process_table() -> Result<(), String> {
    Platform::check_process_table()
}

pub fn disk_io_counters() -> Option<IoStats> {
    Platform::disk_io_counters()
}

pub fn send_signal(pid: u32, kind: SignalKind) -> Result<(), ControlError> {
    Platform::send_signal(pid, kind)
}

pub fn set_priority(pid: u32, level: PriorityLevel) -> Result<(), ControlError> {
    Platform::set_priority(pid, level)
}

pub fn detach(command: &mut Command) {
    Platform::detach(command)
}
