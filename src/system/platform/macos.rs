use std::process::Command;

use super::{IoStats, PlatformExtensions, unix};
use crate::error::{ControlError, ProbeError};
use crate::system::command::{PriorityLevel, SignalKind};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn process_cmdline(_pid: u32) -> Option<Result<Vec<String>, ProbeError>> {
        None
    }

    fn process_thread_count(_pid: u32) -> Option<u32> {
        None
    }

    fn process_priority(pid: u32) -> Option<i32> {
        // getpriority returns -1 both on error and as a valid value; check errno
        unsafe { *libc::__error() = 0 };
        let prio = unsafe { libc::getpriority(libc::PRIO_PROCESS, pid as libc::id_t) };
        let errno = unsafe { *libc::__error() };
        if prio == -1 && errno != 0 {
            None
        } else {
            Some(prio)
        }
    }

    fn check_process_table() -> Result<(), String> {
        Ok(())
    }

    fn disk_io_counters() -> Option<IoStats> {
        None
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
