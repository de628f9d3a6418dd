use std::os::windows::process::CommandExt;
use std::process::Command;

use windows_sys::Win32::{
    Foundation::{CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, GetLastError},
    System::Threading::{
        ABOVE_NORMAL_PRIORITY_CLASS, BELOW_NORMAL_PRIORITY_CLASS, CREATE_NEW_PROCESS_GROUP,
        DETACHED_PROCESS, GetPriorityClass, HIGH_PRIORITY_CLASS, IDLE_PRIORITY_CLASS,
        NORMAL_PRIORITY_CLASS, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_SET_INFORMATION,
        PROCESS_TERMINATE, REALTIME_PRIORITY_CLASS, SetPriorityClass, TerminateProcess,
    },
};

use super::{IoStats, PlatformExtensions};
use crate::error::{ControlError, ProbeError};
use crate::system::command::{PriorityLevel, SignalKind};

pub struct Platform;

fn last_error() -> ControlError {
    match unsafe { GetLastError() } {
        ERROR_ACCESS_DENIED => ControlError::PermissionDenied,
        // OpenProcess reports a dead pid as an invalid parameter
        ERROR_INVALID_PARAMETER => ControlError::NotFound,
        code => ControlError::Other(format!("Windows error {code}")),
    }
}

fn priority_class(level: PriorityLevel) -> u32 {
    match level {
        PriorityLevel::Realtime => REALTIME_PRIORITY_CLASS,
        PriorityLevel::High => HIGH_PRIORITY_CLASS,
        PriorityLevel::AboveNormal => ABOVE_NORMAL_PRIORITY_CLASS,
        PriorityLevel::Normal => NORMAL_PRIORITY_CLASS,
        PriorityLevel::BelowNormal => BELOW_NORMAL_PRIORITY_CLASS,
        PriorityLevel::Low => IDLE_PRIORITY_CLASS,
    }
}

/// Nice value of the level whose class matches, so records carry the same
/// scale on every OS.
fn nice_for_class(class: u32) -> Option<i32> {
    PriorityLevel::ALL
        .into_iter()
        .find(|level| priority_class(*level) == class)
        .map(PriorityLevel::nice_value)
}

impl PlatformExtensions for Platform {
    fn process_cmdline(_pid: u32) -> Option<Result<Vec<String>, ProbeError>> {
        None
    }

    fn process_thread_count(_pid: u32) -> Option<u32> {
        None
    }

    fn process_priority(pid: u32) -> Option<i32> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_INFORMATION, 0, pid);
            if handle.is_null() {
                return None;
            }
            let class = GetPriorityClass(handle);
            CloseHandle(handle);
            nice_for_class(class)
        }
    }

    fn check_process_table() -> Result<(), String> {
        Ok(())
    }

    fn disk_io_counters() -> Option<IoStats> {
        None
    }

    // Windows has no cooperative signal; both kinds terminate.
    fn send_signal(pid: u32, _kind: SignalKind) -> Result<(), ControlError> {
        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
            if handle.is_null() {
                return Err(last_error());
            }
            let ok = TerminateProcess(handle, 1);
            let result = if ok == 0 { Err(last_error()) } else { Ok(()) };
            CloseHandle(handle);
            result
        }
    }

    fn set_priority(pid: u32, level: PriorityLevel) -> Result<(), ControlError> {
        unsafe {
            let handle = OpenProcess(PROCESS_SET_INFORMATION, 0, pid);
            if handle.is_null() {
                return Err(last_error());
            }
            let ok = SetPriorityClass(handle, priority_class(level));
            let result = if ok == 0 { Err(last_error()) } else { Ok(()) };
            CloseHandle(handle);
            result
        }
    }

    fn detach(command: &mut Command) {
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_classes_map_to_nice_values() {
        assert_eq!(nice_for_class(NORMAL_PRIORITY_CLASS), Some(0));
        assert_eq!(nice_for_class(HIGH_PRIORITY_CLASS), Some(-10));
        assert_eq!(nice_for_class(IDLE_PRIORITY_CLASS), Some(19));
        assert_eq!(nice_for_class(0), None);
    }

    #[test]
    fn own_priority_is_a_nice_value() {
        let nice = Platform::process_priority(std::process::id()).unwrap();
        assert!((-20..=19).contains(&nice));
    }
}
