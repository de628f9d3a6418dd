use std::os::unix::process::CommandExt;
use std::process::Command;

use crate::error::ControlError;
use crate::system::command::{PriorityLevel, SignalKind};

fn last_error() -> ControlError {
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => ControlError::NotFound,
        Some(libc::EPERM) | Some(libc::EACCES) => ControlError::PermissionDenied,
        _ => ControlError::Other(err.to_string()),
    }
}

fn to_pid(pid: u32) -> Result<libc::pid_t, ControlError> {
    // Out of pid_t range cannot name a live process.
    libc::pid_t::try_from(pid).map_err(|_| ControlError::NotFound)
}

pub(super) fn send_signal(pid: u32, kind: SignalKind) -> Result<(), ControlError> {
    let pid = to_pid(pid)?;
    let signal = match kind {
        SignalKind::Terminate => libc::SIGTERM,
        SignalKind::Kill => libc::SIGKILL,
    };
    let rc = unsafe { libc::kill(pid, signal) };
    if rc == 0 { Ok(()) } else { Err(last_error()) }
}

pub(super) fn set_priority(pid: u32, level: PriorityLevel) -> Result<(), ControlError> {
    let pid = to_pid(pid)?;
    let rc = unsafe {
        libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, level.nice_value())
    };
    if rc == 0 { Ok(()) } else { Err(last_error()) }
}

pub(super) fn detach(command: &mut Command) {
    command.process_group(0);
}
