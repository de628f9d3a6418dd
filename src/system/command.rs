//! Process-control requests issued by the consumer.
//!
//! Every operation answers with a [`CommandOutcome`] and never retries: a
//! retried signal could land on a different process that reused the pid.

use std::fmt;
use std::process::{Command, Stdio};
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use super::platform;
use crate::error::{ControlError, ParsePriorityError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalKind {
    /// Cooperative shutdown (SIGTERM).
    Terminate,
    /// Forced termination (SIGKILL).
    Kill,
}

impl SignalKind {
    pub fn label(self) -> &'static str {
        match self {
            SignalKind::Terminate => "SIGTERM",
            SignalKind::Kill => "SIGKILL",
        }
    }
}

/// Scheduling priority, highest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityLevel {
    Realtime,
    High,
    AboveNormal,
    Normal,
    BelowNormal,
    Low,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 6] = [
        PriorityLevel::Realtime,
        PriorityLevel::High,
        PriorityLevel::AboveNormal,
        PriorityLevel::Normal,
        PriorityLevel::BelowNormal,
        PriorityLevel::Low,
    ];

    /// Unix nice value for this level.
    pub fn nice_value(self) -> i32 {
        match self {
            PriorityLevel::Realtime => -20,
            PriorityLevel::High => -10,
            PriorityLevel::AboveNormal => -5,
            PriorityLevel::Normal => 0,
            PriorityLevel::BelowNormal => 5,
            PriorityLevel::Low => 19,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PriorityLevel::Realtime => "realtime",
            PriorityLevel::High => "high",
            PriorityLevel::AboveNormal => "above-normal",
            PriorityLevel::Normal => "normal",
            PriorityLevel::BelowNormal => "below-normal",
            PriorityLevel::Low => "low",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PriorityLevel {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "realtime" | "real-time" => Ok(PriorityLevel::Realtime),
            "high" => Ok(PriorityLevel::High),
            "above-normal" | "abovenormal" => Ok(PriorityLevel::AboveNormal),
            "normal" => Ok(PriorityLevel::Normal),
            "below-normal" | "belownormal" => Ok(PriorityLevel::BelowNormal),
            "low" | "idle" => Ok(PriorityLevel::Low),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    /// The pid no longer exists; the caller's snapshot is stale.
    NotFound,
    /// The caller lacks rights; elevation may help.
    PermissionDenied,
    Failed(String),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Success => f.write_str("success"),
            CommandOutcome::NotFound => f.write_str("process not found"),
            CommandOutcome::PermissionDenied => f.write_str("permission denied"),
            CommandOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

impl From<Result<(), ControlError>> for CommandOutcome {
    fn from(result: Result<(), ControlError>) -> Self {
        match result {
            Ok(()) => CommandOutcome::Success,
            Err(ControlError::NotFound) => CommandOutcome::NotFound,
            Err(ControlError::PermissionDenied) => CommandOutcome::PermissionDenied,
            Err(ControlError::Other(reason)) => CommandOutcome::Failed(reason),
        }
    }
}

/// OS process-control interface.
pub trait ProcessControl: Send + Sync {
    fn send_signal(&self, pid: u32, kind: SignalKind) -> Result<(), ControlError>;
    fn set_priority(&self, pid: u32, level: PriorityLevel) -> Result<(), ControlError>;
    /// Launch `command_line` detached; returns the child's pid.
    fn spawn(&self, command_line: &str) -> Result<u32, ControlError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NativeControl;

impl ProcessControl for NativeControl {
    fn send_signal(&self, pid: u32, kind: SignalKind) -> Result<(), ControlError> {
        platform::send_signal(pid, kind)
    }

    fn set_priority(&self, pid: u32, level: PriorityLevel) -> Result<(), ControlError> {
        platform::set_priority(pid, level)
    }

    fn spawn(&self, command_line: &str) -> Result<u32, ControlError> {
        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.args(["/C", command_line]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command_line]);
            c
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        platform::detach(&mut command);

        let mut child = command.spawn()?;
        let pid = child.id();

        // Reap the child so it never lingers as our zombie.
        let reaper = std::thread::Builder::new()
            .name(format!("reap-{pid}"))
            .spawn(move || {
                let _ = child.wait();
            });
        if let Err(err) = reaper {
            warn!(pid, error = %err, "could not start reaper thread");
        }

        Ok(pid)
    }
}

/// Executes process-control requests against the OS.
pub struct CommandDispatcher<C = NativeControl> {
    control: C,
}

impl Default for CommandDispatcher<NativeControl> {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher<NativeControl> {
    pub fn new() -> Self {
        Self::with_control(NativeControl)
    }
}

impl<C: ProcessControl> CommandDispatcher<C> {
    pub fn with_control(control: C) -> Self {
        Self { control }
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn signal_terminate(&self, pid: u32) -> CommandOutcome {
        self.signal(pid, SignalKind::Terminate)
    }

    pub fn signal_kill(&self, pid: u32) -> CommandOutcome {
        self.signal(pid, SignalKind::Kill)
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> CommandOutcome {
        if !is_valid_pid(pid) {
            return CommandOutcome::NotFound;
        }
        info!(pid, signal = kind.label(), "sending signal");
        let outcome: CommandOutcome = self.control.send_signal(pid, kind).into();
        log_outcome("signal", pid, &outcome);
        outcome
    }

    pub fn set_priority(&self, pid: u32, level: PriorityLevel) -> CommandOutcome {
        if !is_valid_pid(pid) {
            return CommandOutcome::NotFound;
        }
        info!(pid, %level, nice = level.nice_value(), "changing priority");
        let outcome: CommandOutcome = self.control.set_priority(pid, level).into();
        log_outcome("set_priority", pid, &outcome);
        outcome
    }

    /// Parse `level` and change priority. Unknown levels are rejected
    /// before any OS call.
    pub fn set_priority_named(&self, pid: u32, level: &str) -> CommandOutcome {
        match level.parse::<PriorityLevel>() {
            Ok(level) => self.set_priority(pid, level),
            Err(err) => {
                warn!(pid, error = %err, "rejected priority change");
                CommandOutcome::Failed(err.to_string())
            }
        }
    }

    pub fn spawn(&self, command_line: &str) -> CommandOutcome {
        let command_line = command_line.trim();
        if command_line.is_empty() {
            return CommandOutcome::Failed("empty command line".to_string());
        }
        info!(command = command_line, "spawning process");
        match self.control.spawn(command_line) {
            Ok(pid) => {
                info!(pid, command = command_line, "spawned process");
                CommandOutcome::Success
            }
            Err(err) => {
                let outcome = CommandOutcome::from(Err::<(), _>(err));
                log_outcome("spawn", 0, &outcome);
                outcome
            }
        }
    }
}

fn is_valid_pid(pid: u32) -> bool {
    // pid 0 would address the caller's own process group.
    pid != 0 && pid <= i32::MAX as u32
}

fn log_outcome(operation: &'static str, pid: u32, outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Success => info!(operation, pid, "command succeeded"),
        other => warn!(operation, pid, outcome = %other, "command did not succeed"),
    }
}
