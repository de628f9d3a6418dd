use thiserror::Error;

/// Failure to read one process's metrics. Expected during a scan and
/// never surfaced to the consumer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    #[error("process exited before its metrics could be read")]
    NotFound,

    #[error("not permitted to inspect process")]
    PermissionDenied,
}

/// Failure of a whole sampling pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// The pass failed but the next one may succeed.
    #[error("sampling pass failed: {0}")]
    Enumeration(String),

    /// The OS interface is gone; the sampler stops.
    #[error("system information interface unavailable: {0}")]
    Unavailable(String),
}

impl TelemetryError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TelemetryError::Unavailable(_))
    }
}

/// Failure reported by the OS process-control interface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("no such process")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for ControlError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ControlError::PermissionDenied,
            _ => ControlError::Other(err.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown priority level `{0}`")]
pub struct ParsePriorityError(pub String);
