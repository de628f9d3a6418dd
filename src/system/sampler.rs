use std::fmt;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use super::collector::{ProcessSource, SystemSource};
use super::process::{ProcessRecord, ProcessSnapshot};
use super::snapshot::SystemStats;
use super::store::Publisher;
use crate::error::TelemetryError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    Processes,
    System,
    Rates,
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SamplerKind::Processes => "processes",
            SamplerKind::System => "system",
            SamplerKind::Rates => "rates",
        };
        f.write_str(name)
    }
}

/// Notification sent to the consumer when a whole pass fails.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{sampler} sampler: {error}")]
pub struct SamplerError {
    pub sampler: SamplerKind,
    pub error: TelemetryError,
}

impl SamplerError {
    /// The sampler stopped after this error.
    pub fn is_fatal(&self) -> bool {
        self.error.is_fatal()
    }
}

/// One periodic producer of snapshots.
pub trait Sampler: Send + 'static {
    type Output: Send + Sync + 'static;

    fn kind(&self) -> SamplerKind;

    /// Run one pass. Blocking OS reads are allowed here.
    fn sample(&mut self) -> Result<Self::Output, TelemetryError>;
}

#[derive(Clone, Copy, Debug)]
pub struct CycleTiming {
    pub interval: Duration,
    pub backoff: Duration,
}

/// Drive `sampler` until shutdown or a fatal error.
///
/// Each pass runs on the blocking pool; the loop itself only sleeps, so the
/// stop flag is honored within one sleep interval.
pub async fn run_sampler<S: Sampler>(
    mut sampler: S,
    timing: CycleTiming,
    publisher: Publisher<S::Output>,
    errors: mpsc::UnboundedSender<SamplerError>,
    mut shutdown: watch::Receiver<bool>,
) {
    let kind = sampler.kind();
    info!(
        sampler = %kind,
        interval_ms = timing.interval.as_millis() as u64,
        "sampler started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        let cycle = tokio::task::spawn_blocking(move || {
            let _span = tracing::debug_span!("sampler.cycle", sampler = %kind).entered();
            let result = sampler.sample();
            (sampler, result)
        })
        .await;

        let result = match cycle {
            Ok((returned, result)) => {
                sampler = returned;
                result
            }
            Err(join_err) => {
                error!(sampler = %kind, error = %join_err, "sampler pass panicked, stopping");
                let _ = errors.send(SamplerError {
                    sampler: kind,
                    error: TelemetryError::Unavailable(format!("sampler pass panicked: {join_err}")),
                });
                return;
            }
        };

        let delay = match result {
            Ok(output) => {
                publisher.publish(output);
                timing.interval
            }
            Err(err) if err.is_fatal() => {
                error!(sampler = %kind, error = %err, "sampler stopping");
                let _ = errors.send(SamplerError {
                    sampler: kind,
                    error: err,
                });
                break;
            }
            Err(err) => {
                warn!(
                    sampler = %kind,
                    error = %err,
                    backoff_ms = timing.backoff.as_millis() as u64,
                    "sampling pass failed, retrying"
                );
                let _ = errors.send(SamplerError {
                    sampler: kind,
                    error: err,
                });
                timing.backoff
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(sampler = %kind, "sampler stopped");
}

/// Enumerates every visible process each cycle.
pub struct ProcessSampler<P> {
    source: P,
}

impl<P: ProcessSource> ProcessSampler<P> {
    pub fn new(source: P) -> Self {
        Self { source }
    }

    pub fn collect(&mut self) -> Result<ProcessSnapshot, TelemetryError> {
        let pids = self.source.list_processes()?;
        let total_memory = self.source.total_memory();

        let mut records = Vec::with_capacity(pids.len());
        let mut excluded = 0usize;
        for pid in pids {
            match self.source.read_process_metrics(pid) {
                Ok(metrics) => records.push(ProcessRecord::from_metrics(metrics, total_memory)),
                Err(reason) => {
                    // Exited or inaccessible mid-scan.
                    trace!(pid, %reason, "process excluded from snapshot");
                    excluded += 1;
                }
            }
        }

        debug!(processes = records.len(), excluded, "process scan complete");
        Ok(ProcessSnapshot::new(records, SystemTime::now()))
    }
}

impl<P: ProcessSource> Sampler for ProcessSampler<P> {
    type Output = ProcessSnapshot;

    fn kind(&self) -> SamplerKind {
        SamplerKind::Processes
    }

    fn sample(&mut self) -> Result<ProcessSnapshot, TelemetryError> {
        self.collect()
    }
}

pub struct SystemStatsSampler<S> {
    source: S,
}

impl<S: SystemSource> SystemStatsSampler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: SystemSource> Sampler for SystemStatsSampler<S> {
    type Output = SystemStats;

    fn kind(&self) -> SamplerKind {
        SamplerKind::System
    }

    fn sample(&mut self) -> Result<SystemStats, TelemetryError> {
        let counters = self.source.read_system_counters()?;
        Ok(SystemStats::from_counters(&counters, SystemTime::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::system::process::{Field, ProcessMetrics, ProcessStatus};
    use crate::system::snapshot::SystemCounters;
    use std::collections::HashMap;

    struct FakeProcesses {
        listed: Vec<u32>,
        readable: HashMap<u32, f32>,
        denied: Vec<u32>,
    }

    impl ProcessSource for FakeProcesses {
        fn list_processes(&mut self) -> Result<Vec<u32>, TelemetryError> {
            Ok(self.listed.clone())
        }

        fn read_process_metrics(&mut self, pid: u32) -> Result<ProcessMetrics, ProbeError> {
            if self.denied.contains(&pid) {
                return Err(ProbeError::PermissionDenied);
            }
            let cpu = *self.readable.get(&pid).ok_or(ProbeError::NotFound)?;
            Ok(ProcessMetrics {
                pid,
                parent_pid: None,
                name: format!("p{pid}"),
                owner_user: Field::Unavailable,
                cpu_percent: cpu,
                memory_resident_bytes: 1024,
                thread_count: Field::Available(1),
                status: ProcessStatus::Sleeping,
                nice: Field::Unavailable,
                executable_path: Field::Unavailable,
                command_line: Field::Unavailable,
                start_time: SystemTime::UNIX_EPOCH,
            })
        }

        fn total_memory(&self) -> u64 {
            4096
        }
    }

    #[test]
    fn vanished_and_denied_processes_are_excluded() {
        let mut sampler = ProcessSampler::new(FakeProcesses {
            listed: vec![1, 2, 3, 4],
            readable: HashMap::from([(1, 5.0), (3, 50.0)]),
            denied: vec![4],
        });
        let snapshot = sampler.sample().unwrap();
        let pids: Vec<u32> = snapshot.processes.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![3, 1]);
        assert!((snapshot.processes[0].memory_percent - 25.0).abs() < 0.001);
    }

    #[test]
    fn zero_processes_is_empty_snapshot() {
        let mut sampler = ProcessSampler::new(FakeProcesses {
            listed: vec![],
            readable: HashMap::new(),
            denied: vec![],
        });
        let snapshot = sampler.sample().unwrap();
        assert!(snapshot.is_empty());
    }

    struct FixedCounters(SystemCounters);

    impl SystemSource for FixedCounters {
        fn read_system_counters(&mut self) -> Result<SystemCounters, TelemetryError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn system_stats_sampler_derives_percentages() {
        let mut sampler = SystemStatsSampler::new(FixedCounters(SystemCounters {
            cpu_percent: 12.5,
            memory_total: 8_000_000_000,
            memory_used: 4_000_000_000,
            swap_total: 100,
            swap_used: 10,
            ..Default::default()
        }));
        let stats = sampler.sample().unwrap();
        assert!((stats.memory.percent - 50.0).abs() < 0.01);
        assert!((stats.swap.percent - 10.0).abs() < 0.01);
        assert_eq!(stats.cpu_percent, 12.5);
    }

    #[test]
    fn sampler_kind_names() {
        assert_eq!(SamplerKind::Processes.to_string(), "processes");
        assert_eq!(SamplerKind::Rates.to_string(), "rates");
    }
}
