use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::collector::{ProcessSource, SysinfoSource, SystemSource};
use super::process::ProcessSnapshot;
use super::rate::RateMonitor;
use super::sampler::{
    CycleTiming, ProcessSampler, Sampler, SamplerError, SamplerKind, SystemStatsSampler,
    run_sampler,
};
use super::snapshot::{RateSample, SystemStats};
use super::store::{SlotReader, slot};
use crate::config::SamplingConfig;

/// Starts the samplers. Must be called from within a tokio runtime.
pub struct Telemetry;

impl Telemetry {
    pub fn spawn(config: &SamplingConfig) -> TelemetryHandle {
        Self::spawn_with(
            SysinfoSource::for_processes(),
            SysinfoSource::for_system(&config.disk_mount),
            SysinfoSource::for_rates(),
            config,
        )
    }

    pub fn spawn_with<P, S, R>(
        processes: P,
        system: S,
        rates: R,
        config: &SamplingConfig,
    ) -> TelemetryHandle
    where
        P: ProcessSource,
        S: SystemSource,
        R: SystemSource,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let backoff = config.error_backoff();

        let mut tasks = Vec::with_capacity(3);

        let (process_reader, task) = start(
            ProcessSampler::new(processes),
            CycleTiming {
                interval: config.process_interval(),
                backoff,
            },
            config.stale_factor,
            &error_tx,
            &shutdown_rx,
        );
        tasks.push(task);

        let (system_reader, task) = start(
            SystemStatsSampler::new(system),
            CycleTiming {
                interval: config.system_interval(),
                backoff,
            },
            config.stale_factor,
            &error_tx,
            &shutdown_rx,
        );
        tasks.push(task);

        let (rate_reader, task) = start(
            RateMonitor::new(rates),
            CycleTiming {
                interval: config.rate_interval(),
                backoff,
            },
            config.stale_factor,
            &error_tx,
            &shutdown_rx,
        );
        tasks.push(task);

        info!("telemetry samplers running");

        TelemetryHandle {
            processes: process_reader,
            system: system_reader,
            rates: rate_reader,
            errors: error_rx,
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

fn start<S: Sampler>(
    sampler: S,
    timing: CycleTiming,
    stale_factor: u32,
    errors: &mpsc::UnboundedSender<SamplerError>,
    shutdown: &watch::Receiver<bool>,
) -> (SlotReader<S::Output>, JoinHandle<()>) {
    let (publisher, reader) = slot(timing.interval, stale_factor);
    let task = tokio::spawn(run_sampler(
        sampler,
        timing,
        publisher,
        errors.clone(),
        shutdown.clone(),
    ));
    (reader, task)
}

/// Consumer side of the running samplers.
pub struct TelemetryHandle {
    processes: SlotReader<ProcessSnapshot>,
    system: SlotReader<SystemStats>,
    rates: SlotReader<RateSample>,
    errors: mpsc::UnboundedReceiver<SamplerError>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl TelemetryHandle {
    pub fn processes(&self) -> &SlotReader<ProcessSnapshot> {
        &self.processes
    }

    pub fn system(&self) -> &SlotReader<SystemStats> {
        &self.system
    }

    pub fn rates(&self) -> &SlotReader<RateSample> {
        &self.rates
    }

    pub fn latest_processes(&self) -> Option<Arc<ProcessSnapshot>> {
        self.processes.latest()
    }

    pub fn latest_system(&self) -> Option<Arc<SystemStats>> {
        self.system.latest()
    }

    pub fn latest_rates(&self) -> Option<Arc<RateSample>> {
        self.rates.latest()
    }

    /// Pending sampler error, if any. Never waits.
    pub fn try_next_error(&mut self) -> Option<SamplerError> {
        self.errors.try_recv().ok()
    }

    pub async fn next_error(&mut self) -> Option<SamplerError> {
        self.errors.recv().await
    }

    /// Every error queued since the last call, oldest first. Never waits.
    pub fn drain_errors(&mut self) -> Vec<SamplerError> {
        let mut drained = Vec::new();
        while let Ok(err) = self.errors.try_recv() {
            drained.push(err);
        }
        drained
    }

    /// Samplers whose task has ended. Their last snapshot stays readable.
    pub fn stopped_samplers(&self) -> Vec<SamplerKind> {
        [
            (SamplerKind::Processes, self.processes.sampler_stopped()),
            (SamplerKind::System, self.system.sampler_stopped()),
            (SamplerKind::Rates, self.rates.sampler_stopped()),
        ]
        .into_iter()
        .filter_map(|(kind, stopped)| stopped.then_some(kind))
        .collect()
    }

    /// Stop every sampler and wait for them to finish their current cycle.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "sampler task ended abnormally");
            }
        }
        info!("telemetry samplers stopped");
    }
}
