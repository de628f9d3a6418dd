//! Live process and system telemetry for task-manager front ends.
//!
//! Three samplers publish snapshots into latest-value slots:
//! [`system::sampler::ProcessSampler`], [`system::sampler::SystemStatsSampler`]
//! and [`system::rate::RateMonitor`]. [`system::monitor::Telemetry`] wires them
//! up; [`system::command::CommandDispatcher`] carries out process-control
//! requests.

pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod system;
