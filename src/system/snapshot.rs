use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;

use super::process::Field;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct UsageStat {
    pub total: u64,
    pub used: u64,
    pub percent: f32,
}

impl UsageStat {
    pub fn new(total: u64, used: u64) -> Self {
        UsageStat {
            total,
            used,
            percent: percent_of(used, total),
        }
    }
}

pub fn percent_of(part: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 100.0) as f32
}

/// Cumulative bytes for one network interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub sent: u64,
    pub received: u64,
}

/// Raw aggregate readings from one pass over the OS counters.
#[derive(Clone, Debug, Default)]
pub struct SystemCounters {
    pub cpu_percent: f32,
    pub per_core_percent: Vec<f32>,
    pub memory_total: u64,
    pub memory_used: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    /// `(total, used)` of the monitored volume, `None` when it is not mounted.
    pub disk_space: Option<(u64, u64)>,
    pub net_bytes_sent: u64,
    pub net_bytes_received: u64,
    /// Per-interface cumulative bytes, keyed by interface name.
    pub net_interfaces: BTreeMap<String, InterfaceCounters>,
    /// `(read, written)` since boot, `None` when the OS does not report it.
    pub disk_io: Option<(u64, u64)>,
}

/// Whole-machine counters at one instant.
#[derive(Clone, Debug, Serialize)]
pub struct SystemStats {
    pub captured_at: SystemTime,
    pub cpu_percent: f32,
    pub memory: UsageStat,
    pub swap: UsageStat,
    /// `None` when the monitored volume is unavailable.
    pub disk: Option<UsageStat>,
    pub net_bytes_sent: u64,
    pub net_bytes_received: u64,
}

impl SystemStats {
    pub fn from_counters(counters: &SystemCounters, captured_at: SystemTime) -> Self {
        SystemStats {
            captured_at,
            cpu_percent: counters.cpu_percent.clamp(0.0, 100.0),
            memory: UsageStat::new(counters.memory_total, counters.memory_used),
            swap: UsageStat::new(counters.swap_total, counters.swap_used),
            disk: counters
                .disk_space
                .map(|(total, used)| UsageStat::new(total, used)),
            net_bytes_sent: counters.net_bytes_sent,
            net_bytes_received: counters.net_bytes_received,
        }
    }
}

/// Rates derived from two consecutive cumulative readings.
#[derive(Clone, Debug, Serialize)]
pub struct RateSample {
    pub captured_at: SystemTime,
    pub per_core_percent: Vec<f32>,
    pub net_send_rate: f64,
    pub net_receive_rate: f64,
    /// Cumulative disk bytes, unavailable when the OS did not report them
    /// this cycle.
    pub disk_read_bytes: Field<u64>,
    pub disk_write_bytes: Field<u64>,
    pub disk_read_rate: f64,
    pub disk_write_rate: f64,
    /// A cumulative counter went backwards since the previous reading.
    pub counter_reset: bool,
}
