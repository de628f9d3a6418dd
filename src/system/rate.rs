use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use super::collector::SystemSource;
use super::process::Field;
use super::sampler::{Sampler, SamplerKind};
use super::snapshot::{InterfaceCounters, RateSample, SystemCounters};
use crate::error::TelemetryError;

#[derive(Clone, Debug)]
struct NetReading {
    interfaces: BTreeMap<String, InterfaceCounters>,
    at: Instant,
}

#[derive(Clone, Copy, Debug)]
struct DiskReading {
    read: u64,
    written: u64,
    at: Instant,
}

/// Bytes per second between two cumulative readings, and whether the
/// counter went backwards. A reset yields zero, never a negative rate.
pub fn counter_rate(previous: u64, current: u64, elapsed: Duration) -> (f64, bool) {
    if current < previous {
        return (0.0, true);
    }
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return (0.0, false);
    }
    ((current - previous) as f64 / secs, false)
}

/// Derives network and disk rates by differencing cumulative counters.
///
/// Network interfaces are differenced one by one, so an interface that
/// appears or disappears between two readings contributes no rate. The disk
/// baseline survives cycles where the OS reports no disk counters.
pub struct RateMonitor<S> {
    source: S,
    previous_net: Option<NetReading>,
    previous_disk: Option<DiskReading>,
}

impl<S: SystemSource> RateMonitor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            previous_net: None,
            previous_disk: None,
        }
    }

    /// Fold one reading into the monitor. The first call after startup
    /// reports zero rates.
    pub fn observe(
        &mut self,
        counters: &SystemCounters,
        at: Instant,
        captured_at: SystemTime,
    ) -> RateSample {
        let mut sample = RateSample {
            captured_at,
            per_core_percent: counters.per_core_percent.clone(),
            net_send_rate: 0.0,
            net_receive_rate: 0.0,
            disk_read_bytes: Field::Unavailable,
            disk_write_bytes: Field::Unavailable,
            disk_read_rate: 0.0,
            disk_write_rate: 0.0,
            counter_reset: false,
        };

        let current_net = NetReading {
            interfaces: counters.net_interfaces.clone(),
            at,
        };
        if let Some(prev) = self.previous_net.replace(current_net) {
            let elapsed = at.saturating_duration_since(prev.at);
            for (name, current) in &counters.net_interfaces {
                let Some(previous) = prev.interfaces.get(name) else {
                    debug!(interface = %name, "new network interface, no rate this cycle");
                    continue;
                };
                let (send, send_reset) = counter_rate(previous.sent, current.sent, elapsed);
                let (receive, receive_reset) =
                    counter_rate(previous.received, current.received, elapsed);
                sample.net_send_rate += send;
                sample.net_receive_rate += receive;
                sample.counter_reset |= send_reset || receive_reset;
            }
        }

        if let Some((read, written)) = counters.disk_io {
            sample.disk_read_bytes = Field::Available(read);
            sample.disk_write_bytes = Field::Available(written);

            let current_disk = DiskReading { read, written, at };
            if let Some(prev) = self.previous_disk.replace(current_disk) {
                let elapsed = at.saturating_duration_since(prev.at);
                let (read_rate, read_reset) = counter_rate(prev.read, read, elapsed);
                let (write_rate, write_reset) = counter_rate(prev.written, written, elapsed);
                sample.disk_read_rate = read_rate;
                sample.disk_write_rate = write_rate;
                sample.counter_reset |= read_reset || write_reset;
            }
        }

        if sample.counter_reset {
            warn!("cumulative counter went backwards, reporting zero rate");
        }

        sample
    }
}

impl<S: SystemSource> Sampler for RateMonitor<S> {
    type Output = RateSample;

    fn kind(&self) -> SamplerKind {
        SamplerKind::Rates
    }

    fn sample(&mut self) -> Result<RateSample, TelemetryError> {
        let counters = self.source.read_system_counters()?;
        Ok(self.observe(&counters, Instant::now(), SystemTime::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSource;

    impl SystemSource for NoSource {
        fn read_system_counters(&mut self) -> Result<SystemCounters, TelemetryError> {
            Err(TelemetryError::Enumeration("unused".into()))
        }
    }

    fn counters(sent: u64, received: u64) -> SystemCounters {
        let mut interfaces = BTreeMap::new();
        interfaces.insert("eth0".to_string(), InterfaceCounters { sent, received });
        SystemCounters {
            net_bytes_sent: sent,
            net_bytes_received: received,
            net_interfaces: interfaces,
            per_core_percent: vec![10.0, 20.0],
            disk_io: Some((sent * 2, received * 2)),
            ..Default::default()
        }
    }

    fn disk_only(disk_io: Option<(u64, u64)>) -> SystemCounters {
        SystemCounters {
            disk_io,
            ..Default::default()
        }
    }

    #[test]
    fn first_sample_has_zero_rates() {
        let mut monitor = RateMonitor::new(NoSource);
        let sample = monitor.observe(&counters(5_000, 9_000), Instant::now(), SystemTime::now());
        assert_eq!(sample.net_send_rate, 0.0);
        assert_eq!(sample.net_receive_rate, 0.0);
        assert_eq!(sample.disk_read_rate, 0.0);
        assert!(!sample.counter_reset);
        assert_eq!(sample.per_core_percent, vec![10.0, 20.0]);
        assert_eq!(sample.disk_read_bytes, Field::Available(10_000));
    }

    #[test]
    fn second_sample_rate_is_delta_over_elapsed() {
        let mut monitor = RateMonitor::new(NoSource);
        let start = Instant::now();
        monitor.observe(&counters(1_000, 2_000), start, SystemTime::now());
        let sample = monitor.observe(
            &counters(5_000, 2_500),
            start + Duration::from_secs(2),
            SystemTime::now(),
        );
        assert!((sample.net_send_rate - 2_000.0).abs() < 1e-9);
        assert!((sample.net_receive_rate - 250.0).abs() < 1e-9);
        assert!((sample.disk_read_rate - 4_000.0).abs() < 1e-9);
    }

    #[test]
    fn counter_reset_yields_zero_and_is_flagged() {
        let mut monitor = RateMonitor::new(NoSource);
        let start = Instant::now();
        monitor.observe(&counters(1_000_000, 1_000_000), start, SystemTime::now());
        let sample = monitor.observe(
            &counters(10, 2_000_000),
            start + Duration::from_secs(1),
            SystemTime::now(),
        );
        assert_eq!(sample.net_send_rate, 0.0);
        assert!(sample.counter_reset);
        assert!((sample.net_receive_rate - 1_000_000.0).abs() < 1e-6);

        // The reset reading becomes the new baseline.
        let sample = monitor.observe(
            &counters(110, 2_000_000),
            start + Duration::from_secs(2),
            SystemTime::now(),
        );
        assert!((sample.net_send_rate - 100.0).abs() < 1e-9);
        assert!(!sample.counter_reset);
    }

    #[test]
    fn missing_disk_reading_keeps_previous_baseline() {
        let mut monitor = RateMonitor::new(NoSource);
        let start = Instant::now();
        let base = 500_000_000_000;

        monitor.observe(&disk_only(Some((base, base))), start, SystemTime::now());

        let gap = monitor.observe(
            &disk_only(None),
            start + Duration::from_secs(1),
            SystemTime::now(),
        );
        assert_eq!(gap.disk_read_rate, 0.0);
        assert_eq!(gap.disk_read_bytes, Field::Unavailable);
        assert_eq!(gap.disk_write_bytes, Field::Unavailable);
        assert!(!gap.counter_reset);

        let after = monitor.observe(
            &disk_only(Some((base + 1_000, base))),
            start + Duration::from_secs(2),
            SystemTime::now(),
        );
        assert!((after.disk_read_rate - 500.0).abs() < 1e-9);
        assert_eq!(after.disk_write_rate, 0.0);
        assert_eq!(after.disk_read_bytes, Field::Available(base + 1_000));
        assert!(!after.counter_reset);
    }

    #[test]
    fn new_interface_adds_no_spike() {
        let mut monitor = RateMonitor::new(NoSource);
        let start = Instant::now();
        monitor.observe(&counters(1_000, 1_000), start, SystemTime::now());

        let mut with_vpn = counters(1_500, 1_000);
        with_vpn.net_interfaces.insert(
            "tun0".to_string(),
            InterfaceCounters {
                sent: 90_000_000_000,
                received: 80_000_000_000,
            },
        );
        let sample = monitor.observe(&with_vpn, start + Duration::from_secs(1), SystemTime::now());
        assert!((sample.net_send_rate - 500.0).abs() < 1e-9);
        assert_eq!(sample.net_receive_rate, 0.0);

        let mut next = counters(1_500, 1_000);
        next.net_interfaces.insert(
            "tun0".to_string(),
            InterfaceCounters {
                sent: 90_000_000_200,
                received: 80_000_000_000,
            },
        );
        let sample = monitor.observe(&next, start + Duration::from_secs(2), SystemTime::now());
        assert!((sample.net_send_rate - 200.0).abs() < 1e-9);
    }

    #[test]
    fn vanished_interface_is_not_a_reset() {
        let mut monitor = RateMonitor::new(NoSource);
        let start = Instant::now();
        let mut both = counters(1_000, 1_000);
        both.net_interfaces.insert(
            "veth1".to_string(),
            InterfaceCounters {
                sent: 50_000,
                received: 50_000,
            },
        );
        monitor.observe(&both, start, SystemTime::now());

        let sample = monitor.observe(
            &counters(1_100, 1_000),
            start + Duration::from_secs(1),
            SystemTime::now(),
        );
        assert!((sample.net_send_rate - 100.0).abs() < 1e-9);
        assert!(!sample.counter_reset);
    }

    #[test]
    fn zero_elapsed_is_zero_rate() {
        assert_eq!(counter_rate(1, 10, Duration::ZERO), (0.0, false));
        assert_eq!(counter_rate(10, 1, Duration::from_secs(1)), (0.0, true));
    }
}
