use std::time::SystemTime;

use proptest::prelude::*;
use taskpulse::system::process::{
    Field, ProcessMetrics, ProcessRecord, ProcessSnapshot, ProcessStatus,
};

fn record(pid: u32, cpu_percent: f32) -> ProcessRecord {
    ProcessRecord::from_metrics(
        ProcessMetrics {
            pid,
            parent_pid: None,
            name: format!("p{pid}"),
            owner_user: Field::Unavailable,
            cpu_percent,
            memory_resident_bytes: 0,
            thread_count: Field::Unavailable,
            status: ProcessStatus::Sleeping,
            nice: Field::Unavailable,
            executable_path: Field::Unavailable,
            command_line: Field::Unavailable,
            start_time: SystemTime::UNIX_EPOCH,
        },
        1,
    )
}

proptest! {
    #[test]
    fn snapshot_is_cpu_desc_then_pid_asc(
        entries in prop::collection::hash_map(1u32..100_000, 0u8..=20, 0..200),
    ) {
        // Coarse CPU values so ties are common.
        let records: Vec<ProcessRecord> = entries
            .iter()
            .map(|(&pid, &cpu)| record(pid, cpu as f32 * 5.0))
            .collect();
        let snapshot = ProcessSnapshot::new(records, SystemTime::now());

        prop_assert_eq!(snapshot.len(), entries.len());
        for pair in snapshot.processes.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(
                a.cpu_percent > b.cpu_percent
                    || (a.cpu_percent == b.cpu_percent && a.pid < b.pid),
                "out of order: ({}, {}) before ({}, {})",
                a.pid, a.cpu_percent, b.pid, b.cpu_percent
            );
        }
    }

    #[test]
    fn non_finite_cpu_sorts_last(pid in 1u32..1000) {
        let snapshot = ProcessSnapshot::new(
            vec![record(pid, f32::NAN), record(pid + 1, 1.0)],
            SystemTime::now(),
        );
        prop_assert_eq!(snapshot.processes[0].pid, pid + 1);
        prop_assert_eq!(snapshot.processes[1].cpu_percent, 0.0);
    }
}
