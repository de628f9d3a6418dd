use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use taskpulse::config::{self, Config, LogFormat};
use taskpulse::format::{format_bytes, format_field, format_rate, pad_unicode};
use taskpulse::logging::init_tracing;
use taskpulse::system::command::{CommandDispatcher, CommandOutcome};
use taskpulse::system::monitor::{Telemetry, TelemetryHandle};
use taskpulse::system::sampler::SamplerError;

#[derive(Parser)]
#[command(
    name = "taskpulse",
    about = "Live process and system telemetry"
)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Process and system refresh rate in milliseconds
    #[arg(long, global = true)]
    refresh_rate: Option<u64>,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print live telemetry until interrupted
    Watch {
        /// Number of processes to show
        #[arg(long, default_value_t = 15)]
        top: usize,

        /// Print one JSON object per refresh instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Stop after this many refreshes
        #[arg(long)]
        iterations: Option<usize>,
    },
    /// Ask a process to terminate (SIGTERM)
    Term { pid: u32 },
    /// Force a process to terminate (SIGKILL)
    Kill { pid: u32 },
    /// Change scheduling priority: realtime, high, above-normal, normal, below-normal, low
    Renice { pid: u32, level: String },
    /// Launch a detached process
    Spawn {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    init_tracing(&config.logging)?;

    let command = cli.command.unwrap_or(Cmd::Watch {
        top: 15,
        json: false,
        iterations: None,
    });

    match command {
        Cmd::Watch {
            top,
            json,
            iterations,
        } => {
            let mut telemetry = Telemetry::spawn(&config.sampling);
            let refresh = config.sampling.process_interval();
            let result = watch(&mut telemetry, refresh, top, json, iterations).await;
            telemetry.shutdown().await;
            result.map(|()| ExitCode::SUCCESS)
        }
        Cmd::Term { pid } => Ok(report(CommandDispatcher::new().signal_terminate(pid))),
        Cmd::Kill { pid } => Ok(report(CommandDispatcher::new().signal_kill(pid))),
        Cmd::Renice { pid, level } => Ok(report(
            CommandDispatcher::new().set_priority_named(pid, &level),
        )),
        Cmd::Spawn { command } => Ok(report(CommandDispatcher::new().spawn(&command.join(" ")))),
    }
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from_path(path),
        None => config::load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.sampling.process_interval_ms = rate;
        config.sampling.system_interval_ms = rate;
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.log_json {
        config.logging.format = LogFormat::Json;
    }

    config
}

fn report(outcome: CommandOutcome) -> ExitCode {
    match outcome {
        CommandOutcome::Success => {
            println!("ok");
            ExitCode::SUCCESS
        }
        CommandOutcome::PermissionDenied => {
            eprintln!("permission denied (try running with elevated privileges)");
            ExitCode::FAILURE
        }
        other => {
            eprintln!("{other}");
            ExitCode::FAILURE
        }
    }
}

async fn watch(
    telemetry: &mut TelemetryHandle,
    refresh: Duration,
    top: usize,
    json: bool,
    iterations: Option<usize>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(refresh);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => return Ok(()),
        }

        let errors = telemetry.drain_errors();
        if json {
            print_json(telemetry, &errors, top)?;
        } else {
            print_table(telemetry, &errors, top);
        }

        printed += 1;
        if iterations.is_some_and(|limit| printed >= limit) {
            return Ok(());
        }
    }
}

fn error_line(err: &SamplerError) -> String {
    if err.is_fatal() {
        format!("[stopped] {err}")
    } else {
        err.to_string()
    }
}

fn print_json(telemetry: &TelemetryHandle, errors: &[SamplerError], top: usize) -> Result<()> {
    let processes = telemetry.latest_processes();
    let errors: Vec<_> = errors
        .iter()
        .map(|err| {
            serde_json::json!({
                "sampler": err.sampler,
                "error": err.error.to_string(),
                "fatal": err.is_fatal(),
            })
        })
        .collect();
    let line = serde_json::json!({
        "system": telemetry.latest_system().as_deref(),
        "rates": telemetry.latest_rates().as_deref(),
        "processes": processes
            .as_deref()
            .map(|snapshot| &snapshot.processes[..top.min(snapshot.len())]),
        "stale": telemetry.processes().is_stale() || telemetry.system().is_stale(),
        "errors": errors,
        "stopped": telemetry.stopped_samplers(),
    });
    println!(
        "{}",
        serde_json::to_string(&line).map_err(|e| eyre!("failed to encode snapshot: {e}"))?
    );
    Ok(())
}

fn print_table(telemetry: &TelemetryHandle, errors: &[SamplerError], top: usize) {
    let mut out = String::new();

    for err in errors {
        out.push_str(&error_line(err));
        out.push('\n');
    }
    for kind in telemetry.stopped_samplers() {
        out.push_str(&format!("({kind} sampler stopped, showing its last data)\n"));
    }

    match telemetry.latest_system() {
        Some(stats) => {
            out.push_str(&format!(
                "CPU {:5.1}%  MEM {} / {} ({:.1}%)  SWAP {} / {} ({:.1}%)",
                stats.cpu_percent,
                format_bytes(stats.memory.used),
                format_bytes(stats.memory.total),
                stats.memory.percent,
                format_bytes(stats.swap.used),
                format_bytes(stats.swap.total),
                stats.swap.percent,
            ));
            match stats.disk {
                Some(disk) => out.push_str(&format!(
                    "  DISK {} / {} ({:.1}%)",
                    format_bytes(disk.used),
                    format_bytes(disk.total),
                    disk.percent
                )),
                None => out.push_str("  DISK n/a"),
            }
            out.push('\n');
        }
        None => out.push_str("waiting for system stats...\n"),
    }

    if let Some(rates) = telemetry.latest_rates() {
        let cores: Vec<String> = rates
            .per_core_percent
            .iter()
            .map(|p| format!("{p:.0}"))
            .collect();
        out.push_str(&format!(
            "NET up {} down {}  IO read {} write {}  cores [{}]\n",
            format_rate(rates.net_send_rate),
            format_rate(rates.net_receive_rate),
            format_rate(rates.disk_read_rate),
            format_rate(rates.disk_write_rate),
            cores.join(" "),
        ));
    }

    if telemetry.processes().is_stale() || telemetry.system().is_stale() {
        out.push_str("(data may be outdated)\n");
    }

    out.push_str(&format!(
        "{:>7} {} {} {:>6} {:>10} {:>6} {:>4} {}\n",
        "PID",
        pad_unicode("NAME", 20),
        pad_unicode("USER", 10),
        "CPU%",
        "RES",
        "MEM%",
        "THR",
        "STATUS"
    ));

    if let Some(snapshot) = telemetry.latest_processes() {
        for record in snapshot.processes.iter().take(top) {
            out.push_str(&format!(
                "{:>7} {} {} {:>6.1} {:>10} {:>6.1} {:>4} {}\n",
                record.pid,
                pad_unicode(&record.name, 20),
                pad_unicode(&format_field(&record.owner_user), 10),
                record.cpu_percent,
                format_bytes(record.memory_resident_bytes),
                record.memory_percent,
                format_field(&record.thread_count),
                record.status.label(),
            ));
        }
    }

    println!("{out}");
}
