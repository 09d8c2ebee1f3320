//! hostperf - Linux host metrics sampler.
//!
//! Prints CPU load, context switch rate, process count and per-interface
//! byte counters every interval, as text or as one JSON object per line.

use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use hostperf::collector::{ProcessRecord, RealFs};
use hostperf::cpu::ProcessCpuLoad;
use hostperf::net::NetworkInterfaceSample;
use hostperf::{CollectError, HostPerf, PerfConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Linux host metrics sampler.
#[derive(Parser)]
#[command(name = "hostperf", about = "Linux host metrics sampler", version)]
struct Args {
    /// Sampling interval in seconds.
    #[arg(short, long, default_value = "1")]
    interval: u64,

    /// Number of samples to print (0 = until interrupted).
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Path to /proc filesystem.
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to the per-interface sysfs tree.
    #[arg(long, default_value = "/sys/class/net")]
    net_class_path: String,

    /// Account this process instead of hostperf itself.
    #[arg(long)]
    pid: Option<u32>,

    /// Include the full process list in JSON samples.
    #[arg(long)]
    processes: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// One sample of every metric. Metrics that failed are `None`.
#[derive(Debug, Serialize)]
struct HostSample {
    timestamp: String,
    cpu_load: Option<f64>,
    per_cpu: Vec<Option<f64>>,
    process: Option<ProcessCpuLoad>,
    context_switch_rate: Option<f64>,
    process_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processes: Option<Vec<ProcessRecord>>,
    interfaces: Vec<NetworkInterfaceSample>,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    match format!("hostperf={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("invalid log directive: {}", e),
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Logs a failed metric and turns it into `None`.
fn logged<T>(metric: &str, result: Result<T, CollectError>) -> Option<T> {
    result
        .map_err(|e| warn!(metric, error = %e, "metric unavailable"))
        .ok()
}

#[cfg(target_os = "linux")]
fn network_utilization(
    perf: &HostPerf<RealFs>,
) -> Result<Vec<NetworkInterfaceSample>, CollectError> {
    perf.network_utilization()
}

#[cfg(not(target_os = "linux"))]
fn network_utilization(
    _perf: &HostPerf<RealFs>,
) -> Result<Vec<NetworkInterfaceSample>, CollectError> {
    Err(CollectError::Unsupported("netlink route sockets"))
}

fn take_sample(perf: &mut HostPerf<RealFs>, include_processes: bool) -> HostSample {
    let cpu_load = logged("cpu_load", perf.cpu_load(None));
    let per_cpu = (0..perf.cpu_count())
        .map(|cpu| logged("cpu_load", perf.cpu_load(Some(cpu))))
        .collect();
    let process = logged("cpu_loads_process", perf.cpu_loads_process());
    let context_switch_rate = logged("context_switch_rate", perf.context_switch_rate());
    let processes = logged("system_processes", perf.system_processes());
    let interfaces = logged("network_utilization", network_utilization(perf)).unwrap_or_default();

    HostSample {
        timestamp: Utc::now().to_rfc3339(),
        cpu_load,
        per_cpu,
        process,
        context_switch_rate,
        process_count: processes.as_ref().map(Vec::len),
        processes: processes.filter(|_| include_processes),
        interfaces,
    }
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0))
}

fn print_text(sample: &HostSample) {
    let per_cpu: Vec<String> = sample.per_cpu.iter().map(|v| percent(*v)).collect();
    let (user, kernel) = sample
        .process
        .map_or((None, None), |p| (Some(p.user), Some(p.kernel)));

    println!(
        "{} cpu {} [{}] self {} usr {} sys, ctxt {}/s, {} processes",
        sample.timestamp,
        percent(sample.cpu_load),
        per_cpu.join(" "),
        percent(user),
        percent(kernel),
        sample
            .context_switch_rate
            .map_or_else(|| "-".to_string(), |r| format!("{:.0}", r)),
        sample
            .process_count
            .map_or_else(|| "-".to_string(), |n| n.to_string()),
    );
    for iface in &sample.interfaces {
        println!(
            "  {:<16} rx {:>16} tx {:>16}",
            iface.name, iface.bytes_in, iface.bytes_out
        );
    }
}

fn print_json(sample: &HostSample) {
    match serde_json::to_string(sample) {
        Ok(line) => println!("{}", line),
        Err(e) => error!("Failed to serialize sample: {}", e),
    }
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("hostperf {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, proc={}, net={}",
        args.interval, args.proc_path, args.net_class_path
    );

    let mut config = PerfConfig::default()
        .with_proc_path(&args.proc_path)
        .with_net_class_path(&args.net_class_path);
    if let Some(pid) = args.pid {
        config = config.with_pid(pid);
    }

    let mut perf = match HostPerf::system(config) {
        Ok(perf) => perf,
        Err(e) => {
            error!("Failed to initialize: {}", e);
            process::exit(1);
        }
    };
    info!("Tracking {} logical CPUs", perf.cpu_count());

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let interval = Duration::from_secs(args.interval.max(1));
    let mut printed: u64 = 0;

    while running.load(Ordering::SeqCst) {
        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let sample = take_sample(&mut perf, args.processes);
        match args.format {
            OutputFormat::Text => print_text(&sample),
            OutputFormat::Json => print_json(&sample),
        }

        printed += 1;
        if args.count > 0 && printed >= args.count {
            break;
        }
    }

    info!("Shutting down...");
}
