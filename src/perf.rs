//! Host performance facade.
//!
//! `HostPerf` wires the tick store, load engine, context switch tracker,
//! process enumerator and network reporter to one configuration and exposes
//! one entry point per metric.

use crate::collector::procfs::{ProcessEnumerator, ProcessRecord, TickSnapshotStore};
use crate::collector::traits::{FileSystem, RealFs};
use crate::config::PerfConfig;
use crate::cpu::{Clock, ContextSwitchRateTracker, CpuLoadEngine, ProcessCpuLoad, SystemClock};
use crate::error::CollectError;
use crate::net::{InterfaceEnumerator, InterfaceRecord, NetlinkTransport};
use crate::net::{NetworkInterfaceSample, NetworkUtilizationReporter};
use std::sync::Arc;
use tracing::debug;

/// Host metrics over one proc/sys tree.
///
/// CPU loads take `&mut self` because every call replaces the stored tick
/// sample of its scope. The context switch tracker is shared and may be
/// used by other facades at the same time.
pub struct HostPerf<F: FileSystem + Clone, C: Clock = SystemClock> {
    cpu: CpuLoadEngine<F>,
    switches: Arc<ContextSwitchRateTracker<F, C>>,
    processes: ProcessEnumerator<F>,
    network: NetworkUtilizationReporter<F>,
}

impl HostPerf<RealFs> {
    /// Creates a facade over the live kernel.
    ///
    /// The default `/proc` uses the process-wide context switch tracker.
    pub fn system(config: PerfConfig) -> Result<Self, CollectError> {
        let switches = if config.proc_path == "/proc" {
            ContextSwitchRateTracker::shared()
        } else {
            Arc::new(ContextSwitchRateTracker::new(
                RealFs::new(),
                &config.proc_path,
                SystemClock,
            ))
        };
        Self::new(RealFs::new(), config, switches)
    }
}

impl<F: FileSystem + Clone, C: Clock> HostPerf<F, C> {
    /// Creates a facade and takes the baseline samples.
    ///
    /// Fails only when the CPU count is not configured and cannot be read.
    pub fn new(
        fs: F,
        config: PerfConfig,
        switches: Arc<ContextSwitchRateTracker<F, C>>,
    ) -> Result<Self, CollectError> {
        let store = TickSnapshotStore::new(fs.clone(), &config.proc_path, config.pid);
        let cpu_count = match config.cpu_count {
            Some(count) => count,
            None => store.cpu_count()?,
        };
        let cpu = CpuLoadEngine::new(store, cpu_count);

        if let Err(e) = switches.rate() {
            debug!(error = %e, "context switch rate not primed");
        }

        debug!(
            cpu_count,
            proc_path = %config.proc_path,
            pid = ?config.pid,
            "host metrics initialized"
        );

        Ok(Self {
            cpu,
            switches,
            processes: ProcessEnumerator::new(fs.clone(), &config.proc_path),
            network: NetworkUtilizationReporter::new(fs, &config.net_class_path),
        })
    }

    /// Number of logical CPUs tracked.
    pub fn cpu_count(&self) -> usize {
        self.cpu.cpu_count()
    }

    /// Load of one logical CPU, or of all CPUs when `cpu` is `None`.
    pub fn cpu_load(&mut self, cpu: Option<usize>) -> Result<f64, CollectError> {
        self.cpu.cpu_load(cpu)
    }

    /// User + kernel load of the monitored process.
    pub fn cpu_load_total_process(&mut self) -> Result<f64, CollectError> {
        self.cpu.cpu_load_total_process()
    }

    /// Monitored process loads together with the system-wide load.
    pub fn cpu_loads_process(&mut self) -> Result<ProcessCpuLoad, CollectError> {
        self.cpu.cpu_loads_process()
    }

    /// System-wide context switches per second.
    pub fn context_switch_rate(&self) -> Result<f64, CollectError> {
        self.switches.rate()
    }

    /// Snapshot of all live processes, newest discovery first.
    pub fn system_processes(&self) -> Result<Vec<ProcessRecord>, CollectError> {
        self.processes.collect_all()
    }

    /// Enumerates interfaces and addresses over `transport`.
    pub fn interfaces_with<T: NetlinkTransport>(
        &self,
        transport: T,
    ) -> Result<Vec<InterfaceRecord>, CollectError> {
        InterfaceEnumerator::new(transport).enumerate()
    }

    /// Byte counters of every link enumerated over `transport`.
    pub fn network_utilization_with<T: NetlinkTransport>(
        &self,
        transport: T,
    ) -> Result<Vec<NetworkInterfaceSample>, CollectError> {
        self.network.collect(transport)
    }
}

#[cfg(target_os = "linux")]
impl<F: FileSystem + Clone, C: Clock> HostPerf<F, C> {
    /// Enumerates interfaces and addresses over a fresh netlink socket.
    pub fn interfaces(&self) -> Result<Vec<InterfaceRecord>, CollectError> {
        let socket = crate::net::RouteSocket::open()?;
        self.interfaces_with(socket)
    }

    /// Byte counters of every link, read over a fresh netlink socket.
    pub fn network_utilization(&self) -> Result<Vec<NetworkInterfaceSample>, CollectError> {
        let socket = crate::net::RouteSocket::open()?;
        self.network_utilization_with(socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, proc_stat_line};
    use crate::cpu::ManualClock;
    use crate::net::rtnl::build;
    use crate::net::socket::scripted::ScriptedTransport;

    const BOOT_SECS: u64 = 1_700_000_000;

    type TestPerf = HostPerf<MockFs, Arc<ManualClock>>;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    /// Facade over `fs` whose wall clock sits 10 s after boot.
    fn host_perf(fs: &MockFs, config: PerfConfig) -> (TestPerf, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000_000, BOOT_SECS * 1000 + 10_000));
        let switches = Arc::new(ContextSwitchRateTracker::new(
            fs.clone(),
            "/proc",
            Arc::clone(&clock),
        ));
        let perf = HostPerf::new(fs.clone(), config, switches).unwrap();
        (perf, clock)
    }

    /// `/proc/stat` after the typical system ran 1000 more ticks.
    fn advanced_stat(ctxt: u64) -> String {
        let mut stat = String::from("cpu  10100 500 3050 80850 1000 200 100 0 0 0\n");
        for cpu in 0..4 {
            stat.push_str(&format!("cpu{cpu} 2525 125 762 20213 250 50 25 0 0 0\n"));
        }
        stat.push_str(&format!("ctxt {ctxt}\nbtime {BOOT_SECS}\n"));
        stat
    }

    fn eth0_transport() -> ScriptedTransport {
        let link = build::newlink(2, 0x1043, "eth0", &[2, 0, 0, 0, 0, 1]);
        ScriptedTransport::new()
            .respond([link, build::done()].concat())
            .respond(build::done())
    }

    #[test]
    fn test_cpu_count() {
        let fs = MockFs::typical_system();
        let (perf, _) = host_perf(&fs, PerfConfig::default());
        assert_eq!(perf.cpu_count(), 4);

        let (perf, _) = host_perf(&fs, PerfConfig::default().with_cpu_count(2));
        assert_eq!(perf.cpu_count(), 2);
    }

    #[test]
    fn test_offline_cpu_keeps_its_slot() {
        let fs = MockFs::typical_system();
        let sparse = |ticks: u64| {
            let mut stat = format!("cpu  {t} 0 {t} {t}\n", t = ticks * 3);
            for cpu in [0, 1, 3] {
                stat.push_str(&format!("cpu{cpu} {ticks} 0 {ticks} {ticks}\n"));
            }
            stat.push_str(&format!("ctxt 500000\nbtime {BOOT_SECS}\n"));
            stat
        };
        fs.add_file("/proc/stat", sparse(100));
        let (mut perf, _) = host_perf(&fs, PerfConfig::default());

        assert_eq!(perf.cpu_count(), 4);

        fs.add_file("/proc/stat", sparse(200));
        assert_close(perf.cpu_load(Some(3)).unwrap(), 2.0 / 3.0);
        assert!(matches!(perf.cpu_load(Some(2)), Err(CollectError::Parse(_))));
        assert!(matches!(
            perf.cpu_load(Some(4)),
            Err(CollectError::NoSuchCpu(4))
        ));
    }

    #[test]
    fn test_cpu_load_over_interval() {
        let fs = MockFs::typical_system();
        let (mut perf, _) = host_perf(&fs, PerfConfig::default());

        fs.add_file("/proc/stat", advanced_stat(500_000));

        assert_close(perf.cpu_load(None).unwrap(), 0.15);
        // Nothing moved since the previous call.
        assert_eq!(perf.cpu_load(None).unwrap(), 0.0);
    }

    #[test]
    fn test_cpu_load_per_core() {
        let fs = MockFs::typical_system();
        let (mut perf, _) = host_perf(&fs, PerfConfig::default());

        fs.add_file("/proc/stat", advanced_stat(500_000));

        // 25 user + 12 kernel out of 250 elapsed ticks
        assert_close(perf.cpu_load(Some(3)).unwrap(), 37.0 / 250.0);
        assert!(matches!(
            perf.cpu_load(Some(4)),
            Err(CollectError::NoSuchCpu(4))
        ));
    }

    #[test]
    fn test_process_loads() {
        let fs = MockFs::typical_system();
        let (mut perf, _) = host_perf(&fs, PerfConfig::default());

        fs.add_file("/proc/stat", advanced_stat(500_000));
        fs.add_file("/proc/self/stat", proc_stat_line(4242, "hostperf", 350, 110));

        let loads = perf.cpu_loads_process().unwrap();
        assert_close(loads.user, 0.05);
        assert_close(loads.kernel, 0.01);
        assert_close(loads.system_total, 0.15);
    }

    #[test]
    fn test_configured_pid() {
        let fs = MockFs::typical_system();
        let (mut perf, _) = host_perf(&fs, PerfConfig::default().with_pid(1000));

        fs.add_file("/proc/stat", advanced_stat(500_000));
        fs.add_file("/proc/1000/stat", proc_stat_line(1000, "bash", 110, 5));

        assert_close(perf.cpu_load_total_process().unwrap(), 0.1);
    }

    #[test]
    fn test_process_load_unsupported() {
        let fs = MockFs::without_task_dir();
        let (mut perf, _) = host_perf(&fs, PerfConfig::default());

        assert!(matches!(
            perf.cpu_load_total_process(),
            Err(CollectError::Unsupported(_))
        ));
    }

    #[test]
    fn test_context_switch_rate_primed() {
        let fs = MockFs::typical_system();
        let (perf, clock) = host_perf(&fs, PerfConfig::default());

        clock.advance_millis(1_000);
        fs.add_file("/proc/stat", advanced_stat(501_000));

        assert_close(perf.context_switch_rate().unwrap(), 1_000.0);
    }

    #[test]
    fn test_system_processes() {
        let fs = MockFs::typical_system();
        let (perf, _) = host_perf(&fs, PerfConfig::default());

        let processes = perf.system_processes().unwrap();

        assert_eq!(processes.len(), 3);
        assert_eq!(processes[2].name, "systemd");
    }

    #[test]
    fn test_network_utilization_with_transport() {
        let fs = MockFs::typical_system();
        let (perf, _) = host_perf(&fs, PerfConfig::default());
        let transport = eth0_transport();

        let samples = perf.network_utilization_with(transport).unwrap();

        assert_eq!(
            samples,
            vec![NetworkInterfaceSample {
                name: "eth0".to_string(),
                bytes_in: 987_654_321,
                bytes_out: 123_456_789,
            }]
        );
    }

    #[test]
    fn test_custom_net_class_path() {
        let fs = MockFs::typical_system();
        fs.add_file("/host/sys/class/net/eth0/statistics/rx_bytes", "42\n");
        let config = PerfConfig::default().with_net_class_path("/host/sys/class/net");
        let (perf, _) = host_perf(&fs, config);
        let transport = eth0_transport();

        let samples = perf.network_utilization_with(transport).unwrap();

        assert_eq!(samples[0].bytes_in, 42);
        assert_eq!(samples[0].bytes_out, -1);
    }

    #[test]
    fn test_missing_proc_stat() {
        let fs = MockFs::new();
        let clock = Arc::new(ManualClock::new(0, 0));
        let switches = Arc::new(ContextSwitchRateTracker::new(fs.clone(), "/proc", clock));

        let result = HostPerf::new(fs, PerfConfig::default(), switches);

        assert!(matches!(result, Err(CollectError::Io(_))));
    }
}
