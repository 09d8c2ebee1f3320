//! Snapshot-diff CPU load computation.
//!
//! Load is always a rate since the previous sample of the same scope: each
//! call reads fresh ticks, diffs them against the stored slot, and replaces
//! the slot.
//!
//! A `CpuLoadEngine` is not meant to be shared between threads; callers
//! serialize access or keep one engine per thread.

use crate::collector::procfs::{TickSample, TickSnapshotStore};
use crate::collector::traits::FileSystem;
use crate::error::CollectError;
use serde::Serialize;
use tracing::debug;

/// Utilization fractions over one sampling interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuLoad {
    /// User-mode share of elapsed ticks, in `[0, 1]`.
    pub user: f64,
    /// Kernel-mode share of elapsed ticks, in `[0, 1]`.
    pub kernel: f64,
    /// Combined user + kernel share computed from summed ticks, in `[0, 1]`.
    pub busy: f64,
}

/// Load of the monitored process alongside the whole system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcessCpuLoad {
    pub user: f64,
    pub kernel: f64,
    /// System-wide load, never below `user + kernel` (capped at 1).
    pub system_total: f64,
}

/// Which tick counters a load is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadScope {
    /// One logical CPU, or all CPUs when `None`.
    Global(Option<usize>),
    /// The monitored process, normalized against aggregate ticks.
    Process,
}

/// Computes utilization between two samples of the same scope.
///
/// Kernel ticks can regress slightly between reads on different cores, so a
/// negative kernel diff is clamped to zero. When sampling skew makes the
/// busy ticks exceed the elapsed total, the total is widened to match so no
/// fraction exceeds 1. Zero elapsed ticks yield zero load.
pub fn compute_load(prev: &TickSample, cur: &TickSample) -> CpuLoad {
    let kdiff = cur.used_kernel.saturating_sub(prev.used_kernel);
    let udiff = cur.used.saturating_sub(prev.used);
    let mut tdiff = cur.total.saturating_sub(prev.total);

    if tdiff == 0 {
        return CpuLoad::default();
    }
    let busy_ticks = udiff + kdiff;
    if tdiff < busy_ticks {
        tdiff = busy_ticks;
    }

    let fraction = |ticks: u64| (ticks as f64 / tdiff as f64).clamp(0.0, 1.0);
    CpuLoad {
        user: fraction(udiff),
        kernel: fraction(kdiff),
        busy: fraction(busy_ticks),
    }
}

/// Tracks one previous tick sample per logical CPU, for the aggregate, and
/// for the monitored process.
pub struct CpuLoadEngine<F: FileSystem> {
    store: TickSnapshotStore<F>,
    /// Per-CPU slots followed by the aggregate slot at index `cpu_count`.
    cpus: Vec<TickSample>,
    process: TickSample,
    process_supported: Option<bool>,
}

impl<F: FileSystem> CpuLoadEngine<F> {
    /// Creates an engine tracking `cpu_count` logical CPUs and takes the
    /// baseline sample for every scope.
    ///
    /// Baseline read failures are tolerated: the slot stays zeroed and the
    /// first load of that scope is measured from boot.
    pub fn new(store: TickSnapshotStore<F>, cpu_count: usize) -> Self {
        let mut engine = Self {
            store,
            cpus: vec![TickSample::default(); cpu_count + 1],
            process: TickSample::default(),
            process_supported: None,
        };
        engine.prime();
        engine
    }

    fn prime(&mut self) {
        let cpu_count = self.cpu_count();
        let scopes = std::iter::once(LoadScope::Global(None))
            .chain((0..cpu_count).map(|cpu| LoadScope::Global(Some(cpu))))
            .chain(std::iter::once(LoadScope::Process));

        for scope in scopes {
            if let Err(e) = self.sample(scope) {
                debug!(?scope, error = %e, "no baseline tick sample");
            }
        }
    }

    /// Number of logical CPUs with their own slot.
    pub fn cpu_count(&self) -> usize {
        self.cpus.len() - 1
    }

    fn supports_process(&mut self) -> bool {
        *self
            .process_supported
            .get_or_insert_with(|| self.store.supports_process_ticks())
    }

    fn read(&mut self, scope: LoadScope) -> Result<TickSample, CollectError> {
        match scope {
            LoadScope::Global(cpu) => self.store.read_cpu(cpu),
            LoadScope::Process => {
                if !self.supports_process() {
                    return Err(CollectError::Unsupported("per-thread /proc/self/task"));
                }
                self.store.read_process()
            }
        }
    }

    fn slot_mut(&mut self, scope: LoadScope) -> &mut TickSample {
        let aggregate = self.cpu_count();
        match scope {
            LoadScope::Global(Some(cpu)) => &mut self.cpus[cpu],
            LoadScope::Global(None) => &mut self.cpus[aggregate],
            LoadScope::Process => &mut self.process,
        }
    }

    /// Reads a fresh sample for `scope`, replaces the stored one, and returns
    /// the load over the interval between them.
    ///
    /// On failure the stored sample is left untouched.
    pub fn sample(&mut self, scope: LoadScope) -> Result<CpuLoad, CollectError> {
        if let LoadScope::Global(Some(cpu)) = scope
            && cpu >= self.cpu_count()
        {
            return Err(CollectError::NoSuchCpu(cpu));
        }

        let current = self.read(scope)?;
        let slot = self.slot_mut(scope);
        let load = compute_load(slot, &current);
        *slot = current;
        Ok(load)
    }

    /// Total load of one logical CPU (or all CPUs), capped at 1.
    pub fn cpu_load(&mut self, cpu: Option<usize>) -> Result<f64, CollectError> {
        let load = self.sample(LoadScope::Global(cpu))?;
        Ok(load.busy.min(1.0))
    }

    /// User + kernel load of the monitored process.
    pub fn cpu_load_total_process(&mut self) -> Result<f64, CollectError> {
        let load = self.sample(LoadScope::Process)?;
        Ok(load.user + load.kernel)
    }

    /// User and kernel load of the monitored process plus the system total.
    ///
    /// The process and the system are sampled one after the other, so the
    /// system figure is widened to `user + kernel` when it appears smaller.
    pub fn cpu_loads_process(&mut self) -> Result<ProcessCpuLoad, CollectError> {
        let process = self.sample(LoadScope::Process)?;

        let mut system_total = self.cpu_load(None).unwrap_or_else(|e| {
            debug!(error = %e, "system load unavailable");
            0.0
        });
        let own = process.user + process.kernel;
        if own > system_total {
            system_total = own.min(1.0);
        }

        Ok(ProcessCpuLoad {
            user: process.user,
            kernel: process.kernel,
            system_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, proc_stat_line};

    fn sample(used: u64, used_kernel: u64, total: u64) -> TickSample {
        TickSample {
            used,
            used_kernel,
            total,
        }
    }

    /// Writes a `/proc/stat` whose aggregate and cpu0/cpu1 lines share the given ticks.
    fn write_stat(fs: &MockFs, user: u64, system: u64, idle: u64) {
        let line = format!("{} 0 {} {} 0 0 0 0 0 0", user, system, idle);
        fs.add_file(
            "/proc/stat",
            format!("cpu  {line}\ncpu0 {line}\ncpu1 {line}\nctxt 1\nbtime 1\n"),
        );
    }

    fn engine_fs() -> MockFs {
        let fs = MockFs::new();
        fs.add_dir("/proc/self/task");
        fs.add_file("/proc/self/stat", proc_stat_line(99, "me", 0, 0));
        write_stat(&fs, 0, 0, 0);
        fs
    }

    #[test]
    fn test_compute_load_basic() {
        let load = compute_load(&sample(100, 50, 1000), &sample(400, 150, 2000));
        assert!((load.user - 0.3).abs() < 1e-9);
        assert!((load.kernel - 0.1).abs() < 1e-9);
        assert!((load.busy - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_compute_load_zero_elapsed() {
        let load = compute_load(&sample(100, 50, 1000), &sample(200, 80, 1000));
        assert_eq!(load, CpuLoad::default());
    }

    #[test]
    fn test_kernel_regression_never_negative() {
        for regress in [1u64, 10, 500, 999] {
            let prev = sample(100, 1000, 5000);
            let cur = sample(150, 1000 - regress, 5100);
            let load = compute_load(&prev, &cur);
            assert_eq!(load.kernel, 0.0);
            assert!(load.user >= 0.0);
            assert!((load.user - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_user_and_total_regression_saturate() {
        let load = compute_load(&sample(500, 10, 5000), &sample(400, 20, 4000));
        assert_eq!(load, CpuLoad::default());
    }

    #[test]
    fn test_total_widening_caps_at_one() {
        // 30 busy ticks over 20 elapsed ticks
        let load = compute_load(&sample(0, 0, 0), &sample(10, 20, 20));
        assert_eq!(load.busy, 1.0);
        assert!(load.user + load.kernel <= 1.0 + 1e-12);
        assert!((load.user - 1.0 / 3.0).abs() < 1e-9);
        assert!((load.kernel - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_engine_cpu_load() {
        let fs = engine_fs();
        let mut engine = CpuLoadEngine::new(TickSnapshotStore::new(fs.clone(), "/proc", None), 2);

        write_stat(&fs, 30, 10, 60);
        let load = engine.cpu_load(None).unwrap();
        assert!((load - 0.4).abs() < 1e-9);

        // Per-CPU slots are independent of the aggregate slot.
        let load = engine.cpu_load(Some(1)).unwrap();
        assert!((load - 0.4).abs() < 1e-9);

        // Nothing elapsed since the last aggregate read.
        assert_eq!(engine.cpu_load(None).unwrap(), 0.0);
    }

    #[test]
    fn test_engine_first_call_is_baseline() {
        let fs = engine_fs();
        write_stat(&fs, 30, 10, 60);
        let mut engine = CpuLoadEngine::new(TickSnapshotStore::new(fs.clone(), "/proc", None), 2);

        // Baseline was taken at construction.
        assert_eq!(engine.cpu_load(Some(0)).unwrap(), 0.0);
    }

    #[test]
    fn test_engine_no_such_cpu() {
        let fs = engine_fs();
        let mut engine = CpuLoadEngine::new(TickSnapshotStore::new(fs, "/proc", None), 2);
        assert!(matches!(engine.cpu_load(Some(2)), Err(CollectError::NoSuchCpu(2))));
    }

    #[test]
    fn test_engine_read_failure_keeps_slot() {
        let fs = engine_fs();
        let mut engine = CpuLoadEngine::new(TickSnapshotStore::new(fs.clone(), "/proc", None), 2);

        fs.remove_file("/proc/stat");
        assert!(engine.cpu_load(None).is_err());

        write_stat(&fs, 50, 0, 50);
        let load = engine.cpu_load(None).unwrap();
        assert!((load - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_engine_process_load() {
        let fs = engine_fs();
        let mut engine = CpuLoadEngine::new(TickSnapshotStore::new(fs.clone(), "/proc", None), 2);

        write_stat(&fs, 600, 200, 1200);
        fs.add_file("/proc/self/stat", proc_stat_line(99, "me", 300, 100));

        let loads = engine.cpu_loads_process().unwrap();
        assert!((loads.user - 0.15).abs() < 1e-9);
        assert!((loads.kernel - 0.05).abs() < 1e-9);
        assert!((loads.system_total - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_engine_process_total_widens_system() {
        let fs = engine_fs();
        let mut engine = CpuLoadEngine::new(TickSnapshotStore::new(fs.clone(), "/proc", None), 2);

        // The system reports less busy time than the process alone.
        write_stat(&fs, 100, 0, 900);
        fs.add_file("/proc/self/stat", proc_stat_line(99, "me", 300, 100));

        let loads = engine.cpu_loads_process().unwrap();
        assert!((loads.user + loads.kernel - 0.4).abs() < 1e-9);
        assert!((loads.system_total - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_engine_process_total() {
        let fs = engine_fs();
        let mut engine = CpuLoadEngine::new(TickSnapshotStore::new(fs.clone(), "/proc", None), 2);

        write_stat(&fs, 600, 200, 1200);
        fs.add_file("/proc/self/stat", proc_stat_line(99, "me", 500, 300));

        let total = engine.cpu_load_total_process().unwrap();
        assert!((total - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_engine_process_unsupported() {
        let fs = MockFs::without_task_dir();
        let mut engine = CpuLoadEngine::new(TickSnapshotStore::new(fs, "/proc", None), 4);

        assert!(matches!(
            engine.cpu_load_total_process(),
            Err(CollectError::Unsupported(_))
        ));
        assert!(engine.cpu_load(None).is_ok());
    }
}
