//! Tick snapshots for CPUs and the monitored process.
//!
//! Reads cumulative tick counters from `/proc/stat` and `/proc/[pid]/stat`
//! and folds them into [`TickSample`]s for the load engine.

use crate::collector::procfs::parser::{CpuTicks, count_cpus, parse_cpu_ticks, parse_proc_ticks};
use crate::collector::traits::FileSystem;
use crate::error::CollectError;
use std::path::Path;

/// Cumulative tick counts since boot for one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSample {
    /// Ticks spent in user mode (including niced).
    pub used: u64,
    /// Ticks spent in kernel mode (including interrupts).
    pub used_kernel: u64,
    /// All accounted ticks, idle included.
    pub total: u64,
}

impl From<CpuTicks> for TickSample {
    fn from(t: CpuTicks) -> Self {
        Self {
            used: t.user + t.nice,
            used_kernel: t.system + t.irq + t.softirq,
            total: t.user + t.nice + t.system + t.idle + t.iowait + t.irq + t.softirq,
        }
    }
}

/// Reads raw tick counters from the proc filesystem.
pub struct TickSnapshotStore<F: FileSystem> {
    fs: F,
    proc_path: String,
    /// Monitored process; `None` reads `/proc/self`.
    pid: Option<u32>,
}

impl<F: FileSystem> TickSnapshotStore<F> {
    /// Creates a new tick store.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    /// * `pid` - Process to account, or `None` for the calling process
    pub fn new(fs: F, proc_path: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            pid,
        }
    }

    fn read_stat(&self) -> Result<String, CollectError> {
        let path = format!("{}/stat", self.proc_path);
        Ok(self.fs.read_to_string(Path::new(&path))?)
    }

    /// Reads the ticks of one logical CPU, or of all CPUs when `cpu` is `None`.
    pub fn read_cpu(&self, cpu: Option<usize>) -> Result<TickSample, CollectError> {
        let content = self.read_stat()?;
        Ok(parse_cpu_ticks(&content, cpu)?.into())
    }

    /// Number of logical CPUs listed in `/proc/stat`.
    pub fn cpu_count(&self) -> Result<usize, CollectError> {
        Ok(count_cpus(&self.read_stat()?))
    }

    /// Returns `true` if the kernel exposes per-thread `task` directories,
    /// which process-scope accounting relies on.
    pub fn supports_process_ticks(&self) -> bool {
        let task = format!("{}/self/task", self.proc_path);
        self.fs.is_dir(Path::new(&task))
    }

    /// Reads the ticks of the monitored process.
    ///
    /// `used`/`used_kernel` are the process' own user/kernel ticks; `total`
    /// is the aggregate of all CPUs so the load is normalized against wall time.
    pub fn read_process(&self) -> Result<TickSample, CollectError> {
        let path = match self.pid {
            Some(pid) => format!("{}/{}/stat", self.proc_path, pid),
            None => format!("{}/self/stat", self.proc_path),
        };
        let content = self.fs.read_to_string(Path::new(&path))?;
        let ticks = parse_proc_ticks(&content)?;
        let aggregate = self.read_cpu(None)?;

        Ok(TickSample {
            used: ticks.utime,
            used_kernel: ticks.stime,
            total: aggregate.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, proc_stat_line};

    #[test]
    fn test_read_aggregate_cpu() {
        let store = TickSnapshotStore::new(MockFs::typical_system(), "/proc", None);

        let sample = store.read_cpu(None).unwrap();

        assert_eq!(sample.used, 10500);
        assert_eq!(sample.used_kernel, 3300);
        assert_eq!(sample.total, 94800);
    }

    #[test]
    fn test_read_single_cpu() {
        let store = TickSnapshotStore::new(MockFs::typical_system(), "/proc", None);

        let sample = store.read_cpu(Some(2)).unwrap();

        assert_eq!(sample.used, 2625);
        assert_eq!(sample.used_kernel, 825);
        assert_eq!(sample.total, 23700);
    }

    #[test]
    fn test_read_missing_cpu() {
        let store = TickSnapshotStore::new(MockFs::typical_system(), "/proc", None);
        assert!(matches!(store.read_cpu(Some(64)), Err(CollectError::Parse(_))));
    }

    #[test]
    fn test_cpu_count() {
        let store = TickSnapshotStore::new(MockFs::typical_system(), "/proc", None);
        assert_eq!(store.cpu_count().unwrap(), 4);
    }

    #[test]
    fn test_cpu_count_with_offline_cpu() {
        let fs = MockFs::typical_system();
        fs.add_file(
            "/proc/stat",
            "cpu  4 0 4 4\ncpu0 1 0 1 1\ncpu1 1 0 1 1\ncpu3 1 0 1 1\nctxt 5\nbtime 1\n",
        );
        let store = TickSnapshotStore::new(fs, "/proc", None);

        assert_eq!(store.cpu_count().unwrap(), 4);
        assert!(store.read_cpu(Some(3)).is_ok());
        assert!(matches!(store.read_cpu(Some(2)), Err(CollectError::Parse(_))));
    }

    #[test]
    fn test_read_self_process() {
        let store = TickSnapshotStore::new(MockFs::typical_system(), "/proc", None);

        let sample = store.read_process().unwrap();

        assert_eq!(sample.used, 300);
        assert_eq!(sample.used_kernel, 100);
        assert_eq!(sample.total, 94800);
    }

    #[test]
    fn test_read_other_process() {
        let fs = MockFs::typical_system();
        fs.add_file("/proc/1000/stat", proc_stat_line(1000, "bash", 42, 7));
        let store = TickSnapshotStore::new(fs, "/proc", Some(1000));

        let sample = store.read_process().unwrap();

        assert_eq!(sample.used, 42);
        assert_eq!(sample.used_kernel, 7);
    }

    #[test]
    fn test_process_gone() {
        let store = TickSnapshotStore::new(MockFs::typical_system(), "/proc", Some(31337));
        assert!(matches!(store.read_process(), Err(CollectError::Io(_))));
    }

    #[test]
    fn test_supports_process_ticks() {
        let store = TickSnapshotStore::new(MockFs::typical_system(), "/proc", None);
        assert!(store.supports_process_ticks());

        let store = TickSnapshotStore::new(MockFs::without_task_dir(), "/proc", None);
        assert!(!store.supports_process_ticks());
    }
}
