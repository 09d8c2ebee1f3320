//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` and `/sys/class/net` states.

use super::filesystem::MockFs;

/// `/proc/stat` of a four-CPU machine.
pub const TYPICAL_STAT: &str = "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
softirq 50000 0 10000 0 5000 0 0 20000 10000 0 5000
";

/// Builds a `/proc/[pid]/stat` line with the given name and tick counters.
pub fn proc_stat_line(pid: u32, comm: &str, utime: u64, stime: u64) -> String {
    format!(
        "{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194304 100 0 0 0 {utime} {stime} 0 0 20 0 1 0 1000 12345678 100 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0"
    )
}

impl MockFs {
    /// Creates a typical system with a few processes and two interfaces.
    ///
    /// Includes: init (PID 1), a bash shell (PID 1000), a kernel thread
    /// (PID 2, empty cmdline) and the monitored process behind `self`.
    pub fn typical_system() -> Self {
        let fs = Self::new();

        fs.add_file("/proc/stat", TYPICAL_STAT);
        fs.add_dir("/proc/self/task");
        fs.add_file("/proc/self/stat", proc_stat_line(4242, "hostperf", 300, 100));
        fs.add_symlink("/proc/self/exe", "/usr/local/bin/hostperf");

        fs.add_process(
            1,
            &proc_stat_line(1, "systemd", 50, 120),
            "/sbin/init\0splash\0",
            Some("/usr/lib/systemd/systemd"),
        );
        fs.add_process(2, &proc_stat_line(2, "kthreadd", 0, 3), "", None);
        fs.add_process(
            1000,
            &proc_stat_line(1000, "bash", 10, 5),
            "-bash\0",
            Some("/usr/bin/bash"),
        );

        fs.add_file("/sys/class/net/lo/statistics/rx_bytes", "12345678\n");
        fs.add_file("/sys/class/net/lo/statistics/tx_bytes", "12345678\n");
        fs.add_file("/sys/class/net/eth0/statistics/rx_bytes", "987654321\n");
        fs.add_file("/sys/class/net/eth0/statistics/tx_bytes", "123456789\n");

        fs
    }

    /// Creates a system whose process names contain spaces and parentheses.
    pub fn with_special_names() -> Self {
        let fs = Self::new();
        fs.add_process(
            5000,
            &proc_stat_line(5000, "Web Content", 1, 1),
            "/usr/lib/firefox/firefox\0-contentproc\0",
            Some("/usr/lib/firefox/firefox"),
        );
        fs.add_process(
            5001,
            &proc_stat_line(5001, "weird) (name", 1, 1),
            "weird\0",
            None,
        );
        fs
    }

    /// Creates a `/proc` without per-thread `task` directories (pre-NPTL kernels).
    pub fn without_task_dir() -> Self {
        let fs = Self::new();
        fs.add_file("/proc/stat", TYPICAL_STAT);
        fs.add_file("/proc/self/stat", proc_stat_line(4242, "hostperf", 300, 100));
        fs
    }
}
