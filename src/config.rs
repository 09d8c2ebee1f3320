//! Collection settings.

/// Where to read kernel data from and what to account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfConfig {
    /// Base path of the proc filesystem. Default: `/proc`.
    pub proc_path: String,
    /// Base path of the per-interface sysfs tree. Default: `/sys/class/net`.
    pub net_class_path: String,
    /// Process for process-scope loads. Default: `None`, the calling process.
    pub pid: Option<u32>,
    /// Logical CPUs to track. Default: `None`, counted from `<proc>/stat`.
    pub cpu_count: Option<usize>,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            proc_path: "/proc".to_string(),
            net_class_path: "/sys/class/net".to_string(),
            pid: None,
            cpu_count: None,
        }
    }
}

impl PerfConfig {
    pub fn with_proc_path(mut self, path: impl Into<String>) -> Self {
        self.proc_path = path.into();
        self
    }

    pub fn with_net_class_path(mut self, path: impl Into<String>) -> Self {
        self.net_class_path = path.into();
        self
    }

    /// Accounts `pid` instead of the calling process.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Tracks exactly `count` logical CPUs instead of counting them.
    pub fn with_cpu_count(mut self, count: usize) -> Self {
        self.cpu_count = Some(count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PerfConfig::default();
        assert_eq!(config.proc_path, "/proc");
        assert_eq!(config.net_class_path, "/sys/class/net");
        assert_eq!(config.pid, None);
        assert_eq!(config.cpu_count, None);
    }

    #[test]
    fn test_builder() {
        let config = PerfConfig::default()
            .with_proc_path("/host/proc")
            .with_net_class_path("/host/sys/class/net")
            .with_pid(42)
            .with_cpu_count(8);

        assert_eq!(config.proc_path, "/host/proc");
        assert_eq!(config.net_class_path, "/host/sys/class/net");
        assert_eq!(config.pid, Some(42));
        assert_eq!(config.cpu_count, Some(8));
    }
}
