//! Process enumeration from `/proc/[pid]/`.

use crate::collector::procfs::parser::{parse_cmdline, parse_exe_name};
use crate::collector::traits::FileSystem;
use crate::error::CollectError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One live process as seen during enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub pid: i32,
    /// Executable name from `/proc/[pid]/stat`.
    pub name: String,
    /// Resolved `/proc/[pid]/exe`; `None` when permission is denied.
    pub path: Option<String>,
    /// Arguments joined by spaces; `None` for kernel threads.
    pub command_line: Option<String>,
}

/// Cursor over the numeric entries of `/proc`.
///
/// Entries are validated lazily on [`advance`](Self::advance): the name must be
/// a positive integer, the entry a directory, and its `stat` file present.
/// Processes that exit mid-walk are skipped.
pub struct ProcessIterator<'a, F: FileSystem> {
    fs: &'a F,
    entries: std::vec::IntoIter<PathBuf>,
    current: Option<(i32, PathBuf)>,
}

impl<'a, F: FileSystem> ProcessIterator<'a, F> {
    fn new(fs: &'a F, proc_path: &str) -> Result<Self, CollectError> {
        let mut entries = fs.read_dir(Path::new(proc_path))?;
        entries.sort();
        Ok(Self {
            fs,
            entries: entries.into_iter(),
            current: None,
        })
    }

    /// Moves to the next valid process entry. Returns `false` at the end.
    pub fn advance(&mut self) -> bool {
        self.current = None;
        for entry in self.entries.by_ref() {
            if let Some(pid) = valid_pid(self.fs, &entry) {
                self.current = Some((pid, entry));
                return true;
            }
        }
        false
    }

    /// Reads the record for the current entry.
    ///
    /// Returns `None` before the first `advance`, past the end, or when the
    /// process exited after it was validated.
    pub fn current(&self) -> Option<ProcessRecord> {
        let (pid, dir) = self.current.as_ref()?;

        let stat = match self.fs.read_to_string(&dir.join("stat")) {
            Ok(content) => content,
            Err(e) => {
                debug!(pid, error = %e, "process vanished during enumeration");
                return None;
            }
        };
        let name = parse_exe_name(&stat).unwrap_or_default();

        let path = self
            .fs
            .canonicalize(&dir.join("exe"))
            .ok()
            .map(|p| p.to_string_lossy().into_owned());

        let command_line = self
            .fs
            .read(&dir.join("cmdline"))
            .ok()
            .and_then(|raw| parse_cmdline(&raw));

        Some(ProcessRecord {
            pid: *pid,
            name,
            path,
            command_line,
        })
    }
}

/// Returns the pid if `entry` looks like a live process directory.
fn valid_pid<F: FileSystem>(fs: &F, entry: &Path) -> Option<i32> {
    let pid = entry.file_name()?.to_str()?.parse::<i32>().ok()?;
    if pid <= 0 || !fs.is_dir(entry) || !fs.exists(&entry.join("stat")) {
        return None;
    }
    Some(pid)
}

/// Produces snapshots of all processes visible in `/proc`.
pub struct ProcessEnumerator<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> ProcessEnumerator<F> {
    /// Creates a new process enumerator.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Opens a fresh cursor over `/proc`.
    pub fn iter(&self) -> Result<ProcessIterator<'_, F>, CollectError> {
        ProcessIterator::new(&self.fs, &self.proc_path)
    }

    /// Collects all processes, newest discovery first.
    ///
    /// Failing to list `/proc` itself is an error; individual processes that
    /// cannot be read are skipped.
    pub fn collect_all(&self) -> Result<Vec<ProcessRecord>, CollectError> {
        let mut iter = self.iter()?;
        let mut processes = Vec::new();

        while iter.advance() {
            if let Some(record) = iter.current() {
                processes.push(record);
            }
        }

        processes.reverse();
        Ok(processes)
    }
}
