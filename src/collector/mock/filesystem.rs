//! In-memory mock filesystem for testing collectors without real `/proc`.
//!
//! `MockFs` clones share one backing store, so a test can keep a handle and
//! rewrite counter files between samples taken by a collector that owns
//! another clone.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tree {
    /// Map from path to file contents.
    files: HashMap<PathBuf, Vec<u8>>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Map from symlink path to its resolved target.
    symlinks: HashMap<PathBuf, PathBuf>,
}

impl Tree {
    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    tree: Arc<RwLock<Tree>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn read_tree(&self) -> RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_tree(&self) -> RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds (or replaces) a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.write_tree();
        tree.add_parents(&path);
        tree.files.insert(path, content.into());
    }

    /// Removes a file, simulating a process exiting mid-enumeration.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.write_tree().files.remove(path.as_ref());
    }

    /// Adds an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.write_tree();
        tree.add_parents(&path);
        tree.directories.insert(path);
    }

    /// Adds a symlink that `canonicalize` resolves to `target`.
    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.write_tree();
        tree.add_parents(&path);
        tree.symlinks.insert(path, target.as_ref().to_path_buf());
    }

    /// Adds a process with its `/proc/[pid]/` files.
    ///
    /// # Arguments
    /// * `pid` - Process ID
    /// * `stat` - Content of `/proc/[pid]/stat`
    /// * `cmdline` - Content of `/proc/[pid]/cmdline` (NUL separated)
    /// * `exe` - Target of `/proc/[pid]/exe`, `None` when it is unreadable
    pub fn add_process(&self, pid: u32, stat: &str, cmdline: &str, exe: Option<&str>) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_dir(&base);
        self.add_file(base.join("stat"), stat);
        self.add_file(base.join("cmdline"), cmdline);
        if let Some(target) = exe {
            self.add_symlink(base.join("exe"), target);
        }
    }
}

fn not_found(kind: &str, path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found: {:?}", kind, path),
    )
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.read_tree()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found("file", path))
    }

    fn exists(&self, path: &Path) -> bool {
        let tree = self.read_tree();
        tree.files.contains_key(path)
            || tree.directories.contains(path)
            || tree.symlinks.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.read_tree().directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.read_tree();
        if !tree.directories.contains(path) {
            return Err(not_found("directory", path));
        }

        let is_child = |p: &&PathBuf| p.parent().is_some_and(|parent| parent == path);

        let mut entries: HashSet<PathBuf> = HashSet::new();
        entries.extend(tree.files.keys().filter(is_child).cloned());
        entries.extend(tree.symlinks.keys().filter(is_child).cloned());
        entries.extend(
            tree.directories
                .iter()
                .filter(is_child)
                .filter(|d| d.as_path() != path)
                .cloned(),
        );

        Ok(entries.into_iter().collect())
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let tree = self.read_tree();
        if let Some(target) = tree.symlinks.get(path) {
            return Ok(target.clone());
        }
        if tree.files.contains_key(path) || tree.directories.contains(path) {
            return Ok(path.to_path_buf());
        }
        Err(not_found("path", path))
    }
}
