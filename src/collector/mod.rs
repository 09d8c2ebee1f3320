//! Kernel file readers for Linux host metrics.
//!
//! This module reads tick counters and process information from the `/proc`
//! filesystem, with support for mocking so tests run without a real `/proc`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         procfs                              │
//! │  ┌─────────────────────┐   ┌─────────────────────────────┐  │
//! │  │ ProcessEnumerator   │   │     TickSnapshotStore       │  │
//! │  │  - /proc/[pid]/stat │   │  - /proc/stat (cpu lines)   │  │
//! │  │  - /proc/[pid]/exe  │   │  - /proc/[pid]/stat         │  │
//! │  │  - /proc/[pid]/cmd… │   └──────────────┬──────────────┘  │
//! │  └──────────┬──────────┘                  │                 │
//! │             └──────────────┬──────────────┘                 │
//! │                     ┌──────▼──────┐                         │
//! │                     │  FileSystem │ (trait)                 │
//! │                     └──────┬──────┘                         │
//! └────────────────────────────┼────────────────────────────────┘
//!                    ┌─────────┴─────────┐
//!             ┌──────▼──────┐     ┌──────▼──────┐
//!             │   RealFs    │     │   MockFs    │
//!             │  (Linux)    │     │  (Testing)  │
//!             └─────────────┘     └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use hostperf::collector::{MockFs, ProcessEnumerator};
//!
//! let fs = MockFs::typical_system();
//! let processes = ProcessEnumerator::new(fs, "/proc").collect_all().unwrap();
//! assert!(!processes.is_empty());
//! ```

pub mod mock;
pub mod procfs;
pub mod traits;

pub use mock::MockFs;
pub use procfs::{ProcessEnumerator, ProcessRecord, TickSample, TickSnapshotStore};
pub use traits::{FileSystem, RealFs};
