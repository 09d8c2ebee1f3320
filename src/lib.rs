//! hostperf - Linux host performance metrics.
//!
//! Provides:
//! - `collector` - filesystem abstraction, `/proc` readers, process enumeration
//! - `cpu` - snapshot-diff CPU load engine and context switch rate tracker
//! - `net` - rtnetlink interface enumeration and per-interface byte counters
//! - `perf` - `HostPerf`, one entry point per metric
//! - `config` - paths and accounting settings
//! - `error` - crate error type

pub mod collector;
pub mod config;
pub mod cpu;
pub mod error;
pub mod net;
pub mod perf;

pub use config::PerfConfig;
pub use error::CollectError;
pub use perf::HostPerf;
