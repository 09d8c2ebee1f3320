//! System-wide context switch rate.
//!
//! The tracker keeps the previous switch count and timestamp behind one
//! mutex. The first reading is measured against the boot time from
//! `/proc/stat` using the wall clock, because no earlier monotonic timestamp
//! exists; every later reading uses the monotonic clock.

use crate::collector::procfs::parser::parse_stat_value;
use crate::collector::traits::{FileSystem, RealFs};
use crate::error::CollectError;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time sources used by the tracker.
pub trait Clock: Send + Sync {
    /// Monotonic, non-decreasing nanoseconds from an arbitrary origin.
    fn monotonic_nanos(&self) -> u64;
    /// Milliseconds since the Unix epoch.
    fn wall_millis(&self) -> u64;
}

impl<C: Clock> Clock for Arc<C> {
    fn monotonic_nanos(&self) -> u64 {
        (**self).monotonic_nanos()
    }

    fn wall_millis(&self) -> u64 {
        (**self).wall_millis()
    }
}

/// `CLOCK_MONOTONIC` and the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic_nanos(&self) -> u64 {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid, writable timespec.
        if unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) } == 0 {
            ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
        } else {
            0
        }
    }

    fn wall_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    monotonic_nanos: AtomicU64,
    wall_millis: AtomicU64,
}

impl ManualClock {
    pub fn new(monotonic_nanos: u64, wall_millis: u64) -> Self {
        Self {
            monotonic_nanos: AtomicU64::new(monotonic_nanos),
            wall_millis: AtomicU64::new(wall_millis),
        }
    }

    /// Moves both clocks forward by `millis`.
    pub fn advance_millis(&self, millis: u64) {
        self.monotonic_nanos
            .fetch_add(millis * 1_000_000, Ordering::SeqCst);
        self.wall_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn monotonic_nanos(&self) -> u64 {
        self.monotonic_nanos.load(Ordering::SeqCst)
    }

    fn wall_millis(&self) -> u64 {
        self.wall_millis.load(Ordering::SeqCst)
    }
}

/// Mutable tracker state, only reachable through the tracker's lock.
#[derive(Debug, Default)]
struct ContextSwitchState {
    /// Boot time in ms since the epoch; `None` until the first rate is produced.
    boot_time_ms: Option<u64>,
    last_monotonic_ns: u64,
    last_switch_count: u64,
    last_rate: f64,
}

/// Computes context switches per second across calls.
///
/// Safe to share between threads; the whole read-and-update sequence runs
/// under one lock so a switch count is always paired with its timestamp.
pub struct ContextSwitchRateTracker<F: FileSystem, C: Clock = SystemClock> {
    fs: F,
    proc_path: String,
    clock: C,
    state: Mutex<ContextSwitchState>,
}

/// Process-wide tracker over the real `/proc`, created on first use.
static SHARED: LazyLock<Arc<ContextSwitchRateTracker<RealFs>>> =
    LazyLock::new(|| Arc::new(ContextSwitchRateTracker::new(RealFs::new(), "/proc", SystemClock)));

impl ContextSwitchRateTracker<RealFs> {
    /// Returns the process-wide tracker. It lives for the rest of the process.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }
}

impl<F: FileSystem, C: Clock> ContextSwitchRateTracker<F, C> {
    /// Creates a tracker in the not-yet-bootstrapped state.
    pub fn new(fs: F, proc_path: impl Into<String>, clock: C) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            clock,
            state: Mutex::new(ContextSwitchState::default()),
        }
    }

    fn read_stat_value(&self, key: &str) -> Result<u64, CollectError> {
        let path = format!("{}/stat", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        Ok(parse_stat_value(&content, key)?)
    }

    /// Returns context switches per second since the previous call.
    ///
    /// Zero elapsed time returns the cached rate unchanged. Rates at or
    /// below zero (counter read races) are reported as `0`.
    pub fn rate(&self) -> Result<f64, CollectError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let boot_time_ms = match state.boot_time_ms {
            Some(ms) => ms,
            None => self.read_stat_value("btime")?.saturating_mul(1000),
        };
        let bootstrapping = state.boot_time_ms.is_none();

        let (now, elapsed_ms) = if bootstrapping {
            state.last_monotonic_ns = self.clock.monotonic_nanos();
            let wall = self.clock.wall_millis();
            (0, wall as f64 - boot_time_ms as f64)
        } else {
            let now = self.clock.monotonic_nanos();
            let elapsed = now.saturating_sub(state.last_monotonic_ns) / 1_000_000;
            (now, elapsed as f64)
        };

        let mut result = Ok(());
        let mut rate = if elapsed_ms == 0.0 {
            state.last_rate
        } else {
            match self.read_stat_value("ctxt") {
                Ok(switches) => {
                    let rate =
                        (switches as f64 - state.last_switch_count as f64) / elapsed_ms * 1000.0;
                    state.last_rate = rate;
                    state.last_switch_count = switches;
                    if !bootstrapping {
                        state.last_monotonic_ns = now;
                    }
                    rate
                }
                Err(e) => {
                    result = Err(e);
                    0.0
                }
            }
        };

        if rate <= 0.0 || rate.is_nan() {
            rate = 0.0;
            state.last_rate = 0.0;
        }

        if bootstrapping {
            state.boot_time_ms = Some(boot_time_ms);
        }

        result.map(|()| rate)
    }
}
