//! CPU utilization and scheduler activity.

pub mod ctxt;
pub mod load;

pub use ctxt::{Clock, ContextSwitchRateTracker, ManualClock, SystemClock};
pub use load::{CpuLoad, CpuLoadEngine, LoadScope, ProcessCpuLoad, compute_load};
