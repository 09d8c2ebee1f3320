//! Per-interface byte counters from `/sys/class/net`.

use crate::collector::traits::FileSystem;
use crate::error::CollectError;
use crate::net::interface::{InterfaceEnumerator, InterfaceRecord};
use crate::net::socket::NetlinkTransport;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Counter files longer than this are rejected.
const MAX_COUNTER_LEN: usize = 127;

/// Byte counters of one interface. `-1` marks an unreadable counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInterfaceSample {
    pub name: String,
    pub bytes_in: i64,
    pub bytes_out: i64,
}

/// Parses the contents of a statistics counter file.
fn parse_counter(raw: &[u8]) -> Option<i64> {
    if raw.is_empty() || raw.len() > MAX_COUNTER_LEN {
        return None;
    }
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

/// Joins link records with their statistics counters.
pub struct NetworkUtilizationReporter<F: FileSystem> {
    fs: F,
    net_class_path: String,
}

impl<F: FileSystem> NetworkUtilizationReporter<F> {
    /// Creates a new reporter.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `net_class_path` - Base path to the interface tree (usually "/sys/class/net")
    pub fn new(fs: F, net_class_path: impl Into<String>) -> Self {
        Self {
            fs,
            net_class_path: net_class_path.into(),
        }
    }

    /// Reads `<net_class_path>/<iface>/statistics/<counter>`, or `-1`.
    pub fn read_counter(&self, iface: &str, counter: &str) -> i64 {
        let path = format!("{}/{}/statistics/{}", self.net_class_path, iface, counter);
        match self.fs.read(Path::new(&path)) {
            Ok(raw) => parse_counter(&raw).unwrap_or_else(|| {
                debug!(iface, counter, "malformed interface counter");
                -1
            }),
            Err(e) => {
                debug!(iface, counter, error = %e, "unreadable interface counter");
                -1
            }
        }
    }

    /// Samples every link record; address-only records are skipped.
    ///
    /// The result is in the reverse order of `interfaces`, which for
    /// enumerator output is link discovery order.
    pub fn report(&self, interfaces: &[InterfaceRecord]) -> Vec<NetworkInterfaceSample> {
        interfaces
            .iter()
            .rev()
            .filter(|record| record.is_link())
            .map(|record| NetworkInterfaceSample {
                name: record.name.clone(),
                bytes_in: self.read_counter(&record.name, "rx_bytes"),
                bytes_out: self.read_counter(&record.name, "tx_bytes"),
            })
            .collect()
    }

    /// Enumerates interfaces over `transport` and samples their counters.
    ///
    /// Enumeration failure fails the whole report.
    pub fn collect<T: NetlinkTransport>(
        &self,
        transport: T,
    ) -> Result<Vec<NetworkInterfaceSample>, CollectError> {
        let interfaces = InterfaceEnumerator::new(transport).enumerate()?;
        Ok(self.report(&interfaces))
    }
}
